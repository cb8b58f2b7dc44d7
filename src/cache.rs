//! In-memory chunk store: request lifecycle, merging, eviction, and the
//! tile-level query interface.
//!
//! The cache is pure bookkeeping: it never performs I/O. `request_chunks`
//! returns the batches that must be handed to the fetch dispatcher, and
//! `apply_batch_result` merges whatever the dispatcher brings back. All
//! mutation goes through these methods from the driving systems
//! (single-writer); everything else reads through the accessors.
//!
//! Per-key lifecycle: not-requested -> pending -> resident, back to
//! not-requested on batch failure (retryable) or eviction. The pending set
//! is what guarantees at most one in-flight fetch per key.

use std::collections::{HashMap, HashSet};

use bevy::log::{debug, warn};

use crate::chunk::Chunk;
use crate::coords::{CHUNK_SIZE, ChunkPos, TilePos};
use crate::fetch::FetchError;
use crate::grid::Grid;
use crate::slope::{SLOPE_FLAT, SlopeClassifier};
use crate::tile::{ResourceKind, Terrain};

/// Load lifecycle of a single chunk key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadState {
  /// Not resident and no fetch in flight; a future pass may request it.
  NotRequested,
  /// A fetch containing this key is in flight.
  Pending,
  /// Fully loaded in the cache.
  Resident,
}

/// Authoritative store of fetched chunks around the viewpoint.
pub struct ChunkCache {
  resident: HashMap<ChunkPos, Chunk>,
  pending: HashSet<ChunkPos>,
  /// Locally computed slope grids, invalidated wholesale when the owning
  /// chunk or any orthogonal neighbor changes residency.
  slope_memo: HashMap<ChunkPos, Grid<u8>>,
  classifier: SlopeClassifier,
  batch_size: usize,
  connected: bool,
}

impl ChunkCache {
  /// Creates an empty cache.
  ///
  /// `batch_size` bounds how many keys go into a single fetch;
  /// `slope_threshold` is the corner-raise threshold for local slope
  /// classification.
  pub fn new(batch_size: usize, slope_threshold: u8) -> Self {
    Self {
      resident: HashMap::new(),
      pending: HashSet::new(),
      slope_memo: HashMap::new(),
      classifier: SlopeClassifier::new(slope_threshold),
      batch_size: batch_size.max(1),
      connected: false,
    }
  }

  /// Returns true if the chunk is resident.
  pub fn contains(&self, pos: ChunkPos) -> bool {
    self.resident.contains_key(&pos)
  }

  /// Returns the resident chunk, if any. Never triggers a fetch.
  pub fn get(&self, pos: ChunkPos) -> Option<&Chunk> {
    self.resident.get(&pos)
  }

  /// Returns the load lifecycle state of a key.
  pub fn load_state(&self, pos: ChunkPos) -> LoadState {
    if self.resident.contains_key(&pos) {
      LoadState::Resident
    } else if self.pending.contains(&pos) {
      LoadState::Pending
    } else {
      LoadState::NotRequested
    }
  }

  /// Number of resident chunks.
  pub fn resident_count(&self) -> usize {
    self.resident.len()
  }

  /// Iterates over resident chunk positions.
  pub fn resident_keys(&self) -> impl Iterator<Item = ChunkPos> + '_ {
    self.resident.keys().copied()
  }

  /// Coarse connectivity flag, flipped on every batch outcome.
  ///
  /// Observability only: nothing gates on it.
  pub fn connection_status(&self) -> bool {
    self.connected
  }

  /// Deduplicates and batches a set of wanted keys, marking them pending.
  ///
  /// Keys already pending or resident are dropped, so overlapping requests
  /// collapse to one in-flight fetch per key. The returned batches (each at
  /// most `batch_size` keys) must be forwarded to the fetch dispatcher.
  pub fn request_chunks(&mut self, keys: impl IntoIterator<Item = ChunkPos>) -> Vec<Vec<ChunkPos>> {
    let mut fresh: Vec<ChunkPos> = keys
      .into_iter()
      .filter(|key| !self.pending.contains(key) && !self.resident.contains_key(key))
      .collect();
    fresh.sort_unstable();
    fresh.dedup();

    let mut batches = Vec::new();
    for slice in fresh.chunks(self.batch_size) {
      self.pending.extend(slice.iter().copied());
      batches.push(slice.to_vec());
    }
    batches
  }

  /// Merges the outcome of one batch fetch.
  ///
  /// On success every returned chunk replaces storage wholesale and becomes
  /// resident; requested keys absent from the response revert to
  /// not-requested (retryable) without creating placeholder entries. On
  /// failure the whole batch reverts. Returns how many keys became
  /// resident.
  pub fn apply_batch_result(
    &mut self,
    requested: &[ChunkPos],
    result: Result<HashMap<ChunkPos, Chunk>, FetchError>,
  ) -> usize {
    match result {
      Ok(mut chunks) => {
        self.connected = true;
        let mut loaded = 0;
        let mut missing = 0;
        for key in requested {
          self.pending.remove(key);
          match chunks.remove(key) {
            Some(chunk) => {
              self.insert_chunk(*key, chunk);
              loaded += 1;
            }
            None => missing += 1,
          }
        }
        // Chunks the server sent beyond the request are merged too; the
        // response is keyed and merging is idempotent.
        for (key, chunk) in chunks {
          self.insert_chunk(key, chunk);
          loaded += 1;
        }
        if missing > 0 {
          warn!("Chunk fetch incomplete: {}", FetchError::PartialData { missing });
        }
        debug!("Merged {loaded} chunk(s), {} now resident", self.resident.len());
        loaded
      }
      Err(error) => {
        self.connected = false;
        for key in requested {
          self.pending.remove(key);
        }
        warn!("Chunk batch of {} failed, will retry: {error}", requested.len());
        0
      }
    }
  }

  /// Removes the given chunks and every slope memo derived from them.
  ///
  /// Absent keys are a no-op. In-flight fetches are not cancelled; their
  /// results simply merge on arrival.
  pub fn evict(&mut self, keys: &[ChunkPos]) {
    for key in keys {
      if self.resident.remove(key).is_some() {
        self.invalidate_slopes_around(*key);
      }
    }
  }

  /// Resets all state to empty.
  pub fn clear(&mut self) {
    self.resident.clear();
    self.pending.clear();
    self.slope_memo.clear();
    self.connected = false;
  }

  /// Replaces a chunk wholesale and invalidates affected slope memos.
  fn insert_chunk(&mut self, pos: ChunkPos, chunk: Chunk) {
    self.resident.insert(pos, chunk);
    self.invalidate_slopes_around(pos);
  }

  /// Drops the slope memo of a chunk and of its four orthogonal neighbors,
  /// whose edge tiles were classified against this chunk's heights.
  fn invalidate_slopes_around(&mut self, pos: ChunkPos) {
    self.slope_memo.remove(&pos);
    for neighbor in pos.orthogonal_neighbors() {
      self.slope_memo.remove(&neighbor);
    }
  }

  // === Tile queries (the interface rendering collaborators consume) ===

  /// Terrain of a tile, if its chunk is resident.
  pub fn terrain_at(&self, tile: TilePos) -> Option<Terrain> {
    let (chunk_pos, local) = tile.to_chunk_and_local();
    self
      .resident
      .get(&chunk_pos)
      .map(|chunk| chunk.terrain[(local.x, local.y)])
  }

  /// Resource marker of a tile, if its chunk is resident and marked.
  pub fn resource_at(&self, tile: TilePos) -> Option<ResourceKind> {
    let (chunk_pos, local) = tile.to_chunk_and_local();
    self
      .resident
      .get(&chunk_pos)
      .and_then(|chunk| chunk.resources[(local.x, local.y)])
  }

  /// Height sample of a tile, if its chunk is resident.
  pub fn height_at(&self, tile: TilePos) -> Option<u8> {
    let (chunk_pos, local) = tile.to_chunk_and_local();
    self
      .resident
      .get(&chunk_pos)
      .map(|chunk| chunk.heights[(local.x, local.y)])
  }

  /// Slope index (0-18) of a tile.
  ///
  /// Uses the server-precomputed layer when present, otherwise classifies
  /// the whole owning chunk once and memoizes it. Neighbors in
  /// non-resident chunks count as level ground (flat extension), so edges
  /// of the loaded region never produce artifacts or errors; a tile whose
  /// own chunk is not resident is flat.
  pub fn slope_index_at(&mut self, tile: TilePos) -> u8 {
    let (chunk_pos, local) = tile.to_chunk_and_local();
    let Some(chunk) = self.resident.get(&chunk_pos) else {
      return SLOPE_FLAT;
    };
    if let Some(slopes) = &chunk.slopes {
      return slopes[(local.x, local.y)];
    }
    if !self.slope_memo.contains_key(&chunk_pos) {
      let grid = self.classify_chunk(chunk_pos, chunk);
      self.slope_memo.insert(chunk_pos, grid);
    }
    self.slope_memo[&chunk_pos][(local.x, local.y)]
  }

  /// Classifies every tile of one chunk against its neighbors.
  fn classify_chunk(&self, pos: ChunkPos, chunk: &Chunk) -> Grid<u8> {
    let origin = pos.origin_tile();
    let mut slopes = Grid::filled(SLOPE_FLAT);
    for y in 0..CHUNK_SIZE {
      for x in 0..CHUNK_SIZE {
        let h = chunk.heights[(x, y)];
        let tile = origin.offset(x as i32, y as i32);
        let north = self.neighbor_height(chunk, pos, tile.offset(0, -1), h);
        let east = self.neighbor_height(chunk, pos, tile.offset(1, 0), h);
        let south = self.neighbor_height(chunk, pos, tile.offset(0, 1), h);
        let west = self.neighbor_height(chunk, pos, tile.offset(-1, 0), h);
        slopes[(x, y)] = self.classifier.classify(h, north, east, south, west);
      }
    }
    slopes
  }

  /// Height of a neighbor tile, falling back to `own_height` when the
  /// neighbor's chunk is not resident.
  fn neighbor_height(&self, own: &Chunk, own_pos: ChunkPos, tile: TilePos, own_height: u8) -> u8 {
    let (chunk_pos, local) = tile.to_chunk_and_local();
    if chunk_pos == own_pos {
      own.heights[(local.x, local.y)]
    } else {
      self
        .resident
        .get(&chunk_pos)
        .map(|chunk| chunk.heights[(local.x, local.y)])
        .unwrap_or(own_height)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::slope::{SLOPE_PEAK, SLOPE_FLAT};
  use crate::tile::Terrain;

  fn cache() -> ChunkCache {
    ChunkCache::new(10, 5)
  }

  fn level_chunk(height: u8) -> Chunk {
    let mut chunk = Chunk::flat(Terrain::Grass);
    chunk.heights = Grid::filled(height);
    chunk
  }

  /// Requests `keys` and merges a level chunk for each, making them resident.
  fn load_level_chunks(cache: &mut ChunkCache, keys: &[ChunkPos], height: u8) {
    for batch in cache.request_chunks(keys.iter().copied()) {
      let chunks = batch.iter().map(|&k| (k, level_chunk(height))).collect();
      cache.apply_batch_result(&batch, Ok(chunks));
    }
  }

  #[test]
  fn request_marks_keys_pending_and_batches_them() {
    let mut cache = cache();
    let keys: Vec<ChunkPos> = (0..25).map(|i| ChunkPos::new(i, 0)).collect();
    let batches = cache.request_chunks(keys.iter().copied());

    let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![10, 10, 5]);
    for key in &keys {
      assert_eq!(cache.load_state(*key), LoadState::Pending);
    }
  }

  #[test]
  fn overlapping_requests_fetch_each_key_once() {
    let mut cache = cache();
    let first = cache.request_chunks([ChunkPos::new(0, 0), ChunkPos::new(1, 0)]);
    assert_eq!(first, vec![vec![ChunkPos::new(0, 0), ChunkPos::new(1, 0)]]);

    // Overlap with a pending key and with itself.
    let second = cache.request_chunks([
      ChunkPos::new(1, 0),
      ChunkPos::new(2, 0),
      ChunkPos::new(2, 0),
    ]);
    assert_eq!(second, vec![vec![ChunkPos::new(2, 0)]]);

    // Resident keys are not re-requested either.
    load_level_chunks(&mut cache, &[ChunkPos::new(3, 0)], 0);
    assert!(cache.request_chunks([ChunkPos::new(3, 0)]).is_empty());
  }

  #[test]
  fn merging_identical_payload_twice_is_idempotent() {
    let mut cache = cache();
    let key = ChunkPos::new(2, -3);
    let batch = vec![key];
    cache.request_chunks(batch.iter().copied());
    cache.apply_batch_result(&batch, Ok(HashMap::from([(key, level_chunk(9))])));

    let heights_before = cache.get(key).unwrap().heights.clone();
    let count_before = cache.resident_count();

    // A stale in-flight response for the same key merges again.
    cache.apply_batch_result(&batch, Ok(HashMap::from([(key, level_chunk(9))])));
    assert_eq!(cache.resident_count(), count_before);
    assert_eq!(cache.get(key).unwrap().heights, heights_before);
    assert_eq!(cache.load_state(key), LoadState::Resident);
  }

  #[test]
  fn missing_keys_revert_without_placeholder() {
    let mut cache = cache();
    let a = ChunkPos::new(0, 0);
    let b = ChunkPos::new(1, 0);
    let batches = cache.request_chunks([a, b]);

    let loaded =
      cache.apply_batch_result(&batches[0], Ok(HashMap::from([(a, level_chunk(0))])));
    assert_eq!(loaded, 1);
    assert_eq!(cache.load_state(a), LoadState::Resident);
    assert_eq!(cache.load_state(b), LoadState::NotRequested);
    assert!(cache.get(b).is_none());

    // The missing key is retryable.
    assert_eq!(cache.request_chunks([b]), vec![vec![b]]);
  }

  #[test]
  fn failed_batch_reverts_and_flips_connection() {
    let mut cache = cache();
    let keys = [ChunkPos::new(0, 0), ChunkPos::new(1, 0)];
    let batches = cache.request_chunks(keys);

    let loaded = cache.apply_batch_result(
      &batches[0],
      Err(FetchError::Network("connection refused".into())),
    );
    assert_eq!(loaded, 0);
    assert!(!cache.connection_status());
    for key in keys {
      assert_eq!(cache.load_state(key), LoadState::NotRequested);
    }

    load_level_chunks(&mut cache, &keys, 0);
    assert!(cache.connection_status());
  }

  #[test]
  fn evict_is_total_and_tolerates_absent_keys() {
    let mut cache = cache();
    let key = ChunkPos::new(4, 4);
    load_level_chunks(&mut cache, &[key], 50);
    assert!(cache.contains(key));

    cache.evict(&[key, ChunkPos::new(99, 99)]);
    assert!(!cache.contains(key));
    assert_eq!(cache.load_state(key), LoadState::NotRequested);
  }

  #[test]
  fn tile_queries_read_resident_layers() {
    let mut cache = cache();
    load_level_chunks(&mut cache, &[ChunkPos::new(0, 0)], 7);

    assert_eq!(cache.terrain_at(TilePos::new(3, 3)), Some(Terrain::Grass));
    assert_eq!(cache.height_at(TilePos::new(15, 0)), Some(7));
    assert_eq!(cache.resource_at(TilePos::new(0, 0)), None);
    // Tile in a non-resident chunk.
    assert_eq!(cache.terrain_at(TilePos::new(-1, 0)), None);
  }

  #[test]
  fn slope_query_uses_precomputed_layer_when_present() {
    let mut cache = cache();
    let key = ChunkPos::new(0, 0);
    let batch = cache.request_chunks([key]);
    let mut chunk = level_chunk(100);
    chunk.slopes = Some(Grid::filled(7));
    cache.apply_batch_result(&batch[0], Ok(HashMap::from([(key, chunk)])));

    assert_eq!(cache.slope_index_at(TilePos::new(5, 5)), 7);
  }

  #[test]
  fn slope_query_on_missing_chunk_is_flat() {
    let mut cache = cache();
    assert_eq!(cache.slope_index_at(TilePos::new(123, -456)), SLOPE_FLAT);
  }

  #[test]
  fn edge_tiles_extend_flat_into_unloaded_neighbors() {
    let mut cache = cache();
    // Single level chunk; all four neighbor chunks are not resident.
    load_level_chunks(&mut cache, &[ChunkPos::new(0, 0)], 100);

    for tile in [
      TilePos::new(0, 0),
      TilePos::new(15, 0),
      TilePos::new(0, 15),
      TilePos::new(15, 15),
      TilePos::new(8, 0),
    ] {
      assert_eq!(cache.slope_index_at(tile), SLOPE_FLAT);
    }
  }

  #[test]
  fn cross_chunk_neighbors_raise_edge_tiles() {
    let mut cache = cache();
    load_level_chunks(&mut cache, &[ChunkPos::new(0, 0)], 100);
    load_level_chunks(&mut cache, &[ChunkPos::new(1, 0)], 120);

    // East edge of chunk (0,0): its east neighbor lives in the higher
    // chunk, raising the E corner (mask 0b0010 -> index 2).
    assert_eq!(cache.slope_index_at(TilePos::new(15, 5)), 2);
    // One tile inland is level on all sides.
    assert_eq!(cache.slope_index_at(TilePos::new(14, 5)), SLOPE_FLAT);
    // West edge of the higher chunk drops toward the lower one on one
    // side only; raw comparisons see W lower, not a full peak.
    assert_eq!(cache.slope_index_at(TilePos::new(16, 5)), SLOPE_FLAT);
  }

  #[test]
  fn eviction_invalidates_memoized_slopes() {
    let mut cache = cache();
    load_level_chunks(&mut cache, &[ChunkPos::new(0, 0)], 100);
    load_level_chunks(&mut cache, &[ChunkPos::new(1, 0)], 120);

    // Memoize with the neighbor present.
    assert_eq!(cache.slope_index_at(TilePos::new(15, 5)), 2);

    // With the neighbor gone the same tile must reclassify as flat; a
    // stale memo would still say 2.
    cache.evict(&[ChunkPos::new(1, 0)]);
    assert_eq!(cache.slope_index_at(TilePos::new(15, 5)), SLOPE_FLAT);
  }

  #[test]
  fn refetch_invalidates_memoized_slopes() {
    let mut cache = cache();
    let east = ChunkPos::new(1, 0);
    load_level_chunks(&mut cache, &[ChunkPos::new(0, 0)], 100);
    load_level_chunks(&mut cache, &[east], 100);
    assert_eq!(cache.slope_index_at(TilePos::new(15, 5)), SLOPE_FLAT);

    // A stale in-flight response replaces the east chunk with higher
    // ground; the west chunk's edge must pick it up.
    cache.apply_batch_result(&[east], Ok(HashMap::from([(east, level_chunk(120))])));
    assert_eq!(cache.slope_index_at(TilePos::new(15, 5)), 2);
  }

  #[test]
  fn isolated_high_tile_is_a_peak() {
    let mut cache = cache();
    let key = ChunkPos::new(0, 0);
    let batch = cache.request_chunks([key]);
    let mut chunk = level_chunk(100);
    chunk.heights.set(8, 8, 101);
    cache.apply_batch_result(&batch[0], Ok(HashMap::from([(key, chunk)])));

    assert_eq!(cache.slope_index_at(TilePos::new(8, 8)), SLOPE_PEAK);
  }

  #[test]
  fn clear_resets_everything() {
    let mut cache = cache();
    load_level_chunks(&mut cache, &[ChunkPos::new(0, 0)], 1);
    cache.request_chunks([ChunkPos::new(5, 5)]);

    cache.clear();
    assert_eq!(cache.resident_count(), 0);
    assert!(!cache.connection_status());
    assert_eq!(cache.load_state(ChunkPos::new(5, 5)), LoadState::NotRequested);
    // Previously pending key can be requested again.
    assert_eq!(
      cache.request_chunks([ChunkPos::new(5, 5)]),
      vec![vec![ChunkPos::new(5, 5)]]
    );
  }
}
