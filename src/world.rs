//! The [`TileWorld`] resource: one streaming world around one viewpoint.
//!
//! Owns the chunk cache and the viewport scheduler and re-exposes the
//! cache's tile queries. Rendering collaborators read through this
//! resource; only the plugin's systems mutate it.

use bevy::prelude::Resource;

use crate::TileWorldConfig;
use crate::cache::{ChunkCache, LoadState};
use crate::chunk::Chunk;
use crate::coords::{ChunkPos, TilePos};
use crate::streaming::ViewportScheduler;
use crate::tile::{ResourceKind, Terrain};

/// Streaming world state: chunk cache plus scheduling.
#[derive(Resource)]
pub struct TileWorld {
  pub(crate) cache: ChunkCache,
  pub(crate) scheduler: ViewportScheduler,
}

impl TileWorld {
  /// Creates an empty world from the crate configuration.
  pub fn new(config: &TileWorldConfig) -> Self {
    Self {
      cache: ChunkCache::new(config.batch_size, config.slope_threshold),
      scheduler: ViewportScheduler::new(config),
    }
  }

  /// Returns true if the chunk is resident.
  pub fn contains_chunk(&self, pos: ChunkPos) -> bool {
    self.cache.contains(pos)
  }

  /// Returns the resident chunk, if any.
  pub fn chunk(&self, pos: ChunkPos) -> Option<&Chunk> {
    self.cache.get(pos)
  }

  /// Returns the load lifecycle state of a chunk key.
  pub fn load_state(&self, pos: ChunkPos) -> LoadState {
    self.cache.load_state(pos)
  }

  /// Number of resident chunks.
  pub fn resident_count(&self) -> usize {
    self.cache.resident_count()
  }

  /// Coarse connectivity flag (observability only).
  pub fn connection_status(&self) -> bool {
    self.cache.connection_status()
  }

  /// Terrain of a tile, if its chunk is resident.
  pub fn terrain_at(&self, tile: TilePos) -> Option<Terrain> {
    self.cache.terrain_at(tile)
  }

  /// Resource marker of a tile, if its chunk is resident and marked.
  pub fn resource_at(&self, tile: TilePos) -> Option<ResourceKind> {
    self.cache.resource_at(tile)
  }

  /// Height sample of a tile, if its chunk is resident.
  pub fn height_at(&self, tile: TilePos) -> Option<u8> {
    self.cache.height_at(tile)
  }

  /// Slope index (0-18) of a tile; flat for unloaded chunks.
  pub fn slope_index_at(&mut self, tile: TilePos) -> u8 {
    self.cache.slope_index_at(tile)
  }

  /// Drops every chunk, all derived state, and any pending scheduling,
  /// as on a world switch.
  pub fn clear(&mut self) {
    self.cache.clear();
    self.scheduler.reset();
  }
}
