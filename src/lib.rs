//! Tile World - streaming isometric tile-world core for Bevy.
//!
//! This crate keeps only the spatial neighborhood of a moving viewpoint
//! resident in memory: it decides which 16×16 tile chunks the camera can
//! see, fetches them in deduplicated batches from a world server, and
//! derives per-tile slope indices (0-18) from height samples, resolving
//! neighbor lookups across chunk boundaries.
//!
//! Drawing, input, and UI are deliberately out of scope: mark a camera
//! with [`StreamingCamera`], then read tiles back through the
//! [`TileWorld`] resource and react to [`ChunkLoaded`]/[`ChunkEvicted`]
//! messages from your own rendering systems.

use std::time::Duration;

use bevy::math::Vec2;
use bevy::prelude::Resource;
use serde::{Deserialize, Serialize};

pub mod cache;
pub mod chunk;
pub mod coords;
pub mod fetch;
pub mod grid;
pub mod plugin;
mod protocol;
pub mod slope;
pub mod streaming;
pub mod tile;
pub mod world;

pub use cache::{ChunkCache, LoadState};
pub use chunk::Chunk;
pub use coords::{
  CHUNK_SIZE, CameraState, ChunkPos, IsoProjection, LocalPos, TilePos, TileRect,
};
pub use fetch::{
  ChunkFetcher, FetchCommand, FetchDispatcher, FetchError, FetchOutcome, HttpFetcher, WorldInfo,
};
pub use grid::Grid;
pub use plugin::{ChunkEvicted, ChunkLoaded, StreamingCamera, TileWorldPlugin, WorldMetadata};
pub use slope::{
  SLOPE_DIAGONAL_NE_SW, SLOPE_DIAGONAL_NW_SE, SLOPE_FLAT, SLOPE_PEAK, SlopeClassifier,
  rotate_index, rotate_mask,
};
pub use streaming::{StreamingDelta, ViewportScheduler};
pub use tile::{ResourceKind, Terrain};
pub use world::TileWorld;

/// Configuration for a streaming tile world.
///
/// Every knob has a sensible default; hosts typically override only the
/// server URL. The struct deserializes from TOML so viewer settings files
/// can carry it:
///
/// ```ignore
/// let config: TileWorldConfig = toml::from_str(&contents)?;
/// ```
#[derive(Resource, Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TileWorldConfig {
  /// Base URL of the world server.
  pub server_url: String,
  /// Isometric tile diamond width in screen pixels.
  pub tile_width: f32,
  /// Isometric tile diamond height in screen pixels.
  pub tile_height: f32,
  /// Viewport size used when the camera carries no initialized
  /// orthographic projection (headless hosts, tests).
  pub viewport_width: f32,
  /// See [`viewport_width`](Self::viewport_width).
  pub viewport_height: f32,
  /// Extra tiles added around the projected viewport on every side.
  pub padding_tiles: i32,
  /// Extra chunks kept resident around the visible range on every side.
  pub buffer_chunks: i32,
  /// Minimum center-chunk movement (Chebyshev) before re-evaluating.
  pub hysteresis_chunks: i32,
  /// Maximum chunk keys per fetch request.
  pub batch_size: usize,
  /// Camera settle time before an evaluation runs, in milliseconds.
  pub debounce_ms: u64,
  /// Height difference beyond which a neighbor raises a slope corner.
  pub slope_threshold: u8,
  /// Request height and slope layers in addition to terrain/resources.
  pub request_extended_layers: bool,
}

impl Default for TileWorldConfig {
  fn default() -> Self {
    Self {
      server_url: "http://127.0.0.1:54321".to_string(),
      tile_width: 64.0,
      tile_height: 32.0,
      viewport_width: 1280.0,
      viewport_height: 720.0,
      padding_tiles: 2,
      buffer_chunks: 1,
      hysteresis_chunks: 1,
      batch_size: 10,
      debounce_ms: 100,
      slope_threshold: 5,
      request_extended_layers: true,
    }
  }
}

impl TileWorldConfig {
  /// Camera debounce window as a duration.
  pub fn debounce(&self) -> Duration {
    Duration::from_millis(self.debounce_ms)
  }

  /// Viewport used when no projection information is available.
  pub fn fallback_viewport(&self) -> Vec2 {
    Vec2::new(self.viewport_width, self.viewport_height)
  }
}
