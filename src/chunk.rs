//! Chunk payload: the unit of network transfer and cache residency.

use crate::grid::Grid;
use crate::tile::{ResourceKind, Terrain};

/// A fixed 16×16 block of tiles with independent per-tile layers.
///
/// Layers are only ever replaced wholesale when a chunk is (re)fetched;
/// nothing patches them tile-by-tile.
#[derive(Clone, Debug)]
pub struct Chunk {
  /// Terrain classification per tile.
  pub terrain: Grid<Terrain>,
  /// Resource marker per tile (`None` = empty).
  pub resources: Grid<Option<ResourceKind>>,
  /// Height sample per tile (0-255).
  pub heights: Grid<u8>,
  /// Server-precomputed slope indices (0-18), when the extended-layer
  /// response included them. Absent layers are classified locally.
  pub slopes: Option<Grid<u8>>,
}

impl Chunk {
  /// Creates a chunk from its terrain layer with all other layers empty.
  pub fn from_terrain(terrain: Grid<Terrain>) -> Self {
    Self {
      terrain,
      resources: Grid::new(),
      heights: Grid::new(),
      slopes: None,
    }
  }

  /// Creates a uniform chunk of one terrain at height zero.
  pub fn flat(terrain: Terrain) -> Self {
    Self::from_terrain(Grid::filled(terrain))
  }
}
