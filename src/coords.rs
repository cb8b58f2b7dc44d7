//! Coordinate types and spatial constants.
//!
//! Defines the coordinate system for the world:
//! - [`TilePos`]: Absolute tile position (i32, signed for worlds growing in
//!   every direction)
//! - [`ChunkPos`]: Chunk grid position (i32)
//! - [`LocalPos`]: Position within a chunk (0 to CHUNK_SIZE-1)
//! - [`IsoProjection`]: Isometric tile-space ⇄ screen-space mapping
//! - [`TileRect`]: Inclusive tile-space bounding box
//!
//! Tile space uses Y+ down in grid terms: row `y - 1` is "north" of row `y`.

use std::fmt;
use std::str::FromStr;

use bevy::math::Vec2;

/// Size of a chunk in tiles (width and height).
pub const CHUNK_SIZE: u32 = 16;

/// Absolute tile position in the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TilePos {
  pub x: i32,
  pub y: i32,
}

impl TilePos {
  /// Creates a new tile position.
  pub const fn new(x: i32, y: i32) -> Self {
    Self { x, y }
  }

  /// Convert to chunk position and local offset.
  ///
  /// Uses floor division for correct negative coordinate handling.
  /// For example, tile -1 maps to chunk -1 with local offset 15.
  pub fn to_chunk_and_local(self) -> (ChunkPos, LocalPos) {
    let size = CHUNK_SIZE as i32;
    let cx = self.x.div_euclid(size);
    let cy = self.y.div_euclid(size);
    // Local offset is always in [0, CHUNK_SIZE)
    let lx = self.x.rem_euclid(size) as u32;
    let ly = self.y.rem_euclid(size) as u32;
    (ChunkPos::new(cx, cy), LocalPos::new(lx, ly))
  }

  /// Returns the tile one step in the given grid direction.
  pub fn offset(self, dx: i32, dy: i32) -> Self {
    Self::new(self.x + dx, self.y + dy)
  }
}

/// Position in the chunk grid.
///
/// Each chunk spans [`CHUNK_SIZE`] tiles in each dimension. This is the
/// canonical cache key; the `"{x},{y}"` string form produced by `Display`
/// exists only at the wire boundary and round-trips through `FromStr`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkPos {
  pub x: i32,
  pub y: i32,
}

impl ChunkPos {
  /// Creates a new chunk position.
  pub const fn new(x: i32, y: i32) -> Self {
    Self { x, y }
  }

  /// Returns the tile position of this chunk's north-west corner.
  pub fn origin_tile(self) -> TilePos {
    let size = CHUNK_SIZE as i32;
    TilePos::new(self.x * size, self.y * size)
  }

  /// Returns the four orthogonal neighbor chunks (N, E, S, W).
  pub fn orthogonal_neighbors(self) -> [ChunkPos; 4] {
    [
      ChunkPos::new(self.x, self.y - 1),
      ChunkPos::new(self.x + 1, self.y),
      ChunkPos::new(self.x, self.y + 1),
      ChunkPos::new(self.x - 1, self.y),
    ]
  }

  /// Chebyshev distance to another chunk, in whole chunks.
  pub fn chebyshev_distance(self, other: ChunkPos) -> i32 {
    (self.x - other.x).abs().max((self.y - other.y).abs())
  }
}

impl fmt::Display for ChunkPos {
  /// Canonical wire form: signed decimal pair, comma-separated.
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{},{}", self.x, self.y)
  }
}

impl FromStr for ChunkPos {
  type Err = ();

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (x, y) = s.split_once(',').ok_or(())?;
    let x = x.parse::<i32>().map_err(|_| ())?;
    let y = y.parse::<i32>().map_err(|_| ())?;
    Ok(Self::new(x, y))
  }
}

/// Position within a chunk (0 to CHUNK_SIZE-1).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LocalPos {
  pub x: u32,
  pub y: u32,
}

impl LocalPos {
  /// Creates a new local position.
  pub const fn new(x: u32, y: u32) -> Self {
    Self { x, y }
  }
}

/// Camera/viewport state driving visibility computation.
///
/// Positions and sizes are in isometric screen pixels; `zoom` scales the
/// viewport down (zoom 2.0 shows half the area).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraState {
  /// Camera center in screen space.
  pub screen_pos: Vec2,
  /// Viewport size in screen pixels.
  pub viewport: Vec2,
  /// Zoom factor (1.0 = native).
  pub zoom: f32,
}

impl CameraState {
  /// Creates a new camera state.
  pub const fn new(screen_pos: Vec2, viewport: Vec2, zoom: f32) -> Self {
    Self {
      screen_pos,
      viewport,
      zoom,
    }
  }
}

/// Isometric projection between tile space and screen space.
///
/// A tile at (wx, wy) projects to a diamond centered horizontally at
/// `(wx - wy) * tile_width / 2` and vertically at
/// `(wx + wy) * tile_height / 2`.
#[derive(Clone, Copy, Debug)]
pub struct IsoProjection {
  pub tile_width: f32,
  pub tile_height: f32,
}

impl IsoProjection {
  /// Creates a projection for the given diamond dimensions.
  pub const fn new(tile_width: f32, tile_height: f32) -> Self {
    Self {
      tile_width,
      tile_height,
    }
  }

  /// Projects a (fractional) tile position to screen space.
  pub fn tile_to_screen(&self, tile: Vec2) -> Vec2 {
    Vec2::new(
      (tile.x - tile.y) * self.tile_width * 0.5,
      (tile.x + tile.y) * self.tile_height * 0.5,
    )
  }

  /// Inverse of [`tile_to_screen`](Self::tile_to_screen).
  pub fn screen_to_tile(&self, screen: Vec2) -> Vec2 {
    let sx = screen.x / (self.tile_width * 0.5);
    let sy = screen.y / (self.tile_height * 0.5);
    Vec2::new((sx + sy) * 0.5, (sy - sx) * 0.5)
  }

  /// Returns the tile range visible to the camera, padded on every side.
  ///
  /// Projects the four viewport corners back to tile space and takes their
  /// bounding box. All four corners are needed: the inverse projection
  /// rotates the viewport, so screen extremes are not tile extremes.
  pub fn visible_tile_range(&self, camera: &CameraState, padding: i32) -> TileRect {
    let half = camera.viewport / (2.0 * camera.zoom.max(f32::EPSILON));
    let corners = [
      camera.screen_pos + Vec2::new(-half.x, -half.y),
      camera.screen_pos + Vec2::new(half.x, -half.y),
      camera.screen_pos + Vec2::new(-half.x, half.y),
      camera.screen_pos + Vec2::new(half.x, half.y),
    ];

    let mut min = Vec2::INFINITY;
    let mut max = Vec2::NEG_INFINITY;
    for corner in corners {
      let tile = self.screen_to_tile(corner);
      min = min.min(tile);
      max = max.max(tile);
    }

    TileRect {
      min: TilePos::new(min.x.floor() as i32, min.y.floor() as i32),
      max: TilePos::new(max.x.ceil() as i32, max.y.ceil() as i32),
    }
    .expand(padding)
  }
}

/// Inclusive tile-space bounding box.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileRect {
  pub min: TilePos,
  pub max: TilePos,
}

impl TileRect {
  /// Creates a rect spanning the two corners (both inclusive).
  pub const fn new(min: TilePos, max: TilePos) -> Self {
    Self { min, max }
  }

  /// Returns the rect grown by `tiles` on every side.
  pub fn expand(&self, tiles: i32) -> TileRect {
    TileRect {
      min: TilePos::new(self.min.x - tiles, self.min.y - tiles),
      max: TilePos::new(self.max.x + tiles, self.max.y + tiles),
    }
  }

  /// Returns true if the rect contains the given tile.
  pub fn contains(&self, tile: TilePos) -> bool {
    tile.x >= self.min.x && tile.x <= self.max.x && tile.y >= self.min.y && tile.y <= self.max.y
  }

  /// Returns the inclusive chunk-space bounds covering this rect.
  pub fn chunk_bounds(&self) -> (ChunkPos, ChunkPos) {
    let (min_chunk, _) = self.min.to_chunk_and_local();
    let (max_chunk, _) = self.max.to_chunk_and_local();
    (min_chunk, max_chunk)
  }

  /// Returns an iterator over the chunk positions overlapping this rect.
  pub fn chunks(&self) -> impl Iterator<Item = ChunkPos> {
    let (min_chunk, max_chunk) = self.chunk_bounds();
    let y_range = min_chunk.y..=max_chunk.y;
    (min_chunk.x..=max_chunk.x)
      .flat_map(move |x| y_range.clone().map(move |y| ChunkPos::new(x, y)))
  }
}
