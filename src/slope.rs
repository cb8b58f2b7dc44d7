//! Slope classification from per-tile height samples.
//!
//! Each tile is classified against its four orthogonal neighbors into a
//! discrete index 0-18 that selects the height-aware visual variant:
//!
//! - 0-15: one index per combination of raised corners (N/E/S/W)
//! - 16: NE-SW diagonal ridge
//! - 17: NW-SE diagonal ridge
//! - 18: isolated center peak
//!
//! Corners are "raised" only when the neighbor exceeds the tile's height by
//! more than a threshold; the diagonal and peak shapes use raw comparisons
//! and are tested before the corner table so they remain reachable.

/// Flat tile (no raised corners).
pub const SLOPE_FLAT: u8 = 0;

/// NE-SW diagonal ridge.
pub const SLOPE_DIAGONAL_NE_SW: u8 = 16;

/// NW-SE diagonal ridge.
pub const SLOPE_DIAGONAL_NW_SE: u8 = 17;

/// Isolated center peak (all neighbors strictly below).
pub const SLOPE_PEAK: u8 = 18;

/// Number of distinct slope indices.
pub const SLOPE_INDEX_COUNT: u8 = 19;

const MASK_N: u8 = 0b0001;
const MASK_E: u8 = 0b0010;
const MASK_S: u8 = 0b0100;
const MASK_W: u8 = 0b1000;
const MASK_ALL: u8 = 0b1111;

/// Lookup table from corner mask to slope index.
///
/// Bit positions in the mask:
///   - bit 0 (1): north neighbor raised
///   - bit 1 (2): east neighbor raised
///   - bit 2 (4): south neighbor raised
///   - bit 3 (8): west neighbor raised
///
/// Every mask maps to a unique index, so the table is a bijection on 0-15.
const SLOPE_INDEX_TABLE: [u8; 16] = [
  0,  // 0b0000: flat
  1,  // 0b0001: N up
  2,  // 0b0010: E up
  3,  // 0b0011: N+E up (north-east edge)
  4,  // 0b0100: S up
  5,  // 0b0101: N+S up (opposing)
  6,  // 0b0110: E+S up (south-east edge)
  7,  // 0b0111: N+E+S up (only W down)
  8,  // 0b1000: W up
  9,  // 0b1001: N+W up (north-west edge)
  10, // 0b1010: E+W up (opposing)
  11, // 0b1011: N+E+W up (only S down)
  12, // 0b1100: S+W up (south-west edge)
  13, // 0b1101: N+S+W up (only E down)
  14, // 0b1110: E+S+W up (only N down)
  15, // 0b1111: all corners up
];

/// Classifies tiles by comparing their height against orthogonal neighbors.
#[derive(Clone, Copy, Debug)]
pub struct SlopeClassifier {
  /// A neighbor raises its corner only when more than this many height
  /// units above the tile.
  threshold: u8,
}

impl SlopeClassifier {
  /// Creates a classifier with the given raise threshold.
  pub const fn new(threshold: u8) -> Self {
    Self { threshold }
  }

  /// Builds the 4-bit raised-corner mask for a tile.
  pub fn corner_mask(&self, h: u8, north: u8, east: u8, south: u8, west: u8) -> u8 {
    let limit = h.saturating_add(self.threshold);
    let mut mask = 0;
    if north > limit {
      mask |= MASK_N;
    }
    if east > limit {
      mask |= MASK_E;
    }
    if south > limit {
      mask |= MASK_S;
    }
    if west > limit {
      mask |= MASK_W;
    }
    mask
  }

  /// Returns the slope index (0-18) for a tile given its neighbor heights.
  ///
  /// The diagonal and peak shapes are recognized from raw height
  /// comparisons before the thresholded corner table runs; otherwise every
  /// one of the 16 corner combinations maps through
  /// [`SLOPE_INDEX_TABLE`].
  pub fn classify(&self, h: u8, north: u8, east: u8, south: u8, west: u8) -> u8 {
    if north < h && east < h && south < h && west < h {
      return SLOPE_PEAK;
    }
    let ne_high = north > h && east > h && south < h && west < h;
    let sw_high = north < h && east < h && south > h && west > h;
    if ne_high || sw_high {
      return SLOPE_DIAGONAL_NE_SW;
    }
    let nw_high = north > h && west > h && south < h && east < h;
    let se_high = north < h && west < h && south > h && east > h;
    if nw_high || se_high {
      return SLOPE_DIAGONAL_NW_SE;
    }

    SLOPE_INDEX_TABLE[self.corner_mask(h, north, east, south, west) as usize]
  }
}

/// Rotates a corner mask by 90-degree steps (N -> E -> S -> W -> N).
pub fn rotate_mask(mask: u8, steps: u32) -> u8 {
  let mut rotated = mask & MASK_ALL;
  for _ in 0..steps % 4 {
    rotated = ((rotated << 1) | (rotated >> 3)) & MASK_ALL;
  }
  rotated
}

/// Rotates a slope index by 90-degree steps.
///
/// Corner indices (0-15) re-derive from the rotated mask; the table is a
/// bijection, so the index doubles as its own mask. The diagonals swap
/// with each other on odd steps; the peak is rotation-invariant.
pub fn rotate_index(index: u8, steps: u32) -> u8 {
  match index {
    0..=15 => SLOPE_INDEX_TABLE[rotate_mask(index, steps) as usize],
    SLOPE_DIAGONAL_NE_SW if steps % 2 == 1 => SLOPE_DIAGONAL_NW_SE,
    SLOPE_DIAGONAL_NW_SE if steps % 2 == 1 => SLOPE_DIAGONAL_NE_SW,
    other => other,
  }
}
