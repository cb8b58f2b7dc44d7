//! Tile-level vocabulary: terrain types and resource markers.
//!
//! Labels match the wire protocol exactly; parsing is lossless for known
//! labels and falls back conservatively for unknown ones (terrain falls
//! back to grass, resources to no marker), so new server-side vocabulary
//! degrades gracefully instead of failing a whole chunk.

/// Terrain classification of a single tile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Terrain {
  #[default]
  Grass,
  Dirt,
  Stone,
  Sand,
  Water,
  DeepWater,
  ShallowWater,
  Forest,
  Mountain,
  Snow,
  Swamp,
  Desert,
}

impl Terrain {
  /// Returns the wire label for this terrain.
  pub fn as_label(self) -> &'static str {
    match self {
      Terrain::Grass => "Grass",
      Terrain::Dirt => "Dirt",
      Terrain::Stone => "Stone",
      Terrain::Sand => "Sand",
      Terrain::Water => "Water",
      Terrain::DeepWater => "DeepWater",
      Terrain::ShallowWater => "ShallowWater",
      Terrain::Forest => "Forest",
      Terrain::Mountain => "Mountain",
      Terrain::Snow => "Snow",
      Terrain::Swamp => "Swamp",
      Terrain::Desert => "Desert",
    }
  }

  /// Parses a wire label. Unknown labels yield `None`.
  pub fn from_label(label: &str) -> Option<Terrain> {
    Some(match label {
      "Grass" => Terrain::Grass,
      "Dirt" => Terrain::Dirt,
      "Stone" => Terrain::Stone,
      "Sand" => Terrain::Sand,
      "Water" => Terrain::Water,
      "DeepWater" => Terrain::DeepWater,
      "ShallowWater" => Terrain::ShallowWater,
      "Forest" => Terrain::Forest,
      "Mountain" => Terrain::Mountain,
      "Snow" => Terrain::Snow,
      "Swamp" => Terrain::Swamp,
      "Desert" => Terrain::Desert,
      _ => return None,
    })
  }
}

/// Resource marker occupying a tile, if any.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
  TreeOak,
  TreePine,
  TreeBirch,
  Rock,
  Bush,
  Flower,
}

impl ResourceKind {
  /// Returns the wire label for this resource.
  pub fn as_label(self) -> &'static str {
    match self {
      ResourceKind::TreeOak => "TreeOak",
      ResourceKind::TreePine => "TreePine",
      ResourceKind::TreeBirch => "TreeBirch",
      ResourceKind::Rock => "Rock",
      ResourceKind::Bush => "Bush",
      ResourceKind::Flower => "Flower",
    }
  }

  /// Parses a wire label. The empty string and unknown labels yield `None`.
  pub fn from_label(label: &str) -> Option<ResourceKind> {
    Some(match label {
      "TreeOak" => ResourceKind::TreeOak,
      "TreePine" => ResourceKind::TreePine,
      "TreeBirch" => ResourceKind::TreeBirch,
      "Rock" => ResourceKind::Rock,
      "Bush" => ResourceKind::Bush,
      "Flower" => ResourceKind::Flower,
      _ => return None,
    })
  }
}
