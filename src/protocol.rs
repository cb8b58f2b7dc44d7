//! Wire schema for the chunk server API.
//!
//! Responses are loosely typed on the wire (per-layer grids of strings or
//! numbers, keyed by layer name); this module deserializes them into the
//! explicit layer types of [`Chunk`] and validates dimensions and value
//! ranges on ingest. A malformed optional layer is dropped with a warning;
//! a chunk without a usable terrain layer is treated as absent from the
//! response.

use std::collections::HashMap;

use bevy::log::warn;
use serde::Deserialize;

use crate::chunk::Chunk;
use crate::grid::Grid;
use crate::tile::{ResourceKind, Terrain};

/// Top-level `/api/chunks` response: chunk-key string to payload.
#[derive(Debug, Deserialize)]
pub(crate) struct ChunkFetchResponse {
  pub chunk_data: HashMap<String, ChunkPayload>,
}

/// One chunk's payload.
///
/// The layered form carries named sub-layers; the legacy form is a bare
/// terrain grid served by older worlds and must still be accepted. Layers
/// stay raw JSON here so one unexpectedly-shaped layer drops alone instead
/// of failing the whole response.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ChunkPayload {
  Layers(HashMap<String, serde_json::Value>),
  TerrainOnly(Vec<Vec<Cell>>),
}

/// A single grid cell as serialized: heights in particular may arrive as
/// numbers or as numeric strings depending on the serializer version.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum Cell {
  Text(String),
  Number(i64),
}

impl Cell {
  fn as_text(&self) -> Option<&str> {
    match self {
      Cell::Text(s) => Some(s),
      Cell::Number(_) => None,
    }
  }

  fn as_int(&self) -> Option<i64> {
    match self {
      Cell::Number(n) => Some(*n),
      Cell::Text(s) => s.trim().parse().ok(),
    }
  }
}

/// `/api/world_info` response.
#[derive(Debug, Deserialize)]
pub(crate) struct WorldInfoResponse {
  #[serde(default)]
  pub name: Option<String>,
  #[serde(default)]
  pub seed: Option<u64>,
  pub center_chunk: CoordPair,
  pub world_size: SizePair,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CoordPair {
  pub x: i32,
  pub y: i32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SizePair {
  pub width: u32,
  pub height: u32,
}

/// Builds a [`Chunk`] from a wire payload.
///
/// Returns `None` when no valid terrain layer is present. `key` is only
/// used for log context.
pub(crate) fn chunk_from_payload(key: &str, payload: &ChunkPayload) -> Option<Chunk> {
  match payload {
    ChunkPayload::TerrainOnly(rows) => {
      let terrain = terrain_layer(rows)?;
      Some(Chunk::from_terrain(terrain))
    }
    ChunkPayload::Layers(layers) => {
      let terrain = match layer_rows(layers.get("terrain")).and_then(|rows| terrain_layer(&rows)) {
        Some(grid) => grid,
        None => {
          warn!("Chunk {key}: missing or malformed terrain layer, dropping chunk");
          return None;
        }
      };

      let mut chunk = Chunk::from_terrain(terrain);

      if layers.contains_key("resources") {
        match layer_rows(layers.get("resources")).and_then(|rows| resource_layer(&rows)) {
          Some(grid) => chunk.resources = grid,
          None => warn!("Chunk {key}: malformed resources layer dropped"),
        }
      }
      if layers.contains_key("heights") {
        match layer_rows(layers.get("heights")).and_then(|rows| numeric_layer(&rows, 255)) {
          Some(grid) => chunk.heights = grid,
          None => warn!("Chunk {key}: malformed heights layer dropped"),
        }
      }
      if layers.contains_key("slope_indices") {
        let max = crate::slope::SLOPE_INDEX_COUNT as i64 - 1;
        match layer_rows(layers.get("slope_indices")).and_then(|rows| numeric_layer(&rows, max)) {
          Some(grid) => chunk.slopes = Some(grid),
          None => warn!("Chunk {key}: malformed slope_indices layer dropped"),
        }
      }

      Some(chunk)
    }
  }
}

/// Decodes one raw layer into rows of cells; any other shape is `None`.
fn layer_rows(value: Option<&serde_json::Value>) -> Option<Vec<Vec<Cell>>> {
  serde_json::from_value(value?.clone()).ok()
}

fn terrain_layer(rows: &[Vec<Cell>]) -> Option<Grid<Terrain>> {
  let parsed = rows
    .iter()
    .map(|row| {
      row
        .iter()
        .map(|cell| {
          // Unknown labels degrade to grass (the serializer's own
          // fallback); a non-string cell makes the layer malformed.
          cell.as_text().map(|s| Terrain::from_label(s).unwrap_or_default())
        })
        .collect::<Option<Vec<_>>>()
    })
    .collect::<Option<Vec<_>>>()?;
  Grid::from_rows(parsed)
}

fn resource_layer(rows: &[Vec<Cell>]) -> Option<Grid<Option<ResourceKind>>> {
  let parsed = rows
    .iter()
    .map(|row| {
      row
        .iter()
        .map(|cell| cell.as_text().map(ResourceKind::from_label))
        .collect::<Option<Vec<_>>>()
    })
    .collect::<Option<Vec<_>>>()?;
  Grid::from_rows(parsed)
}

fn numeric_layer(rows: &[Vec<Cell>], max: i64) -> Option<Grid<u8>> {
  let parsed = rows
    .iter()
    .map(|row| {
      row
        .iter()
        .map(|cell| {
          let value = cell.as_int()?;
          (0..=max).contains(&value).then_some(value as u8)
        })
        .collect::<Option<Vec<_>>>()
    })
    .collect::<Option<Vec<_>>>()?;
  Grid::from_rows(parsed)
}
