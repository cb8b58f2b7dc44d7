//! ECS plugin and systems for world streaming.
//!
//! Mark the viewer camera with [`StreamingCamera`]; its movement drives the
//! whole pipeline: camera change -> debounced evaluation -> evict + batch
//! fetch -> merge on arrival. No rendering components are spawned here;
//! downstream collaborators react to [`ChunkLoaded`]/[`ChunkEvicted`]
//! messages and read tiles back through [`TileWorld`].

use std::sync::Arc;

use bevy::ecs::message::MessageWriter;
use bevy::prelude::*;

use crate::TileWorldConfig;
use crate::coords::{CameraState, ChunkPos};
use crate::fetch::{
  ChunkFetcher, FetchCommand, FetchDispatcher, FetchOutcome, HttpFetcher, WorldInfo,
};
use crate::world::TileWorld;

/// Marker component for the camera that controls streaming.
#[derive(Component)]
pub struct StreamingCamera;

/// Message sent when a chunk becomes resident.
#[derive(bevy::prelude::Message, Clone, Copy, Debug)]
pub struct ChunkLoaded {
  pub pos: ChunkPos,
}

/// Message sent when a chunk is evicted from the cache.
#[derive(bevy::prelude::Message, Clone, Copy, Debug)]
pub struct ChunkEvicted {
  pub pos: ChunkPos,
}

/// World identity and extent, once fetched. Progress reporting only.
#[derive(Resource, Default)]
pub struct WorldMetadata {
  pub info: Option<WorldInfo>,
}

/// Plugin for viewport-driven chunk streaming.
///
/// By default chunks are fetched over HTTP from `config.server_url`;
/// tests and embedded hosts can substitute any [`ChunkFetcher`] with
/// [`with_fetcher`](Self::with_fetcher).
#[derive(Default)]
pub struct TileWorldPlugin {
  /// Configuration for the spawned world.
  pub config: TileWorldConfig,
  fetcher: Option<Arc<dyn ChunkFetcher>>,
}

impl TileWorldPlugin {
  /// Creates the plugin with the given configuration.
  pub fn new(config: TileWorldConfig) -> Self {
    Self {
      config,
      fetcher: None,
    }
  }

  /// Replaces the HTTP fetcher with a custom chunk source.
  pub fn with_fetcher(mut self, fetcher: Arc<dyn ChunkFetcher>) -> Self {
    self.fetcher = Some(fetcher);
    self
  }
}

impl Plugin for TileWorldPlugin {
  fn build(&self, app: &mut App) {
    let fetcher = self.fetcher.clone().unwrap_or_else(|| {
      Arc::new(HttpFetcher::new(
        self.config.server_url.clone(),
        self.config.request_extended_layers,
      ))
    });

    app
      .insert_resource(self.config.clone())
      .insert_resource(TileWorld::new(&self.config))
      .insert_resource(FetchDispatcher::new(fetcher))
      .init_resource::<WorldMetadata>()
      .add_message::<ChunkLoaded>()
      .add_message::<ChunkEvicted>()
      .add_systems(Startup, request_world_info)
      .add_systems(
        Update,
        (
          track_streaming_camera,
          evaluate_streaming,
          drain_fetch_outcomes,
        )
          .chain(),
      );
  }
}

/// System: Requests world identity once at startup.
fn request_world_info(dispatcher: Res<FetchDispatcher>) {
  dispatcher.send(FetchCommand::WorldInfo);
}

/// System: Feeds camera changes into the scheduler's debounce window.
///
/// Runs only when the streaming camera actually changed, so a stationary
/// camera lets the window settle. The viewport comes from the camera's
/// orthographic projection when one is attached and initialized, and falls
/// back to the configured size otherwise (headless hosts have no render
/// systems filling in the projection area).
fn track_streaming_camera(
  cameras: Query<
    (&GlobalTransform, Option<&Projection>),
    (
      With<StreamingCamera>,
      Or<(Changed<GlobalTransform>, Changed<Projection>)>,
    ),
  >,
  config: Res<TileWorldConfig>,
  mut world: ResMut<TileWorld>,
) {
  let Ok((transform, projection)) = cameras.single() else {
    return;
  };

  let viewport = projection
    .and_then(|projection| {
      let Projection::Orthographic(ortho) = projection else {
        return None;
      };
      let size = ortho.area.max - ortho.area.min;
      // Bevy computes the area after the first frame; skip until then.
      (size.x > 0.0 && size.y > 0.0).then_some(size)
    })
    .unwrap_or_else(|| config.fallback_viewport());

  let camera = CameraState::new(transform.translation().truncate(), viewport, 1.0);
  world.scheduler.on_camera_moved(camera);
}

/// System: Runs one settled evaluation and issues the resulting work.
fn evaluate_streaming(
  mut world: ResMut<TileWorld>,
  dispatcher: Res<FetchDispatcher>,
  mut evicted: MessageWriter<ChunkEvicted>,
) {
  let world = &mut *world;
  let Some(camera) = world.scheduler.take_settled() else {
    return;
  };

  let delta = world.scheduler.evaluate(&camera, &world.cache);
  if delta.is_empty() {
    return;
  }

  world.cache.evict(&delta.to_evict);
  for pos in delta.to_evict {
    evicted.write(ChunkEvicted { pos });
  }

  for keys in world.cache.request_chunks(delta.to_fetch) {
    dispatcher.send(FetchCommand::Chunks { keys });
  }
}

/// System: Merges completed fetches into the cache.
fn drain_fetch_outcomes(
  mut world: ResMut<TileWorld>,
  dispatcher: Res<FetchDispatcher>,
  mut metadata: ResMut<WorldMetadata>,
  mut loaded: MessageWriter<ChunkLoaded>,
) {
  while let Some(outcome) = dispatcher.try_recv() {
    match outcome {
      FetchOutcome::Chunks { requested, result } => {
        let arrived: Vec<ChunkPos> = match &result {
          Ok(chunks) => chunks.keys().copied().collect(),
          Err(_) => Vec::new(),
        };
        let merged = world.cache.apply_batch_result(&requested, result);
        for pos in arrived {
          loaded.write(ChunkLoaded { pos });
        }
        if merged > 0 {
          if let Some(info) = &metadata.info {
            debug!(
              "World {:?}: {} of {} chunks resident",
              info.name,
              world.resident_count(),
              info.chunk_count()
            );
          }
        }
      }
      FetchOutcome::WorldInfo { result } => match result {
        Ok(info) => {
          info!(
            "Connected to world {:?} (seed {}), center chunk {}, {} chunks total",
            info.name,
            info.seed,
            info.center_chunk,
            info.chunk_count()
          );
          metadata.info = Some(info);
        }
        Err(error) => warn!("World info request failed: {error}"),
      },
    }
  }
}
