//! Network fetch boundary: fetcher trait, HTTP client, and the worker-thread
//! dispatcher.
//!
//! Fetches run on a dedicated worker thread fed through async-channel
//! command/result queues, so the main schedule never blocks on the network;
//! systems drain completed outcomes with [`FetchDispatcher::try_recv`] each
//! tick. Every failure is turned into a [`FetchError`] value here; nothing
//! network-shaped escapes this module as a panic or an unwind.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use async_channel::{Receiver, Sender, TryRecvError};
use bevy::log::warn;
use bevy::prelude::Resource;

use crate::chunk::Chunk;
use crate::coords::ChunkPos;
use crate::protocol::{ChunkFetchResponse, WorldInfoResponse, chunk_from_payload};

/// Per-request timeout for the HTTP fetcher.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Error produced at the fetch boundary.
///
/// All variants are non-fatal: the cache reverts the affected keys to
/// not-requested and the next scheduling pass may retry.
#[derive(Debug)]
pub enum FetchError {
  /// Transport failure (connection refused, timeout, ...).
  Network(String),
  /// Non-success HTTP status.
  Protocol(u16),
  /// Response body could not be decoded.
  Parse(String),
  /// Requested keys absent from an otherwise successful response.
  PartialData { missing: usize },
}

impl fmt::Display for FetchError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Network(e) => write!(f, "network error: {e}"),
      Self::Protocol(status) => write!(f, "server returned status {status}"),
      Self::Parse(e) => write!(f, "malformed response: {e}"),
      Self::PartialData { missing } => write!(f, "{missing} requested chunk(s) missing from response"),
    }
  }
}

impl Error for FetchError {}

/// World identity and extent, used only for progress reporting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorldInfo {
  pub name: String,
  pub seed: u64,
  pub center_chunk: ChunkPos,
  /// World extent in chunks (width, height).
  pub size_chunks: (u32, u32),
}

impl WorldInfo {
  /// Total number of chunks the world advertises.
  pub fn chunk_count(&self) -> u64 {
    self.size_chunks.0 as u64 * self.size_chunks.1 as u64
  }
}

/// Source of chunk payloads and world metadata.
///
/// Implementations run on the dispatcher's worker thread and may block.
/// The HTTP implementation talks to a world server; tests substitute
/// in-memory fakes.
pub trait ChunkFetcher: Send + Sync {
  /// Fetches the given chunk keys in one request.
  ///
  /// Keys absent from the returned map are treated as missing (retryable),
  /// not as an error.
  fn fetch_chunks(&self, keys: &[ChunkPos]) -> Result<HashMap<ChunkPos, Chunk>, FetchError>;

  /// Fetches world identity and extent.
  fn fetch_world_info(&self) -> Result<WorldInfo, FetchError>;
}

/// HTTP implementation of [`ChunkFetcher`] against the world server API.
pub struct HttpFetcher {
  client: reqwest::blocking::Client,
  base_url: String,
  extended_layers: bool,
}

impl HttpFetcher {
  /// Creates a fetcher for the given server base URL.
  ///
  /// `extended_layers` requests height and slope layers in addition to the
  /// base terrain/resource layers.
  pub fn new(base_url: impl Into<String>, extended_layers: bool) -> Self {
    let base_url = base_url.into().trim_end_matches('/').to_string();
    Self {
      client: reqwest::blocking::Client::new(),
      base_url,
      extended_layers,
    }
  }

  /// Builds the chunks endpoint URL: one `coords=x,y` pair per key, in the
  /// canonical signed-decimal form, plus the extended-layer flag.
  fn chunks_url(&self, keys: &[ChunkPos]) -> String {
    let mut url = format!("{}/api/chunks", self.base_url);
    let mut separator = '?';
    for key in keys {
      url.push(separator);
      url.push_str("coords=");
      url.push_str(&key.to_string());
      separator = '&';
    }
    if self.extended_layers {
      url.push(separator);
      url.push_str("layers=true");
    }
    url
  }
}

impl ChunkFetcher for HttpFetcher {
  fn fetch_chunks(&self, keys: &[ChunkPos]) -> Result<HashMap<ChunkPos, Chunk>, FetchError> {
    let response = self
      .client
      .get(self.chunks_url(keys))
      .timeout(REQUEST_TIMEOUT)
      .send()
      .map_err(|e| FetchError::Network(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
      return Err(FetchError::Protocol(status.as_u16()));
    }

    let parsed: ChunkFetchResponse = response.json().map_err(|e| FetchError::Parse(e.to_string()))?;

    let mut chunks = HashMap::new();
    for (key, payload) in &parsed.chunk_data {
      let Ok(pos) = key.parse::<ChunkPos>() else {
        warn!("Discarding chunk under unparseable key {key:?}");
        continue;
      };
      if let Some(chunk) = chunk_from_payload(key, payload) {
        chunks.insert(pos, chunk);
      }
    }
    Ok(chunks)
  }

  fn fetch_world_info(&self) -> Result<WorldInfo, FetchError> {
    let response = self
      .client
      .get(format!("{}/api/world_info", self.base_url))
      .timeout(REQUEST_TIMEOUT)
      .send()
      .map_err(|e| FetchError::Network(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
      return Err(FetchError::Protocol(status.as_u16()));
    }

    let parsed: WorldInfoResponse = response.json().map_err(|e| FetchError::Parse(e.to_string()))?;
    Ok(WorldInfo {
      name: parsed.name.unwrap_or_else(|| "Unnamed World".to_string()),
      seed: parsed.seed.unwrap_or_default(),
      center_chunk: ChunkPos::new(parsed.center_chunk.x, parsed.center_chunk.y),
      size_chunks: (parsed.world_size.width, parsed.world_size.height),
    })
  }
}

/// A unit of work for the fetch worker.
#[derive(Debug)]
pub enum FetchCommand {
  /// Fetch one batch of chunk keys.
  Chunks { keys: Vec<ChunkPos> },
  /// Fetch world identity and extent.
  WorldInfo,
}

/// A completed unit of work, delivered back to the main schedule.
pub enum FetchOutcome {
  Chunks {
    /// The keys originally requested, for reverting on failure and for
    /// detecting partial responses.
    requested: Vec<ChunkPos>,
    result: Result<HashMap<ChunkPos, Chunk>, FetchError>,
  },
  WorldInfo {
    result: Result<WorldInfo, FetchError>,
  },
}

/// Fetch dispatcher using a background worker thread.
///
/// Commands queue on an unbounded channel and are issued one at a time by
/// the worker, which keeps per-key ordering trivial; the cache's pending
/// set already guarantees no key is ever in two queued batches. The worker
/// exits when the dispatcher is dropped (the command channel closes).
#[derive(Resource)]
pub struct FetchDispatcher {
  cmd_tx: Sender<FetchCommand>,
  outcome_rx: Receiver<FetchOutcome>,
  _worker_handle: JoinHandle<()>,
}

impl FetchDispatcher {
  /// Spawns the worker thread around the given fetcher.
  pub fn new(fetcher: Arc<dyn ChunkFetcher>) -> Self {
    let (cmd_tx, cmd_rx) = async_channel::unbounded::<FetchCommand>();
    let (outcome_tx, outcome_rx) = async_channel::unbounded::<FetchOutcome>();

    let worker_handle = thread::spawn(move || {
      worker_loop(fetcher, cmd_rx, outcome_tx);
    });

    Self {
      cmd_tx,
      outcome_rx,
      _worker_handle: worker_handle,
    }
  }

  /// Queues a command for the worker.
  pub fn send(&self, cmd: FetchCommand) {
    let _ = self.cmd_tx.send_blocking(cmd);
  }

  /// Returns a completed outcome, if any is waiting.
  pub fn try_recv(&self) -> Option<FetchOutcome> {
    match self.outcome_rx.try_recv() {
      Ok(outcome) => Some(outcome),
      Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => None,
    }
  }
}

/// Main worker loop running in the dedicated thread.
fn worker_loop(
  fetcher: Arc<dyn ChunkFetcher>,
  cmd_rx: Receiver<FetchCommand>,
  outcome_tx: Sender<FetchOutcome>,
) {
  while let Ok(cmd) = cmd_rx.recv_blocking() {
    let outcome = match cmd {
      FetchCommand::Chunks { keys } => {
        let result = fetcher.fetch_chunks(&keys);
        FetchOutcome::Chunks {
          requested: keys,
          result,
        }
      }
      FetchCommand::WorldInfo => FetchOutcome::WorldInfo {
        result: fetcher.fetch_world_info(),
      },
    };

    if outcome_tx.send_blocking(outcome).is_err() {
      break; // receiver gone, nothing left to report to
    }
  }
}
