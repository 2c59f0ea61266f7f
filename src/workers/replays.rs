//! Replay scanner worker role.
//!
//! Scanning a folder of game-replay files and computing per-game stats is
//! the launcher's heaviest CPU work, so it runs on a dedicated worker. The
//! scan emits one progress report per file; the backend relays those on
//! [`PROGRESS`] while the originating command stays suspended until the
//! terminal [`FolderLoadResult`].
//!
//! What "parsing" a replay means is owned by the game-specific layers; this
//! role reads the file and derives summary-level data only.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};

use crate::bus::{Backend, EventSink};
use crate::error::Result;
use crate::registry::{EndpointKind, EndpointRegistry};
use crate::worker::{WorkerBuilder, WorkerContext, WorkerManager, WorkerRunner};

/// Command: scan a folder of replay files, streaming progress.
pub const LOAD_FOLDER: &str = "replays/load-folder";
/// Command: compute stats for a single replay file.
pub const GAME_STATS: &str = "replays/game-stats";
/// Event: per-file progress of an in-flight folder scan.
pub const PROGRESS: &str = "replays/progress";

const METHOD_LOAD_FOLDER: &str = "load_replay_folder";
const METHOD_LOAD_FILE: &str = "load_single_file";
const METHOD_GAME_STATS: &str = "calculate_game_stats";

/// Replay file extension the scanner picks up.
const REPLAY_EXTENSION: &str = "slp";

/// Summary-level data for one replay file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayFileSummary {
    pub name: String,
    pub full_path: String,
    pub size_bytes: u64,
    pub modified_at_ms: Option<u64>,
}

/// Terminal result of a folder scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderLoadResult {
    pub files: Vec<ReplayFileSummary>,
    /// Files matched by extension that could not be read.
    pub file_error_count: usize,
}

/// Per-game stats derived from one replay file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStats {
    pub size_bytes: u64,
    pub checksum: u32,
}

/// Combined response of the [`GAME_STATS`] command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStatsResult {
    pub file: ReplayFileSummary,
    pub stats: GameStats,
}

/// State owned by one scanner worker instance: summaries from the most
/// recent scan, keyed by path, so single-file lookups skip the disk.
#[derive(Debug, Default)]
pub struct ScannerState {
    loaded: HashMap<String, ReplayFileSummary>,
}

/// Define the replay endpoints on a registry.
pub fn register(registry: &mut EndpointRegistry) -> Result<()> {
    registry.define(LOAD_FOLDER, EndpointKind::Command)?;
    registry.define(GAME_STATS, EndpointKind::Command)?;
    registry.define(PROGRESS, EndpointKind::Event)?;
    Ok(())
}

/// Build the worker role definition.
pub fn runner() -> WorkerRunner {
    WorkerBuilder::new(ScannerState::default())
        .method(
            METHOD_LOAD_FOLDER,
            |state: &mut ScannerState, folder: String, ctx: &WorkerContext| {
                scan_folder(state, &folder, ctx)
            },
        )
        .method(
            METHOD_LOAD_FILE,
            |state: &mut ScannerState, path: String, _: &WorkerContext| {
                if let Some(summary) = state.loaded.get(&path) {
                    return Ok(summary.clone());
                }
                let summary = load_summary(Path::new(&path))?;
                state.loaded.insert(path, summary.clone());
                Ok(summary)
            },
        )
        .method(
            METHOD_GAME_STATS,
            |_: &mut ScannerState, path: String, _: &WorkerContext| {
                compute_stats(Path::new(&path))
            },
        )
        .event(PROGRESS)
        .into_runner()
}

/// Build the manager for the scanner role.
pub fn manager(events: EventSink) -> WorkerManager {
    WorkerManager::new("replays", events, runner)
}

/// Install the backend command handlers that delegate to the worker.
pub fn install(backend: &Backend, manager: Arc<WorkerManager>) -> Result<()> {
    let m = manager.clone();
    backend.handle(LOAD_FOLDER, move |folder: String| {
        let m = m.clone();
        async move {
            m.call::<String, FolderLoadResult>(METHOD_LOAD_FOLDER, &folder)
                .await
        }
    })?;

    backend.handle(GAME_STATS, move |path: String| {
        let m = manager.clone();
        async move {
            let stats: GameStats = m.call(METHOD_GAME_STATS, &path).await?;
            let file: ReplayFileSummary = m.call(METHOD_LOAD_FILE, &path).await?;
            Ok(GameStatsResult { file, stats })
        }
    })?;

    Ok(())
}

/// Scan one folder, emitting a progress report per matched file.
fn scan_folder(
    state: &mut ScannerState,
    folder: &str,
    ctx: &WorkerContext,
) -> Result<FolderLoadResult> {
    let mut entries: Vec<PathBuf> = fs::read_dir(folder)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .is_some_and(|extension| extension == REPLAY_EXTENSION)
        })
        .collect();
    entries.sort();

    let total = entries.len() as u64;
    let mut files = Vec::with_capacity(entries.len());
    let mut file_error_count = 0;

    for (index, path) in entries.iter().enumerate() {
        match load_summary(path) {
            Ok(summary) => {
                state.loaded.insert(summary.full_path.clone(), summary.clone());
                files.push(summary);
            }
            Err(e) => {
                tracing::warn!("skipping unreadable replay {}: {e}", path.display());
                file_error_count += 1;
            }
        }

        let item = path.file_name().and_then(|name| name.to_str());
        let _ = ctx.progress(PROGRESS, (index + 1) as u64, total, item);
    }

    Ok(FolderLoadResult {
        files,
        file_error_count,
    })
}

fn load_summary(path: &Path) -> Result<ReplayFileSummary> {
    let metadata = fs::metadata(path)?;
    if !metadata.is_file() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} is not a file", path.display()),
        )
        .into());
    }

    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
        .to_string();
    let modified_at_ms = metadata
        .modified()
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map(|elapsed| elapsed.as_millis() as u64);

    Ok(ReplayFileSummary {
        name,
        full_path: path.display().to_string(),
        size_bytes: metadata.len(),
        modified_at_ms,
    })
}

fn compute_stats(path: &Path) -> Result<GameStats> {
    let bytes = fs::read(path)?;
    let checksum = bytes
        .iter()
        .fold(0u32, |acc, &byte| acc.rotate_left(5) ^ u32::from(byte));

    Ok(GameStats {
        size_bytes: bytes.len() as u64,
        checksum,
    })
}
