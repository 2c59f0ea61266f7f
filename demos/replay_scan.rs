//! Replay folder scan demo — worker offload with streamed progress.
//!
//! Scans the folder given as the first argument (or a generated sample
//! folder) on the replay worker, printing each progress report as it is
//! relayed to the front end, then the terminal result.
//!
//! Run with: `cargo run --example replay_scan -- /path/to/replays`

use std::sync::Arc;
use std::time::Duration;

use launchwire::bus::{self, BusConfig};
use launchwire::workers::replays;
use launchwire::{EndpointRegistry, Progress};

#[tokio::main]
async fn main() -> launchwire::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let folder = match std::env::args().nth(1) {
        Some(folder) => folder,
        None => sample_folder()?,
    };

    let mut registry = EndpointRegistry::new();
    replays::register(&mut registry)?;

    let (frontend, backend) = bus::pair(Arc::new(registry), BusConfig::default());
    let manager = Arc::new(replays::manager(backend.event_sink()));
    replays::install(&backend, manager.clone())?;

    let _subscription = frontend.subscribe(replays::PROGRESS, |progress: Progress| {
        let item = progress.item_id.as_deref().unwrap_or("?");
        println!("scan {}/{}: {item}", progress.current, progress.total);
    })?;

    let result: replays::FolderLoadResult = frontend.trigger(replays::LOAD_FOLDER, &folder).await?;
    println!(
        "loaded {} replays ({} unreadable)",
        result.files.len(),
        result.file_error_count
    );

    if let Some(first) = result.files.first() {
        let stats: replays::GameStatsResult = frontend
            .trigger(replays::GAME_STATS, &first.full_path)
            .await?;
        println!(
            "{}: {} bytes, checksum {:08x}",
            stats.file.name, stats.stats.size_bytes, stats.stats.checksum
        );
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    manager.destroy().await;
    frontend.close();

    Ok(())
}

/// Write a handful of sample replay files to scan when no folder is given.
fn sample_folder() -> launchwire::Result<String> {
    let dir = std::env::temp_dir().join("launchwire-replay-demo");
    std::fs::create_dir_all(&dir)?;
    for index in 1..=5 {
        let path = dir.join(format!("Game_2024011{index}T18304{index}.slp"));
        std::fs::write(path, format!("sample replay {index}"))?;
    }
    Ok(dir.display().to_string())
}
