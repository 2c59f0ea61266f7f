//! Integration tests for launchwire.
//!
//! These exercise the assembled system the way the launcher does: one
//! shared registry, a front-end/backend pair, worker roles installed on
//! the backend, and events flowing back to front-end subscribers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use launchwire::bus::{self, Backend, BusConfig, Frontend};
use launchwire::workers::{counter, replays};
use launchwire::{BusError, EndpointKind, EndpointRegistry, Progress, WorkerManager};

#[derive(Debug, Serialize, Deserialize)]
struct DelayedEcho {
    tag: String,
    delay_ms: u64,
}

/// Registry with the built-in roles plus a few plain backend endpoints.
fn launcher_registry() -> Arc<EndpointRegistry> {
    let mut registry = EndpointRegistry::new();
    counter::register(&mut registry).unwrap();
    replays::register(&mut registry).unwrap();
    registry
        .define("clock/delayed-echo", EndpointKind::Command)
        .unwrap();
    registry.define("main/hang", EndpointKind::Command).unwrap();
    registry.define("ghost/ping", EndpointKind::Command).unwrap();
    Arc::new(registry)
}

fn launcher_pair(config: BusConfig) -> (Frontend, Backend) {
    bus::pair(launcher_registry(), config)
}

/// Round-trip correctness: the caller receives exactly what the handler
/// returns for its payload.
#[tokio::test]
async fn test_trigger_roundtrip_with_typed_payload() {
    let (frontend, backend) = launcher_pair(BusConfig::default());

    backend
        .handle("clock/delayed-echo", |input: DelayedEcho| async move {
            Ok(format!("echo:{}", input.tag))
        })
        .unwrap();

    let result: String = frontend
        .trigger(
            "clock/delayed-echo",
            &DelayedEcho {
                tag: "hello".to_string(),
                delay_ms: 0,
            },
        )
        .await
        .unwrap();
    assert_eq!(result, "echo:hello");
}

/// A defined endpoint with no registered handler fails with
/// `UnknownEndpoint` — it never hangs.
#[tokio::test]
async fn test_no_handler_fails_instead_of_hanging() {
    let (frontend, _backend) = launcher_pair(BusConfig::default());

    let outcome = tokio::time::timeout(
        Duration::from_secs(2),
        frontend.trigger::<_, ()>("ghost/ping", &()),
    )
    .await
    .expect("trigger must settle");
    assert!(matches!(outcome, Err(BusError::UnknownEndpoint(_))));
}

/// Registering a second handler for the same command fails the second
/// registration.
#[tokio::test]
async fn test_duplicate_handler_rejected() {
    let (_frontend, backend) = launcher_pair(BusConfig::default());

    backend
        .handle("ghost/ping", |_: ()| async move { Ok(()) })
        .unwrap();
    let err = backend
        .handle("ghost/ping", |_: ()| async move { Ok(()) })
        .unwrap_err();
    assert!(matches!(err, BusError::DuplicateHandler(_)));
}

/// Correlation correctness under interleaving: responses arrive out of
/// issuance order and every caller still gets its own value.
#[tokio::test]
async fn test_concurrent_triggers_resolve_by_correlation() {
    let (frontend, backend) = launcher_pair(BusConfig::default());

    backend
        .handle("clock/delayed-echo", |input: DelayedEcho| async move {
            tokio::time::sleep(Duration::from_millis(input.delay_ms)).await;
            Ok(input.tag)
        })
        .unwrap();

    let frontend = Arc::new(frontend);
    let mut tasks = Vec::new();
    // Earliest-issued call is the slowest, so responses come back reversed.
    for (index, delay_ms) in [120u64, 80, 40, 0].into_iter().enumerate() {
        let frontend = frontend.clone();
        tasks.push(tokio::spawn(async move {
            let tag = format!("call-{index}");
            let result: String = frontend
                .trigger(
                    "clock/delayed-echo",
                    &DelayedEcho {
                        tag: tag.clone(),
                        delay_ms,
                    },
                )
                .await
                .unwrap();
            (tag, result)
        }));
    }

    for task in tasks {
        let (tag, result) = task.await.unwrap();
        assert_eq!(result, tag);
    }
}

/// Disconnect with calls pending: all of them settle with `ChannelClosed`,
/// none hang.
#[tokio::test]
async fn test_disconnect_fails_all_pending_calls() {
    let (frontend, backend) = launcher_pair(BusConfig::default());

    backend
        .handle("main/hang", |_: ()| async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .unwrap();

    let frontend = Arc::new(frontend);
    let tasks: Vec<_> = (0..3)
        .map(|_| {
            let frontend = frontend.clone();
            tokio::spawn(async move { frontend.trigger::<_, ()>("main/hang", &()).await })
        })
        .collect();

    // Let the requests reach the backend before it goes away.
    tokio::time::sleep(Duration::from_millis(50)).await;
    backend.close();

    for task in tasks {
        let outcome = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("pending call must settle")
            .unwrap();
        assert!(matches!(outcome, Err(BusError::ChannelClosed)));
    }

    // And the torn-down bus rejects new work immediately.
    let err = frontend.trigger::<_, ()>("main/hang", &()).await.unwrap_err();
    assert!(matches!(err, BusError::ChannelClosed));
}

/// Per-call deadline from the bus config.
#[tokio::test]
async fn test_default_timeout_applies() {
    let config = BusConfig {
        default_timeout: Some(Duration::from_millis(50)),
        ..BusConfig::default()
    };
    let (frontend, backend) = launcher_pair(config);

    backend
        .handle("main/hang", |_: ()| async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .unwrap();

    let err = frontend.trigger::<_, ()>("main/hang", &()).await.unwrap_err();
    assert!(matches!(err, BusError::Timeout));
}

/// Released subscriptions stop receiving while live ones keep going.
#[tokio::test]
async fn test_subscription_release_isolation() {
    let (frontend, backend) = launcher_pair(BusConfig::default());

    let released_hits = Arc::new(AtomicUsize::new(0));
    let kept_hits = Arc::new(AtomicUsize::new(0));

    let hits = released_hits.clone();
    let released = frontend
        .subscribe(counter::UPDATED, move |_: counter::CounterUpdate| {
            hits.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    let hits = kept_hits.clone();
    let _kept = frontend
        .subscribe(counter::UPDATED, move |_: counter::CounterUpdate| {
            hits.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    backend
        .publish(counter::UPDATED, &counter::CounterUpdate { value: 1 })
        .unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    released.release();
    backend
        .publish(counter::UPDATED, &counter::CounterUpdate { value: 2 })
        .unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    assert_eq!(released_hits.load(Ordering::SeqCst), 1);
    assert_eq!(kept_hits.load(Ordering::SeqCst), 2);
}

/// The full launcher assembly: two worker roles behind one backend, with
/// progress streaming back to a front-end subscriber.
#[tokio::test]
async fn test_launcher_assembly_end_to_end() {
    let (frontend, backend) = launcher_pair(BusConfig::default());

    let counter_manager = Arc::new(counter::manager(backend.event_sink()));
    counter::install(&backend, counter_manager.clone()).unwrap();
    let replay_manager = Arc::new(replays::manager(backend.event_sink()));
    replays::install(&backend, replay_manager.clone()).unwrap();

    // Counter role: sequential increments from zero.
    let first: i64 = frontend.trigger(counter::INCREMENT, &()).await.unwrap();
    let second: i64 = frontend.trigger(counter::INCREMENT, &()).await.unwrap();
    assert_eq!((first, second), (1, 2));

    // Replay role: scan a folder of three files, watching progress.
    let dir = tempfile::tempdir().unwrap();
    for name in ["one.slp", "two.slp", "three.slp"] {
        std::fs::write(dir.path().join(name), name).unwrap();
    }

    let progress_log = Arc::new(Mutex::new(Vec::new()));
    let log = progress_log.clone();
    let _sub = frontend
        .subscribe(replays::PROGRESS, move |progress: Progress| {
            log.lock().unwrap().push((progress.current, progress.total));
        })
        .unwrap();

    let folder = dir.path().display().to_string();
    let result: replays::FolderLoadResult =
        frontend.trigger(replays::LOAD_FOLDER, &folder).await.unwrap();
    assert_eq!(result.files.len(), 3);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(*progress_log.lock().unwrap(), vec![(1, 3), (2, 3), (3, 3)]);

    // Both workers are live and independent.
    let count: i64 = frontend.trigger(counter::GET, &()).await.unwrap();
    assert_eq!(count, 2);
}

/// Worker teardown through the manager leaves the bus usable and the role
/// respawnable.
#[tokio::test]
async fn test_worker_destroy_then_respawn_via_bus() {
    let (frontend, backend) = launcher_pair(BusConfig::default());
    let manager = Arc::new(counter::manager(backend.event_sink()));
    counter::install(&backend, manager.clone()).unwrap();

    let value: i64 = frontend.trigger(counter::INCREMENT, &()).await.unwrap();
    assert_eq!(value, 1);

    manager.destroy().await;

    // Fresh instance, fresh state.
    let value: i64 = frontend.trigger(counter::INCREMENT, &()).await.unwrap();
    assert_eq!(value, 1);
}

/// A worker crash surfaces to bus callers as a failed result and the next
/// call recovers.
#[tokio::test]
async fn test_worker_crash_surfaces_and_recovers() {
    let mut registry = EndpointRegistry::new();
    registry.define("fragile/run", EndpointKind::Command).unwrap();
    let (frontend, backend) = bus::pair(Arc::new(registry), BusConfig::default());

    let manager = Arc::new(WorkerManager::new(
        "fragile",
        backend.event_sink(),
        || {
            launchwire::WorkerBuilder::new(0u32)
                .method(
                    "run",
                    |state: &mut u32, crash: bool, _: &launchwire::WorkerContext| {
                        assert!(!crash, "crash requested");
                        *state += 1;
                        Ok(*state)
                    },
                )
                .into_runner()
        },
    ));

    let m = manager.clone();
    backend
        .handle("fragile/run", move |crash: bool| {
            let m = m.clone();
            async move { m.call::<bool, u32>("run", &crash).await }
        })
        .unwrap();

    let ok: u32 = frontend.trigger("fragile/run", &false).await.unwrap();
    assert_eq!(ok, 1);

    let err = frontend.trigger::<_, u32>("fragile/run", &true).await.unwrap_err();
    assert!(matches!(err, BusError::WorkerCrashed));

    let recovered: u32 = frontend.trigger("fragile/run", &false).await.unwrap();
    assert_eq!(recovered, 1);
}
