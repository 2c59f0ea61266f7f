//! Counter worker role.
//!
//! The smallest real role: a mutable count owned by the worker, mutated
//! through commands and mirrored to the front end via an event. It doubles
//! as the reference wiring for new roles — register endpoints, build the
//! runner, install the backend handlers that delegate to the manager.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::bus::{Backend, EventSink};
use crate::error::Result;
use crate::registry::{EndpointKind, EndpointRegistry};
use crate::worker::{WorkerBuilder, WorkerContext, WorkerManager, WorkerRunner};

/// Command: increment the counter, returning the new value.
pub const INCREMENT: &str = "counter/increment";
/// Command: decrement the counter, returning the new value.
pub const DECREMENT: &str = "counter/decrement";
/// Command: read the counter without changing it.
pub const GET: &str = "counter/get";
/// Event: the counter changed.
pub const UPDATED: &str = "counter/updated";

const METHOD_INCREMENT: &str = "increment";
const METHOD_DECREMENT: &str = "decrement";
const METHOD_GET: &str = "get_count";

/// State owned by one counter worker instance.
#[derive(Debug, Default)]
pub struct CounterState {
    value: i64,
}

/// Payload of the [`UPDATED`] event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterUpdate {
    pub value: i64,
}

/// Define the counter endpoints on a registry.
pub fn register(registry: &mut EndpointRegistry) -> Result<()> {
    registry.define(INCREMENT, EndpointKind::Command)?;
    registry.define(DECREMENT, EndpointKind::Command)?;
    registry.define(GET, EndpointKind::Command)?;
    registry.define(UPDATED, EndpointKind::Event)?;
    Ok(())
}

/// Build the worker role definition.
pub fn runner() -> WorkerRunner {
    WorkerBuilder::new(CounterState::default())
        .method(
            METHOD_GET,
            |state: &mut CounterState, _: (), _: &WorkerContext| Ok(state.value),
        )
        .method(
            METHOD_INCREMENT,
            |state: &mut CounterState, _: (), ctx: &WorkerContext| {
                std::thread::sleep(Duration::from_millis(10));
                state.value += 1;
                let _ = ctx.emit(UPDATED, &CounterUpdate { value: state.value });
                Ok(state.value)
            },
        )
        .method(
            METHOD_DECREMENT,
            |state: &mut CounterState, _: (), ctx: &WorkerContext| {
                std::thread::sleep(Duration::from_millis(10));
                state.value -= 1;
                let _ = ctx.emit(UPDATED, &CounterUpdate { value: state.value });
                Ok(state.value)
            },
        )
        .event(UPDATED)
        .into_runner()
}

/// Build the manager for the counter role.
pub fn manager(events: EventSink) -> WorkerManager {
    WorkerManager::new("counter", events, runner)
}

/// Install the backend command handlers that delegate to the worker.
pub fn install(backend: &Backend, manager: Arc<WorkerManager>) -> Result<()> {
    let m = manager.clone();
    backend.handle(INCREMENT, move |_: ()| {
        let m = m.clone();
        async move { m.call::<(), i64>(METHOD_INCREMENT, &()).await }
    })?;

    let m = manager.clone();
    backend.handle(DECREMENT, move |_: ()| {
        let m = m.clone();
        async move { m.call::<(), i64>(METHOD_DECREMENT, &()).await }
    })?;

    backend.handle(GET, move |_: ()| {
        let m = manager.clone();
        async move { m.call::<(), i64>(METHOD_GET, &()).await }
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{self, BusConfig, Frontend};
    use std::sync::Mutex;

    async fn counter_fixture() -> (Frontend, Backend, Arc<WorkerManager>) {
        let mut registry = EndpointRegistry::new();
        register(&mut registry).unwrap();
        let (frontend, backend) = bus::pair(Arc::new(registry), BusConfig::default());
        let manager = Arc::new(manager(backend.event_sink()));
        install(&backend, manager.clone()).unwrap();
        (frontend, backend, manager)
    }

    #[tokio::test]
    async fn test_sequential_increments() {
        let (frontend, _backend, _manager) = counter_fixture().await;

        let first: i64 = frontend.trigger(INCREMENT, &()).await.unwrap();
        let second: i64 = frontend.trigger(INCREMENT, &()).await.unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 2);

        let current: i64 = frontend.trigger(GET, &()).await.unwrap();
        assert_eq!(current, 2);
    }

    #[tokio::test]
    async fn test_concurrent_increments_lose_nothing() {
        let (frontend, _backend, _manager) = counter_fixture().await;

        let (a, b) = tokio::join!(
            frontend.trigger::<_, i64>(INCREMENT, &()),
            frontend.trigger::<_, i64>(INCREMENT, &()),
        );

        let mut values = vec![a.unwrap(), b.unwrap()];
        values.sort_unstable();
        assert_eq!(values, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_updated_event_reaches_subscribers() {
        let (frontend, _backend, _manager) = counter_fixture().await;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let _sub = frontend
            .subscribe(UPDATED, move |update: CounterUpdate| {
                seen_clone.lock().unwrap().push(update.value);
            })
            .unwrap();

        let _: i64 = frontend.trigger(INCREMENT, &()).await.unwrap();
        let _: i64 = frontend.trigger(INCREMENT, &()).await.unwrap();
        let _: i64 = frontend.trigger(DECREMENT, &()).await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 1]);
    }

    #[tokio::test]
    async fn test_destroy_resets_count() {
        let (frontend, _backend, manager) = counter_fixture().await;

        let _: i64 = frontend.trigger(INCREMENT, &()).await.unwrap();
        manager.destroy().await;

        // Respawned worker starts over from zero.
        let value: i64 = frontend.trigger(INCREMENT, &()).await.unwrap();
        assert_eq!(value, 1);
    }
}
