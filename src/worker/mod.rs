//! Worker offload — isolated execution units for CPU-bound operations.
//!
//! Provides:
//! - [`WorkerBuilder`] — define a role: owned state, named methods, events
//! - [`WorkerManager`] — lazy spawn, shared instance, crash recovery
//! - [`WorkerContext`] — fire-and-forget event emission from a running method
//!
//! # Example
//!
//! ```ignore
//! use launchwire::worker::{WorkerBuilder, WorkerContext, WorkerManager};
//!
//! let manager = WorkerManager::new("counter", backend.event_sink(), || {
//!     WorkerBuilder::new(0i64)
//!         .method("increment", |state: &mut i64, _: (), _: &WorkerContext| {
//!             *state += 1;
//!             Ok(*state)
//!         })
//!         .into_runner()
//! });
//!
//! let value: i64 = manager.call("increment", &()).await?;
//! ```

mod builder;
mod manager;
mod runtime;
mod schema;

pub use builder::{WorkerBuilder, WorkerContext, WorkerMethod, WorkerRunner};
pub use manager::{WorkerHandle, WorkerManager, WorkerState, DEFAULT_READY_TIMEOUT};
pub use schema::WorkerSchema;
