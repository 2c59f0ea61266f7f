//! # launchwire
//!
//! Typed command/event bus for a desktop launcher whose untrusted front end,
//! privileged backend, and CPU-bound workers must talk without sharing
//! memory.
//!
//! ## Architecture
//!
//! - **Transport** (mpsc channel pair): in-order opaque frames, disconnect
//!   signalling
//! - **Registry**: stable operation names mapped to Command/Event contracts
//! - **Bus**: a [`bus::Frontend`] triggers commands and subscribes to
//!   events; a [`bus::Backend`] handles commands and publishes events
//! - **Worker offload**: [`worker::WorkerManager`] lazily spawns one
//!   dedicated thread per role, correlates calls against its private
//!   channel, and republishes worker progress on the Event Bus
//!
//! ```text
//! Frontend ──trigger──► Backend ──call──► Worker thread
//!    ▲                     │                  │
//!    └─────events──────────┴──────relay───────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use launchwire::bus::{self, BusConfig};
//! use launchwire::registry::{EndpointKind, EndpointRegistry};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> launchwire::Result<()> {
//! let mut registry = EndpointRegistry::new();
//! registry.define("main/fetch-news-feed", EndpointKind::Command)?;
//!
//! let (frontend, backend) = bus::pair(Arc::new(registry), BusConfig::default());
//! backend.handle("main/fetch-news-feed", |_: ()| async move {
//!     Ok(vec!["patch notes".to_string()])
//! })?;
//!
//! let feed: Vec<String> = frontend.trigger("main/fetch-news-feed", &()).await?;
//! assert_eq!(feed, vec!["patch notes".to_string()]);
//! # Ok(())
//! # }
//! ```

pub mod bus;
pub mod codec;
pub mod error;
pub mod proto;
pub mod registry;
pub mod transport;
pub mod worker;
pub mod workers;

pub use bus::{pair, Backend, BusConfig, EventSink, Frontend, Subscription};
pub use error::{BusError, Result};
pub use proto::{Envelope, Progress, RemoteFailure};
pub use registry::{EndpointKind, EndpointRegistry};
pub use worker::{WorkerBuilder, WorkerContext, WorkerManager, WorkerState};
