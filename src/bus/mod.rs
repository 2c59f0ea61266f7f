//! Command/event bus — the request/response and publish/subscribe layer.
//!
//! Provides:
//! - [`pair`] — wire a [`Frontend`] to a [`Backend`] over one transport
//! - [`Frontend`] — `trigger` commands, `subscribe` to events
//! - [`Backend`] — `handle` commands, `publish` events
//! - [`Subscription`] — releasable handle for one event listener
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use launchwire::bus::{pair, BusConfig};
//! use launchwire::registry::{EndpointKind, EndpointRegistry};
//!
//! let mut registry = EndpointRegistry::new();
//! registry.define("settings/get-iso-path", EndpointKind::Command)?;
//!
//! let (frontend, backend) = pair(Arc::new(registry), BusConfig::default());
//! backend.handle("settings/get-iso-path", |_: ()| async move {
//!     Ok("/path/to/game.iso".to_string())
//! })?;
//!
//! let path: String = frontend.trigger("settings/get-iso-path", &()).await?;
//! ```

mod command;
mod event;
mod pending;
mod peer;

pub use command::{BoxFuture, CommandHandler, CommandTable, TypedCommandHandler};
pub use event::{SubscriberTable, Subscription};
pub use pending::{CallOutcome, PendingCalls};
pub use peer::{
    pair, Backend, BusConfig, EventSink, Frontend, DEFAULT_MAX_CONCURRENT_HANDLERS,
};
