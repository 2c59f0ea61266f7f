//! Error types for launchwire.

use thiserror::Error;

use crate::registry::EndpointKind;

/// Main error type for all bus and worker operations.
///
/// Transport- and lifecycle-level failures ([`BusError::ChannelClosed`],
/// [`BusError::WorkerCrashed`], [`BusError::Timeout`]) are synthesized by the
/// bus itself and delivered to the caller as a failed result. Domain failures
/// raised by a handler are captured and wrapped as
/// [`BusError::HandlerRejected`] so the caller can tell "remote handler
/// rejected" apart from "transport failed".
#[derive(Debug, Error)]
pub enum BusError {
    /// The operation name was never defined on the receiving side.
    #[error("unknown endpoint: {0}")]
    UnknownEndpoint(String),

    /// An endpoint name was used with the wrong kind (e.g. `trigger` on an
    /// Event endpoint, or `publish` on a Command endpoint).
    #[error("endpoint '{name}' is registered as {actual:?}, expected {expected:?}")]
    KindMismatch {
        name: String,
        expected: EndpointKind,
        actual: EndpointKind,
    },

    /// An endpoint name was defined twice with conflicting kinds.
    #[error("endpoint '{0}' already defined with a different kind")]
    DuplicateEndpoint(String),

    /// A second handler was registered for a Command endpoint.
    #[error("handler already registered for endpoint '{0}'")]
    DuplicateHandler(String),

    /// The per-call deadline elapsed before a response arrived.
    #[error("call timed out")]
    Timeout,

    /// The peer context terminated, or the bus was torn down.
    #[error("channel closed")]
    ChannelClosed,

    /// The worker execution unit died with calls outstanding.
    #[error("worker crashed")]
    WorkerCrashed,

    /// The remote handler reported a domain failure.
    #[error("handler rejected: {0}")]
    HandlerRejected(String),

    /// MsgPack serialization error.
    #[error("encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// I/O error (worker thread spawn, file access in worker roles).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using BusError.
pub type Result<T> = std::result::Result<T, BusError>;
