//! Wire envelopes — the transport-neutral structured form.
//!
//! Every message crossing a context boundary is one [`Envelope`], encoded
//! with MsgPack. Command/event payloads travel inside the envelope as opaque
//! byte buffers and are only decoded to their concrete type on the side that
//! declared it, so a mismatched payload never poisons the dispatch loop.
//!
//! Correlation ids — not arrival order — match a [`Envelope::Response`] or
//! [`Envelope::Failure`] to its [`Envelope::Request`].
//!
//! # Example
//!
//! ```
//! use launchwire::proto::Envelope;
//!
//! let env = Envelope::Request {
//!     endpoint: "counter/increment".to_string(),
//!     correlation: 7,
//!     payload: vec![0xc0],
//! };
//! let frame = env.encode().unwrap();
//! assert_eq!(Envelope::decode(&frame).unwrap(), env);
//! ```

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::codec::MsgPackCodec;
use crate::error::{BusError, Result};

/// A single message on a channel transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Envelope {
    /// Readiness announcement sent by a worker as its very first message,
    /// carrying the method/event schema the worker exposes.
    Hello {
        methods: Vec<String>,
        events: Vec<String>,
    },
    /// A correlated command invocation.
    Request {
        endpoint: String,
        correlation: u64,
        #[serde(with = "serde_bytes")]
        payload: Vec<u8>,
    },
    /// Successful result for the request with the same correlation id.
    Response {
        correlation: u64,
        #[serde(with = "serde_bytes")]
        payload: Vec<u8>,
    },
    /// Failed result for the request with the same correlation id.
    Failure {
        correlation: u64,
        error: RemoteFailure,
    },
    /// Fire-and-forget notification; never correlated, never answered.
    Event {
        endpoint: String,
        #[serde(with = "serde_bytes")]
        payload: Vec<u8>,
    },
    /// Orderly teardown marker. Delivered in order after any messages sent
    /// before it, so the receiving side can drain first.
    Shutdown,
}

impl Envelope {
    /// Encode the envelope to a transport frame.
    pub fn encode(&self) -> Result<Bytes> {
        Ok(Bytes::from(MsgPackCodec::encode(self)?))
    }

    /// Decode an envelope from a transport frame.
    pub fn decode(frame: &[u8]) -> Result<Envelope> {
        MsgPackCodec::decode(frame)
    }
}

/// Failure kinds that cross a channel.
///
/// This is the serializable mirror of the [`BusError`] variants a remote
/// side is allowed to produce; it is re-hydrated to a `BusError` on the
/// calling side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteFailure {
    /// No handler registered under the requested endpoint name.
    UnknownEndpoint { endpoint: String },
    /// The handler reported a domain failure.
    Rejected { message: String },
    /// The execution unit backing the endpoint died mid-call.
    Crashed,
}

impl RemoteFailure {
    /// Build the wire form of a handler-side error.
    pub fn from_error(err: &BusError) -> RemoteFailure {
        match err {
            BusError::UnknownEndpoint(endpoint) => RemoteFailure::UnknownEndpoint {
                endpoint: endpoint.clone(),
            },
            BusError::HandlerRejected(message) => RemoteFailure::Rejected {
                message: message.clone(),
            },
            BusError::WorkerCrashed => RemoteFailure::Crashed,
            other => RemoteFailure::Rejected {
                message: other.to_string(),
            },
        }
    }

    /// Re-hydrate into a [`BusError`] on the calling side.
    pub fn into_error(self) -> BusError {
        match self {
            RemoteFailure::UnknownEndpoint { endpoint } => BusError::UnknownEndpoint(endpoint),
            RemoteFailure::Rejected { message } => BusError::HandlerRejected(message),
            RemoteFailure::Crashed => BusError::WorkerCrashed,
        }
    }
}

/// Partial-completion report for a long-running operation.
///
/// Produced repeatedly by a worker, republished on an Event endpoint,
/// consumed by zero-or-more subscribers. Purely transient. The final report
/// of an operation, if any, has `current == total`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Units of work completed so far.
    pub current: u64,
    /// Total units of work; always `>= current`.
    pub total: u64,
    /// Identifier of the item just processed, when one exists.
    pub item_id: Option<String>,
}
