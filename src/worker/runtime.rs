//! Worker-side dispatch loop.
//!
//! Runs on the dedicated worker thread: announce readiness, then serve
//! requests one at a time until the host sends `Shutdown` or disconnects.
//! Methods are synchronous and run inline — a worker role is a single
//! execution unit, so calls against the same role are naturally serialized
//! while the backend stays fully responsive.
//!
//! A panicking method unwinds through the loop and ends the thread; the
//! host observes the channel drop and fails outstanding calls with
//! `WorkerCrashed`. That is deliberate: a worker that can no longer be
//! trusted with its state is torn down, not patched up mid-flight.

use crate::error::BusError;
use crate::proto::{Envelope, RemoteFailure};
use crate::transport::Channel;

use super::builder::{WorkerBuilder, WorkerContext};

/// Serve the role until shutdown or host disconnect.
pub(crate) fn run<S: Send + 'static>(builder: WorkerBuilder<S>, channel: Channel) {
    let (sender, mut receiver) = channel.split();
    let (mut state, methods, events) = builder.into_parts();

    let hello = Envelope::Hello {
        methods: methods.keys().cloned().collect(),
        events: events.clone(),
    };
    let Ok(frame) = hello.encode() else {
        return;
    };
    if sender.send(frame).is_err() {
        return;
    }

    let ctx = WorkerContext::new(sender.clone(), events.into_iter().collect());

    while let Some(frame) = receiver.blocking_recv() {
        match Envelope::decode(&frame) {
            Ok(Envelope::Request {
                endpoint,
                correlation,
                payload,
            }) => {
                let outcome = match methods.get(&endpoint) {
                    Some(method) => method.call(&mut state, &payload, &ctx),
                    None => Err(BusError::UnknownEndpoint(endpoint)),
                };
                let reply = match outcome {
                    Ok(payload) => Envelope::Response {
                        correlation,
                        payload,
                    },
                    Err(e) => Envelope::Failure {
                        correlation,
                        error: RemoteFailure::from_error(&e),
                    },
                };
                match reply.encode() {
                    Ok(frame) => {
                        if sender.send(frame).is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::error!("worker failed to encode reply: {e}"),
                }
            }
            Ok(Envelope::Shutdown) => break,
            Ok(other) => {
                tracing::warn!("worker received unexpected envelope: {other:?}");
            }
            Err(e) => {
                tracing::warn!("worker dropped undecodable frame: {e}");
            }
        }
    }
}
