//! Connected peer pair — the command/event bus over one transport.
//!
//! [`pair`] wires a [`Frontend`] (the untrusted caller side) to a
//! [`Backend`] (the privileged handler side) and spawns one dispatch loop
//! per side. The two roles are distinct types: a `Frontend` can `trigger`
//! and `subscribe`, a `Backend` can `handle` and `publish` — invoking a
//! privileged operation from the wrong side is a compile error, not a
//! runtime surprise.
//!
//! Lifecycle: 1. build a shared [`EndpointRegistry`], 2. `pair()` it,
//! 3. register handlers on the backend, 4. trigger/subscribe from the
//! front end. Either side may `close()`; the peer observes an orderly
//! shutdown and every suspended caller settles with `ChannelClosed`.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::bus::command::{CommandHandler, CommandTable, TypedCommandHandler};
use crate::bus::event::{SubscriberTable, Subscription};
use crate::bus::pending::PendingCalls;
use crate::codec::MsgPackCodec;
use crate::error::{BusError, Result};
use crate::proto::{Envelope, RemoteFailure};
use crate::registry::{EndpointKind, EndpointRegistry};
use crate::transport::{self, MessageReceiver, MessageSender};

/// Default cap on concurrently running command handlers.
pub const DEFAULT_MAX_CONCURRENT_HANDLERS: usize = 64;

/// Bus configuration.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Cap on concurrently running handlers on the backend. Requests over
    /// the cap queue (FIFO) rather than being dropped, so every trigger
    /// still settles.
    pub max_concurrent_handlers: usize,
    /// Deadline applied to every `trigger` that does not pick its own.
    /// `None` (the default) means unbounded, which suits administrative
    /// operations; user-interactive commands usually want
    /// [`Frontend::trigger_with_timeout`].
    pub default_timeout: Option<Duration>,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            max_concurrent_handlers: DEFAULT_MAX_CONCURRENT_HANDLERS,
            default_timeout: None,
        }
    }
}

/// Create a connected front-end/backend pair over a fresh transport.
///
/// Must be called within a tokio runtime; each side spawns its dispatch
/// loop immediately.
pub fn pair(registry: Arc<EndpointRegistry>, config: BusConfig) -> (Frontend, Backend) {
    let (front_chan, back_chan) = transport::pair();
    let (front_tx, front_rx) = front_chan.split();
    let (back_tx, back_rx) = back_chan.split();

    let pending = Arc::new(PendingCalls::new());
    let subscribers = Arc::new(SubscriberTable::new());
    let front_closed = Arc::new(AtomicBool::new(false));
    let front_pump = tokio::spawn(frontend_pump(
        front_rx,
        pending.clone(),
        subscribers.clone(),
        front_closed.clone(),
    ));

    let handlers = Arc::new(CommandTable::new());
    let semaphore = Arc::new(Semaphore::new(config.max_concurrent_handlers));
    let back_closed = Arc::new(AtomicBool::new(false));
    let back_pump = tokio::spawn(backend_pump(
        back_rx,
        handlers.clone(),
        back_tx.clone(),
        semaphore,
        back_closed.clone(),
    ));

    let frontend = Frontend {
        registry: registry.clone(),
        sender: front_tx,
        pending,
        subscribers,
        closed: front_closed,
        default_timeout: config.default_timeout,
        pump: front_pump,
    };
    let backend = Backend {
        registry,
        sender: back_tx,
        handlers,
        closed: back_closed,
        pump: back_pump,
    };
    (frontend, backend)
}

/// The calling side: triggers commands, subscribes to events.
pub struct Frontend {
    registry: Arc<EndpointRegistry>,
    sender: MessageSender,
    pending: Arc<PendingCalls>,
    subscribers: Arc<SubscriberTable>,
    closed: Arc<AtomicBool>,
    default_timeout: Option<Duration>,
    pump: JoinHandle<()>,
}

impl Frontend {
    /// Invoke a named command and suspend until its correlated result.
    ///
    /// Concurrent triggers interleave freely; a slow call never blocks a
    /// fast one issued later. The call always settles: with the handler's
    /// response, with the failure the handler reported, or with a failure
    /// the bus synthesized (`ChannelClosed`, `Timeout`).
    pub async fn trigger<Req, Resp>(&self, endpoint: &str, payload: &Req) -> Result<Resp>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        self.trigger_inner(endpoint, payload, self.default_timeout)
            .await
    }

    /// Like [`Frontend::trigger`] but with an explicit per-call deadline.
    pub async fn trigger_with_timeout<Req, Resp>(
        &self,
        endpoint: &str,
        payload: &Req,
        deadline: Duration,
    ) -> Result<Resp>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        self.trigger_inner(endpoint, payload, Some(deadline)).await
    }

    async fn trigger_inner<Req, Resp>(
        &self,
        endpoint: &str,
        payload: &Req,
        deadline: Option<Duration>,
    ) -> Result<Resp>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        if self.closed.load(Ordering::Acquire) {
            return Err(BusError::ChannelClosed);
        }
        self.registry.expect(endpoint, EndpointKind::Command)?;

        let payload = MsgPackCodec::encode(payload)?;
        let (correlation, rx) = self.pending.register();
        let frame = match (Envelope::Request {
            endpoint: endpoint.to_string(),
            correlation,
            payload,
        })
        .encode()
        {
            Ok(frame) => frame,
            Err(e) => {
                self.pending.forget(correlation);
                return Err(e);
            }
        };
        if let Err(e) = self.sender.send(frame) {
            self.pending.forget(correlation);
            return Err(e);
        }

        let outcome = match deadline {
            Some(deadline) => match tokio::time::timeout(deadline, rx).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    self.pending.forget(correlation);
                    return Err(BusError::Timeout);
                }
            },
            None => rx.await,
        };

        let bytes = outcome.map_err(|_| BusError::ChannelClosed)??;
        MsgPackCodec::decode(&bytes)
    }

    /// Subscribe to a named event; the callback runs FIFO per subscription.
    ///
    /// The returned [`Subscription`] unregisters on `release()` or drop.
    pub fn subscribe<T, F>(&self, endpoint: &str, callback: F) -> Result<Subscription>
    where
        T: DeserializeOwned + Send + 'static,
        F: FnMut(T) + Send + 'static,
    {
        self.registry.expect(endpoint, EndpointKind::Event)?;
        Ok(self.subscribers.subscribe(endpoint, callback))
    }

    /// Tear the bus down from this side.
    ///
    /// Idempotent. Every call still pending settles with `ChannelClosed`,
    /// and any later `trigger` fails immediately with `ChannelClosed`.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            if let Ok(frame) = Envelope::Shutdown.encode() {
                let _ = self.sender.send(frame);
            }
            self.pending.fail_all(|| BusError::ChannelClosed);
        }
    }

    /// Whether the bus is torn down (from either side).
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Drop for Frontend {
    fn drop(&mut self) {
        self.close();
        self.pump.abort();
    }
}

/// The handling side: owns command handlers, publishes events.
pub struct Backend {
    registry: Arc<EndpointRegistry>,
    sender: MessageSender,
    handlers: Arc<CommandTable>,
    closed: Arc<AtomicBool>,
    pump: JoinHandle<()>,
}

impl Backend {
    /// Register the single handler for a command endpoint.
    ///
    /// Fails with `UnknownEndpoint`/`KindMismatch` when the name is not a
    /// defined Command, and with `DuplicateHandler` on a second
    /// registration.
    pub fn handle<Req, Resp, F, Fut>(&self, endpoint: &str, handler: F) -> Result<()>
    where
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Req: DeserializeOwned + Send + 'static,
        Fut: Future<Output = Result<Resp>> + Send + 'static,
        Resp: Serialize + Send + 'static,
    {
        self.registry.expect(endpoint, EndpointKind::Command)?;
        self.handlers
            .register(endpoint, Arc::new(TypedCommandHandler::new(handler)))
    }

    /// Publish an event to every front-end subscriber.
    ///
    /// Publishing with zero subscribers is a no-op, not an error.
    pub fn publish<T: Serialize>(&self, endpoint: &str, payload: &T) -> Result<()> {
        self.event_sink().publish(endpoint, payload)
    }

    /// A cloneable publish capability, for relays that outlive borrows of
    /// the backend (e.g. a worker manager republishing progress).
    pub fn event_sink(&self) -> EventSink {
        EventSink {
            registry: self.registry.clone(),
            sender: self.sender.clone(),
            closed: self.closed.clone(),
        }
    }

    /// Tear the bus down from this side. Idempotent.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            if let Ok(frame) = Envelope::Shutdown.encode() {
                let _ = self.sender.send(frame);
            }
        }
    }

    /// Whether the bus is torn down (from either side).
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Drop for Backend {
    fn drop(&mut self) {
        self.close();
        self.pump.abort();
    }
}

/// Cloneable handle for publishing events from the backend context.
#[derive(Clone)]
pub struct EventSink {
    registry: Arc<EndpointRegistry>,
    sender: MessageSender,
    closed: Arc<AtomicBool>,
}

impl EventSink {
    /// Publish a typed event payload.
    pub fn publish<T: Serialize>(&self, endpoint: &str, payload: &T) -> Result<()> {
        self.publish_raw(endpoint, MsgPackCodec::encode(payload)?)
    }

    /// Publish an already-encoded payload without re-serializing.
    pub(crate) fn publish_raw(&self, endpoint: &str, payload: Vec<u8>) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BusError::ChannelClosed);
        }
        self.registry.expect(endpoint, EndpointKind::Event)?;
        let frame = Envelope::Event {
            endpoint: endpoint.to_string(),
            payload,
        }
        .encode()?;
        self.sender.send(frame)
    }
}

/// Front-end dispatch loop: settles pending calls, fans out events.
async fn frontend_pump(
    mut receiver: MessageReceiver,
    pending: Arc<PendingCalls>,
    subscribers: Arc<SubscriberTable>,
    closed: Arc<AtomicBool>,
) {
    while let Some(frame) = receiver.recv().await {
        match Envelope::decode(&frame) {
            Ok(Envelope::Response {
                correlation,
                payload,
            }) => {
                pending.settle(correlation, Ok(Bytes::from(payload)));
            }
            Ok(Envelope::Failure { correlation, error }) => {
                pending.settle(correlation, Err(error.into_error()));
            }
            Ok(Envelope::Event { endpoint, payload }) => {
                subscribers.dispatch(&endpoint, Bytes::from(payload));
            }
            Ok(Envelope::Shutdown) => break,
            Ok(other) => {
                tracing::warn!("front end received unexpected envelope: {other:?}");
            }
            Err(e) => {
                tracing::warn!("front end dropped undecodable frame: {e}");
            }
        }
    }
    closed.store(true, Ordering::Release);
    pending.fail_all(|| BusError::ChannelClosed);
}

/// Backend dispatch loop: looks up handlers and runs each request in its
/// own task so a slow handler never blocks the loop.
async fn backend_pump(
    mut receiver: MessageReceiver,
    handlers: Arc<CommandTable>,
    sender: MessageSender,
    semaphore: Arc<Semaphore>,
    closed: Arc<AtomicBool>,
) {
    while let Some(frame) = receiver.recv().await {
        match Envelope::decode(&frame) {
            Ok(Envelope::Request {
                endpoint,
                correlation,
                payload,
            }) => {
                let handler = handlers.get(&endpoint);
                let sender = sender.clone();
                let semaphore = semaphore.clone();
                tokio::spawn(async move {
                    let outcome = match handler {
                        Some(handler) => {
                            let Ok(_permit) = semaphore.acquire_owned().await else {
                                return;
                            };
                            run_handler(handler, Bytes::from(payload)).await
                        }
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
                                tracing::debug!("response dropped, caller side gone");
                            }
                        }
                        Err(e) => tracing::error!("failed to encode reply: {e}"),
                    }
                });
            }
            Ok(Envelope::Shutdown) => break,
            Ok(other) => {
                tracing::warn!("backend received unexpected envelope: {other:?}");
            }
            Err(e) => {
                tracing::warn!("backend dropped undecodable frame: {e}");
            }
        }
    }
    closed.store(true, Ordering::Release);
}

/// Run one handler invocation in an isolating task, so a panic settles the
/// caller with `HandlerRejected` instead of hanging it.
async fn run_handler(handler: Arc<dyn CommandHandler>, payload: Bytes) -> Result<Vec<u8>> {
    match tokio::spawn(handler.call(payload)).await {
        Ok(result) => result,
        Err(join_err) if join_err.is_panic() => {
            Err(BusError::HandlerRejected("handler panicked".to_string()))
        }
        Err(_) => Err(BusError::HandlerRejected("handler cancelled".to_string())),
    }
}
