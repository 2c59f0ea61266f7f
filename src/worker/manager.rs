//! Worker offload manager — lazy spawn, shared instance, crash recovery.
//!
//! One manager owns one worker role. The first call spawns the dedicated
//! thread and awaits its readiness announcement; callers arriving during
//! `Starting` queue on the same in-flight spawn instead of racing to spawn
//! duplicates. While `Ready`, any number of invocations may be issued —
//! each is a correlated request on the worker's private channel.
//!
//! If the worker thread dies unexpectedly, every outstanding call fails
//! with `WorkerCrashed` and the role returns to `Idle`, so the next call
//! respawns a fresh instance instead of hanging.
//!
//! Events the worker emits (progress reports) are republished on the
//! Event Bus through the manager's [`EventSink`], before the terminal
//! command result resolves.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::bus::{EventSink, PendingCalls};
use crate::codec::MsgPackCodec;
use crate::error::{BusError, Result};
use crate::proto::Envelope;
use crate::transport::{self, MessageReceiver, MessageSender};

use super::builder::WorkerRunner;
use super::schema::WorkerSchema;

/// How long to wait for a fresh worker's readiness announcement.
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifecycle state of a worker role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// No live instance; the next call spawns one.
    Idle,
    /// Spawn in flight; concurrent callers share it.
    Starting,
    /// Instance up and serving calls.
    Ready,
    /// Explicitly torn down. A later call respawns.
    Terminated,
}

/// Manager for one worker role.
pub struct WorkerManager {
    role: String,
    factory: Box<dyn Fn() -> WorkerRunner + Send + Sync>,
    events: EventSink,
    slot: Mutex<Option<Arc<WorkerHandle>>>,
    state: Arc<StdMutex<WorkerState>>,
    ready_timeout: Duration,
}

impl WorkerManager {
    /// Create a manager for `role`.
    ///
    /// `factory` builds a fresh runner per (re)spawn, so respawned workers
    /// start from pristine state. Worker-emitted events are republished
    /// through `events`.
    pub fn new<F>(role: impl Into<String>, events: EventSink, factory: F) -> Self
    where
        F: Fn() -> WorkerRunner + Send + Sync + 'static,
    {
        Self {
            role: role.into(),
            factory: Box::new(factory),
            events,
            slot: Mutex::new(None),
            state: Arc::new(StdMutex::new(WorkerState::Idle)),
            ready_timeout: DEFAULT_READY_TIMEOUT,
        }
    }

    /// Override the readiness deadline.
    pub fn with_ready_timeout(mut self, deadline: Duration) -> Self {
        self.ready_timeout = deadline;
        self
    }

    /// The role name.
    pub fn role(&self) -> &str {
        &self.role
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WorkerState {
        *self.state.lock().expect("worker state poisoned")
    }

    /// Invoke a named method, lazily spawning the worker first if needed.
    pub async fn call<Req, Resp>(&self, method: &str, payload: &Req) -> Result<Resp>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let handle = self.acquire().await?;
        handle.call(method, payload).await
    }

    /// Tear the live instance down. Safe to call in every state; a later
    /// call respawns.
    ///
    /// The shutdown marker queues behind requests already sent, so the
    /// worker drains those before exiting.
    pub async fn destroy(&self) {
        let mut slot = self.slot.lock().await;
        if let Some(handle) = slot.take() {
            handle.closing.store(true, Ordering::Release);
            if let Ok(frame) = Envelope::Shutdown.encode() {
                let _ = handle.sender.send(frame);
            }
        }
        self.set_state(WorkerState::Terminated);
    }

    fn set_state(&self, state: WorkerState) {
        *self.state.lock().expect("worker state poisoned") = state;
    }

    /// Return the live handle, spawning a fresh worker when there is none.
    ///
    /// The slot lock is held across spawn and handshake, which is what
    /// makes concurrent first callers share one spawn.
    async fn acquire(&self) -> Result<Arc<WorkerHandle>> {
        let mut slot = self.slot.lock().await;
        if let Some(handle) = slot.as_ref() {
            if handle.is_alive() {
                return Ok(handle.clone());
            }
        }
        *slot = None;
        self.set_state(WorkerState::Starting);

        let runner = (self.factory)();
        let (host, worker) = transport::pair();
        let spawned = std::thread::Builder::new()
            .name(format!("{}-worker", self.role))
            .spawn(move || runner(worker));
        let _detached = match spawned {
            Ok(join) => join,
            Err(e) => {
                self.set_state(WorkerState::Idle);
                return Err(BusError::Io(e));
            }
        };

        let (sender, mut receiver) = host.split();
        let schema = match self.await_hello(&mut receiver).await {
            Ok(schema) => schema,
            Err(e) => {
                self.set_state(WorkerState::Idle);
                return Err(e);
            }
        };

        let pending = Arc::new(PendingCalls::new());
        let alive = Arc::new(AtomicBool::new(true));
        let closing = Arc::new(AtomicBool::new(false));
        tokio::spawn(host_pump(
            receiver,
            pending.clone(),
            alive.clone(),
            closing.clone(),
            self.state.clone(),
            self.events.clone(),
            self.role.clone(),
        ));

        let handle = Arc::new(WorkerHandle {
            sender,
            pending,
            schema,
            alive,
            closing,
        });
        *slot = Some(handle.clone());
        self.set_state(WorkerState::Ready);
        Ok(handle)
    }

    async fn await_hello(&self, receiver: &mut MessageReceiver) -> Result<WorkerSchema> {
        match tokio::time::timeout(self.ready_timeout, receiver.recv()).await {
            Ok(Some(frame)) => match Envelope::decode(&frame)? {
                Envelope::Hello { methods, events } => Ok(WorkerSchema::new(methods, events)),
                other => {
                    tracing::error!(
                        worker = %self.role,
                        "expected readiness announcement, got {other:?}"
                    );
                    Err(BusError::WorkerCrashed)
                }
            },
            Ok(None) => {
                tracing::error!(worker = %self.role, "worker died before announcing readiness");
                Err(BusError::WorkerCrashed)
            }
            Err(_elapsed) => {
                tracing::error!(worker = %self.role, "worker readiness deadline elapsed");
                Err(BusError::WorkerCrashed)
            }
        }
    }
}

/// One live worker instance, shared across callers via `Arc`.
pub struct WorkerHandle {
    sender: MessageSender,
    pending: Arc<PendingCalls>,
    schema: WorkerSchema,
    alive: Arc<AtomicBool>,
    closing: Arc<AtomicBool>,
}

impl WorkerHandle {
    /// Whether the instance is still serving.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire) && !self.closing.load(Ordering::Acquire)
    }

    /// Invoke a named method against this instance.
    pub async fn call<Req, Resp>(&self, method: &str, payload: &Req) -> Result<Resp>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        if !self.is_alive() {
            return Err(BusError::WorkerCrashed);
        }
        if !self.schema.has_method(method) {
            return Err(BusError::UnknownEndpoint(method.to_string()));
        }

        let payload = MsgPackCodec::encode(payload)?;
        let (correlation, rx) = self.pending.register();
        let frame = match (Envelope::Request {
            endpoint: method.to_string(),
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
        if self.sender.send(frame).is_err() {
            self.pending.forget(correlation);
            return Err(BusError::WorkerCrashed);
        }

        let bytes = rx.await.map_err(|_| BusError::WorkerCrashed)??;
        MsgPackCodec::decode(&bytes)
    }
}

/// Host-side loop for one worker instance: settles calls, relays events,
/// detects death.
async fn host_pump(
    mut receiver: MessageReceiver,
    pending: Arc<PendingCalls>,
    alive: Arc<AtomicBool>,
    closing: Arc<AtomicBool>,
    state: Arc<StdMutex<WorkerState>>,
    events: EventSink,
    role: String,
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
                if let Err(e) = events.publish_raw(&endpoint, payload) {
                    tracing::debug!(worker = %role, "event relay dropped: {e}");
                }
            }
            Ok(other) => {
                tracing::warn!(worker = %role, "unexpected envelope from worker: {other:?}");
            }
            Err(e) => {
                tracing::warn!(worker = %role, "dropped undecodable worker frame: {e}");
            }
        }
    }

    alive.store(false, Ordering::Release);
    if closing.load(Ordering::Acquire) {
        pending.fail_all(|| BusError::ChannelClosed);
        *state.lock().expect("worker state poisoned") = WorkerState::Terminated;
    } else {
        tracing::warn!(worker = %role, "worker exited unexpectedly");
        pending.fail_all(|| BusError::WorkerCrashed);
        *state.lock().expect("worker state poisoned") = WorkerState::Idle;
    }
}
