//! Worker role definition — fluent method registration.
//!
//! A worker role is a set of named synchronous methods over one explicitly
//! owned state value. Methods receive `&mut State`, the deserialized input,
//! and a [`WorkerContext`] for emitting fire-and-forget events (progress)
//! while they run. Payload decode and result encode live in a typed
//! wrapper, so the worker's dispatch loop only deals in bytes.
//!
//! # Example
//!
//! ```
//! use launchwire::worker::{WorkerBuilder, WorkerContext};
//!
//! struct CounterState {
//!     value: i64,
//! }
//!
//! let runner = WorkerBuilder::new(CounterState { value: 0 })
//!     .method("increment", |state: &mut CounterState, _: (), _ctx: &WorkerContext| {
//!         state.value += 1;
//!         Ok(state.value)
//!     })
//!     .event("counter/updated")
//!     .into_runner();
//! # let _ = runner;
//! ```

use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec::MsgPackCodec;
use crate::error::Result;
use crate::proto::{Envelope, Progress};
use crate::transport::{Channel, MessageSender};

/// Entry point a spawned worker thread runs with its side of the channel.
pub type WorkerRunner = Box<dyn FnOnce(Channel) + Send + 'static>;

/// Trait for worker methods operating on raw payload bytes.
pub trait WorkerMethod<S>: Send + 'static {
    /// Handle one invocation; the returned bytes are the encoded result.
    fn call(&self, state: &mut S, payload: &[u8], ctx: &WorkerContext) -> Result<Vec<u8>>;
}

/// Wrapper that deserializes the input and serializes the result around a
/// typed method function.
struct TypedWorkerMethod<F, S, T, R>
where
    F: Fn(&mut S, T, &WorkerContext) -> Result<R> + Send + 'static,
    T: DeserializeOwned,
    R: Serialize,
{
    method: F,
    _phantom: PhantomData<fn(S, T) -> R>,
}

impl<F, S, T, R> WorkerMethod<S> for TypedWorkerMethod<F, S, T, R>
where
    F: Fn(&mut S, T, &WorkerContext) -> Result<R> + Send + 'static,
    S: 'static,
    T: DeserializeOwned + 'static,
    R: Serialize + 'static,
{
    fn call(&self, state: &mut S, payload: &[u8], ctx: &WorkerContext) -> Result<Vec<u8>> {
        let input: T = MsgPackCodec::decode(payload)?;
        let output = (self.method)(state, input, ctx)?;
        MsgPackCodec::encode(&output)
    }
}

/// Builder for a worker role: owned state plus named methods and events.
pub struct WorkerBuilder<S> {
    state: S,
    methods: HashMap<String, Box<dyn WorkerMethod<S>>>,
    events: Vec<String>,
}

impl<S: Send + 'static> WorkerBuilder<S> {
    /// Start a role definition around its owned state.
    pub fn new(state: S) -> Self {
        Self {
            state,
            methods: HashMap::new(),
            events: Vec::new(),
        }
    }

    /// Register a named method.
    ///
    /// # Panics
    ///
    /// Panics when the name is registered twice — a programming error in
    /// the role definition, caught at startup.
    pub fn method<T, R, F>(mut self, name: &str, method: F) -> Self
    where
        F: Fn(&mut S, T, &WorkerContext) -> Result<R> + Send + 'static,
        T: DeserializeOwned + 'static,
        R: Serialize + 'static,
    {
        let wrapped = TypedWorkerMethod {
            method,
            _phantom: PhantomData,
        };
        let previous = self.methods.insert(name.to_string(), Box::new(wrapped));
        assert!(previous.is_none(), "duplicate worker method: {name}");
        self
    }

    /// Declare an event this worker may emit.
    pub fn event(mut self, name: &str) -> Self {
        self.events.push(name.to_string());
        self
    }

    /// Finish the definition; the returned runner executes the role's
    /// dispatch loop on whatever thread it is handed to.
    pub fn into_runner(self) -> WorkerRunner {
        Box::new(move |channel| super::runtime::run(self, channel))
    }

    pub(crate) fn into_parts(
        self,
    ) -> (S, HashMap<String, Box<dyn WorkerMethod<S>>>, Vec<String>) {
        (self.state, self.methods, self.events)
    }
}

/// Context handed to a running worker method.
///
/// Emission is fire-and-forget: `send` never blocks the worker, and a gone
/// host simply swallows the event.
pub struct WorkerContext {
    sender: MessageSender,
    events: HashSet<String>,
}

impl WorkerContext {
    pub(crate) fn new(sender: MessageSender, events: HashSet<String>) -> Self {
        Self { sender, events }
    }

    /// Emit a declared event with a typed payload.
    ///
    /// Fails with `UnknownEndpoint` for an undeclared event name; transport
    /// failures are ignored (the host deciding to go away must not stop the
    /// worker's forward progress).
    pub fn emit<T: Serialize>(&self, event: &str, payload: &T) -> Result<()> {
        if !self.events.contains(event) {
            return Err(crate::error::BusError::UnknownEndpoint(event.to_string()));
        }
        let frame = Envelope::Event {
            endpoint: event.to_string(),
            payload: MsgPackCodec::encode(payload)?,
        }
        .encode()?;
        let _ = self.sender.send(frame);
        Ok(())
    }

    /// Emit a [`Progress`] report on a declared event.
    pub fn progress(
        &self,
        event: &str,
        current: u64,
        total: u64,
        item_id: Option<&str>,
    ) -> Result<()> {
        self.emit(
            event,
            &Progress {
                current,
                total,
                item_id: item_id.map(str::to_string),
            },
        )
    }
}
