//! Command handler table — typed dispatch on the handling side.
//!
//! Exactly one handler owns each Command endpoint. Handlers take the
//! deserialized request payload and return a future; the payload decode and
//! response encode live in a typed wrapper so the dispatch loop only ever
//! deals in bytes.

use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec::MsgPackCodec;
use crate::error::{BusError, Result};

/// Boxed future returned by handler dispatch.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Trait for command handlers operating on raw payload bytes.
pub trait CommandHandler: Send + Sync + 'static {
    /// Handle one request; the returned bytes are the encoded response.
    fn call(&self, payload: Bytes) -> BoxFuture<'static, Result<Vec<u8>>>;
}

/// Wrapper that deserializes the request and serializes the response around
/// a typed handler function.
pub struct TypedCommandHandler<F, Req, Fut, Resp>
where
    F: Fn(Req) -> Fut + Send + Sync + 'static,
    Req: DeserializeOwned + Send + 'static,
    Fut: Future<Output = Result<Resp>> + Send + 'static,
    Resp: Serialize + Send + 'static,
{
    handler: F,
    _phantom: PhantomData<fn(Req) -> Fut>,
}

impl<F, Req, Fut, Resp> TypedCommandHandler<F, Req, Fut, Resp>
where
    F: Fn(Req) -> Fut + Send + Sync + 'static,
    Req: DeserializeOwned + Send + 'static,
    Fut: Future<Output = Result<Resp>> + Send + 'static,
    Resp: Serialize + Send + 'static,
{
    /// Wrap a typed handler function.
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: PhantomData,
        }
    }
}

impl<F, Req, Fut, Resp> CommandHandler for TypedCommandHandler<F, Req, Fut, Resp>
where
    F: Fn(Req) -> Fut + Send + Sync + 'static,
    Req: DeserializeOwned + Send + 'static,
    Fut: Future<Output = Result<Resp>> + Send + 'static,
    Resp: Serialize + Send + 'static,
{
    fn call(&self, payload: Bytes) -> BoxFuture<'static, Result<Vec<u8>>> {
        let request: Req = match MsgPackCodec::decode(&payload) {
            Ok(v) => v,
            Err(e) => return Box::pin(async move { Err(e) }),
        };

        let fut = (self.handler)(request);
        Box::pin(async move {
            let response = fut.await?;
            MsgPackCodec::encode(&response)
        })
    }
}

/// Table mapping endpoint names to their single handler.
#[derive(Default)]
pub struct CommandTable {
    handlers: Mutex<HashMap<String, Arc<dyn CommandHandler>>>,
}

impl CommandTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for an endpoint.
    ///
    /// Fails fast with [`BusError::DuplicateHandler`] on a second
    /// registration for the same name — that is a programming error, not a
    /// runtime condition.
    pub fn register(&self, name: &str, handler: Arc<dyn CommandHandler>) -> Result<()> {
        let mut handlers = self.handlers.lock().expect("command table poisoned");
        if handlers.contains_key(name) {
            return Err(BusError::DuplicateHandler(name.to_string()));
        }
        handlers.insert(name.to_string(), handler);
        Ok(())
    }

    /// Look up the handler for an endpoint, if one was registered.
    pub fn get(&self, name: &str) -> Option<Arc<dyn CommandHandler>> {
        self.handlers
            .lock()
            .expect("command table poisoned")
            .get(name)
            .cloned()
    }
}
