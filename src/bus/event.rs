//! Event subscriptions — fan-out delivery on the subscribing side.
//!
//! Each subscription owns a private queue drained by its own task, so
//! delivery is FIFO per subscriber and one slow callback never stalls the
//! others. Releasing a subscription closes its queue, which ends its task;
//! release is idempotent and also runs on drop, so a subscription owned by
//! a view that goes away cannot keep delivering into the void.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;

use crate::codec::MsgPackCodec;

/// Table of live subscriptions on one side of a channel.
#[derive(Default)]
pub struct SubscriberTable {
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<String, Vec<SubscriberEntry>>>,
}

struct SubscriberEntry {
    id: u64,
    queue: mpsc::UnboundedSender<Bytes>,
}

impl SubscriberTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for `endpoint` and return the releasable handle.
    ///
    /// Payloads that fail to decode to `T` are logged and skipped; they do
    /// not tear down the subscription.
    pub fn subscribe<T, F>(self: &Arc<Self>, endpoint: &str, mut callback: F) -> Subscription
    where
        T: DeserializeOwned + Send + 'static,
        F: FnMut(T) + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, mut rx) = mpsc::unbounded_channel::<Bytes>();

        self.subscribers
            .lock()
            .expect("subscriber table poisoned")
            .entry(endpoint.to_string())
            .or_default()
            .push(SubscriberEntry { id, queue: tx });

        let endpoint_name = endpoint.to_string();
        tokio::spawn(async move {
            while let Some(payload) = rx.recv().await {
                match MsgPackCodec::decode::<T>(&payload) {
                    Ok(value) => callback(value),
                    Err(e) => {
                        tracing::warn!(endpoint = %endpoint_name, "dropping undecodable event payload: {e}");
                    }
                }
            }
        });

        Subscription {
            endpoint: endpoint.to_string(),
            id,
            table: Arc::clone(self),
            released: AtomicBool::new(false),
        }
    }

    /// Deliver a payload to every live subscription for `endpoint`.
    ///
    /// Zero subscribers is a no-op. Entries whose task is gone are pruned.
    pub fn dispatch(&self, endpoint: &str, payload: Bytes) {
        let mut subscribers = self.subscribers.lock().expect("subscriber table poisoned");
        let emptied = match subscribers.get_mut(endpoint) {
            Some(entries) => {
                entries.retain(|entry| entry.queue.send(payload.clone()).is_ok());
                entries.is_empty()
            }
            None => false,
        };
        if emptied {
            subscribers.remove(endpoint);
        }
    }

    /// Number of live subscriptions for `endpoint`.
    pub fn subscriber_count(&self, endpoint: &str) -> usize {
        self.subscribers
            .lock()
            .expect("subscriber table poisoned")
            .get(endpoint)
            .map_or(0, Vec::len)
    }

    fn remove(&self, endpoint: &str, id: u64) {
        let mut subscribers = self.subscribers.lock().expect("subscriber table poisoned");
        let emptied = match subscribers.get_mut(endpoint) {
            Some(entries) => {
                entries.retain(|entry| entry.id != id);
                entries.is_empty()
            }
            None => false,
        };
        if emptied {
            subscribers.remove(endpoint);
        }
    }
}

/// One listener's interest in an Event endpoint.
///
/// Dropping the handle releases the subscription; calling
/// [`Subscription::release`] does so explicitly. Both paths fully
/// unregister, and releasing twice is a no-op.
pub struct Subscription {
    endpoint: String,
    id: u64,
    table: Arc<SubscriberTable>,
    released: AtomicBool,
}

impl Subscription {
    /// Stop delivery to this subscription. Idempotent.
    ///
    /// Other subscriptions to the same endpoint are unaffected, and a fresh
    /// subscribe afterwards creates an independent subscription.
    pub fn release(&self) {
        if !self.released.swap(true, Ordering::AcqRel) {
            self.table.remove(&self.endpoint, self.id);
        }
    }

    /// The endpoint this subscription listens on.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}
