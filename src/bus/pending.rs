//! In-flight call tracking with correlation ids.
//!
//! Every `trigger` registers a slot keyed by a fresh correlation id; the
//! dispatch loop settles slots as responses arrive, in whatever order the
//! handlers finish. When the channel dies, `fail_all` settles every
//! remaining slot so no caller is left suspended forever.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use bytes::Bytes;
use tokio::sync::oneshot;

use crate::error::{BusError, Result};

/// Outcome delivered to a suspended caller.
pub type CallOutcome = Result<Bytes>;

/// Table of in-flight calls on one side of a channel.
///
/// Correlation ids are monotonic per table, which keeps them unique for the
/// lifetime of the channel.
pub struct PendingCalls {
    next_correlation: AtomicU64,
    slots: Mutex<HashMap<u64, oneshot::Sender<CallOutcome>>>,
}

impl PendingCalls {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            next_correlation: AtomicU64::new(1),
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Allocate a correlation id and the receiver the caller will await.
    pub fn register(&self) -> (u64, oneshot::Receiver<CallOutcome>) {
        let correlation = self.next_correlation.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.slots
            .lock()
            .expect("pending table poisoned")
            .insert(correlation, tx);
        (correlation, rx)
    }

    /// Settle the call with the given correlation id.
    ///
    /// Returns `false` when no such call is pending — a late response after
    /// a timeout, which the dispatch loop ignores.
    pub fn settle(&self, correlation: u64, outcome: CallOutcome) -> bool {
        let slot = self
            .slots
            .lock()
            .expect("pending table poisoned")
            .remove(&correlation);
        match slot {
            Some(tx) => tx.send(outcome).is_ok(),
            None => false,
        }
    }

    /// Drop the slot for a call the caller gave up on (timeout).
    pub fn forget(&self, correlation: u64) {
        self.slots
            .lock()
            .expect("pending table poisoned")
            .remove(&correlation);
    }

    /// Settle every outstanding call with a synthesized failure.
    pub fn fail_all(&self, make_error: impl Fn() -> BusError) {
        let drained: Vec<_> = self
            .slots
            .lock()
            .expect("pending table poisoned")
            .drain()
            .collect();
        for (_, tx) in drained {
            let _ = tx.send(Err(make_error()));
        }
    }

    /// Number of calls currently in flight.
    pub fn len(&self) -> usize {
        self.slots.lock().expect("pending table poisoned").len()
    }

    /// Whether no calls are in flight.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PendingCalls {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_and_settle() {
        let pending = PendingCalls::new();
        let (correlation, rx) = pending.register();
        assert_eq!(pending.len(), 1);

        assert!(pending.settle(correlation, Ok(Bytes::from_static(b"ok"))));
        assert!(pending.is_empty());

        let outcome = rx.await.unwrap();
        assert_eq!(outcome.unwrap(), Bytes::from_static(b"ok"));
    }

    #[tokio::test]
    async fn test_correlation_ids_are_unique() {
        let pending = PendingCalls::new();
        let (a, _rx_a) = pending.register();
        let (b, _rx_b) = pending.register();
        let (c, _rx_c) = pending.register();

        assert_ne!(a, b);
        assert_ne!(b, c);
    }

    #[tokio::test]
    async fn test_out_of_order_settlement() {
        let pending = PendingCalls::new();
        let (first, rx_first) = pending.register();
        let (second, rx_second) = pending.register();

        // The later call settles before the earlier one.
        assert!(pending.settle(second, Ok(Bytes::from_static(b"2"))));
        assert!(pending.settle(first, Ok(Bytes::from_static(b"1"))));

        assert_eq!(rx_first.await.unwrap().unwrap(), Bytes::from_static(b"1"));
        assert_eq!(rx_second.await.unwrap().unwrap(), Bytes::from_static(b"2"));
    }

    #[tokio::test]
    async fn test_settle_unknown_correlation() {
        let pending = PendingCalls::new();
        assert!(!pending.settle(999, Ok(Bytes::new())));
    }

    #[tokio::test]
    async fn test_fail_all() {
        let pending = PendingCalls::new();
        let (_, rx_a) = pending.register();
        let (_, rx_b) = pending.register();

        pending.fail_all(|| BusError::ChannelClosed);
        assert!(pending.is_empty());

        assert!(matches!(rx_a.await.unwrap(), Err(BusError::ChannelClosed)));
        assert!(matches!(rx_b.await.unwrap(), Err(BusError::ChannelClosed)));
    }

    #[tokio::test]
    async fn test_forget_then_late_settle() {
        let pending = PendingCalls::new();
        let (correlation, rx) = pending.register();
        pending.forget(correlation);
        drop(rx);

        // The response arriving after a timeout is simply dropped.
        assert!(!pending.settle(correlation, Ok(Bytes::new())));
    }
}
