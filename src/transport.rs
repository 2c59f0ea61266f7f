//! Channel transport — raw duplex message passing between two contexts.
//!
//! A [`pair`] call returns two connected [`Channel`]s. Each side sends
//! opaque [`Bytes`] frames to its peer; delivery is in order per directed
//! pair and nothing but serialized bytes ever crosses the boundary.
//!
//! Disconnect is observable from both directions: sending into a gone peer
//! fails with `ChannelClosed`, and the receive side yields `None` once the
//! peer has dropped its sender and all in-flight frames are drained.
//!
//! # Example
//!
//! ```
//! use bytes::Bytes;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let (a, b) = launchwire::transport::pair();
//! let (tx, _rx) = a.split();
//! let (_tx, mut rx) = b.split();
//!
//! tx.send(Bytes::from_static(b"hello")).unwrap();
//! assert_eq!(rx.recv().await.unwrap(), Bytes::from_static(b"hello"));
//! # }
//! ```

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::{BusError, Result};

/// One side of a connected duplex channel.
pub struct Channel {
    sender: MessageSender,
    receiver: MessageReceiver,
}

impl Channel {
    /// Split into the send and receive halves.
    ///
    /// The halves are independent: the receive half usually moves into a
    /// dispatch loop while the send half is cloned into whoever produces
    /// outbound frames.
    pub fn split(self) -> (MessageSender, MessageReceiver) {
        (self.sender, self.receiver)
    }
}

/// Sending half of a channel. Cheaply cloneable.
///
/// `send` never blocks: frames queue unboundedly so a producer (e.g. a
/// worker emitting progress) is never stalled by a slow consumer.
#[derive(Clone)]
pub struct MessageSender {
    tx: mpsc::UnboundedSender<Bytes>,
}

impl MessageSender {
    /// Deliver a frame to the peer context.
    ///
    /// Fails with [`BusError::ChannelClosed`] once the peer has gone away.
    pub fn send(&self, frame: Bytes) -> Result<()> {
        self.tx.send(frame).map_err(|_| BusError::ChannelClosed)
    }

    /// Whether the peer's receive side is gone.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving half of a channel.
pub struct MessageReceiver {
    rx: mpsc::UnboundedReceiver<Bytes>,
}

impl MessageReceiver {
    /// Receive the next frame, or `None` after the peer disconnected and
    /// every queued frame was drained.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// Blocking variant for dedicated worker threads.
    ///
    /// Must not be called from within an async runtime.
    pub fn blocking_recv(&mut self) -> Option<Bytes> {
        self.rx.blocking_recv()
    }

    /// Stop accepting frames. Senders observe the closure on their next
    /// `send`; already-queued frames can still be drained.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

/// Create a connected pair of duplex channels.
pub fn pair() -> (Channel, Channel) {
    let (a_tx, b_rx) = mpsc::unbounded_channel();
    let (b_tx, a_rx) = mpsc::unbounded_channel();

    (
        Channel {
            sender: MessageSender { tx: a_tx },
            receiver: MessageReceiver { rx: a_rx },
        },
        Channel {
            sender: MessageSender { tx: b_tx },
            receiver: MessageReceiver { rx: b_rx },
        },
    )
}
