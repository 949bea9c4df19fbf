use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use serde::de::{DeserializeOwned, IgnoredAny};
use tokio::sync::oneshot;

use crate::error::{PeerError, Result};
use crate::json::decode_payload;

type ReplyFn = Box<dyn FnOnce(&[u8]) -> serde_json::Result<()> + Send>;

/// What to do with the reply to one outstanding request.
pub enum Slot {
    /// Decode the reply and hand it to a continuation.
    Callback(ReplyFn),
    /// Decode the reply and drop it.
    Discard,
}

impl Slot {
    /// A slot that decodes its reply as `T` and passes it to `on_reply`.
    ///
    /// `on_reply` is not called when decoding fails.
    pub fn callback<T, F>(on_reply: F) -> Self
    where
        T: DeserializeOwned,
        F: FnOnce(T) + Send + 'static,
    {
        Slot::Callback(Box::new(move |payload| {
            let reply = decode_payload::<T>(payload)?;
            on_reply(reply);
            Ok(())
        }))
    }

    /// A slot paired with a future that resolves to the decoded reply.
    pub fn reply<T>() -> (Self, PendingReply<T>)
    where
        T: DeserializeOwned + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let slot = Slot::callback(move |reply: T| {
            // The receiver may already be gone; nobody is waiting then.
            let _ = tx.send(reply);
        });
        (slot, PendingReply { rx })
    }

    /// Consume the slot with the payload that answers it.
    pub fn resolve(self, payload: &[u8]) -> serde_json::Result<()> {
        match self {
            Slot::Callback(on_reply) => on_reply(payload),
            Slot::Discard => decode_payload::<IgnoredAny>(payload).map(|_| ()),
        }
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Callback(_) => f.write_str("Slot::Callback"),
            Slot::Discard => f.write_str("Slot::Discard"),
        }
    }
}

/// FIFO of outstanding requests. Replies are matched oldest first.
#[derive(Debug, Default)]
pub struct PendingQueue {
    slots: VecDeque<Slot>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, slot: Slot) {
        self.slots.push_back(slot);
    }

    pub fn pop(&mut self) -> Option<Slot> {
        self.slots.pop_front()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Reply to a request made with [`Protocol::request`](crate::Protocol::request).
///
/// Await it from async code or call [`PendingReply::wait`] from a plain
/// thread. Resolves to [`PeerError::ReplyDropped`] if the slot was consumed
/// without a value (the reply failed to decode) or discarded along with the
/// protocol.
#[derive(Debug)]
pub struct PendingReply<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> PendingReply<T> {
    /// Block the current thread until the reply arrives.
    ///
    /// Panics when called from inside an async runtime; `.await` there.
    pub fn wait(self) -> Result<T> {
        self.rx.blocking_recv().map_err(|_| PeerError::ReplyDropped)
    }

    /// Take the reply if it has already arrived.
    pub fn try_take(&mut self) -> Result<Option<T>> {
        match self.rx.try_recv() {
            Ok(reply) => Ok(Some(reply)),
            Err(oneshot::error::TryRecvError::Empty) => Ok(None),
            Err(oneshot::error::TryRecvError::Closed) => Err(PeerError::ReplyDropped),
        }
    }
}

impl<T> Future for PendingReply<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().rx)
            .poll(cx)
            .map(|received| received.map_err(|_| PeerError::ReplyDropped))
    }
}
