//! Subscriber fan-out over bounded channels.
//!
//! Owners keep a [`Subscribers`] list behind their own lock so that
//! registering a subscriber and reading current state happen atomically.
//! A subscriber that falls a full queue behind is disconnected rather than
//! left to grow memory without limit.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Values queued per subscriber before it counts as lagging.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Registered observers of values of type `T`.
#[derive(Debug)]
pub struct Subscribers<T> {
    capacity: usize,
    senders: Vec<mpsc::Sender<T>>,
}

impl<T> Default for Subscribers<T> {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl<T> Subscribers<T> {
    /// Observers get a queue of `capacity` values (at least one).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            senders: Vec::new(),
        }
    }
}

impl<T: Clone> Subscribers<T> {
    /// Register a new observer.
    pub fn add(&mut self) -> Subscription<T> {
        let (sender, receiver) = mpsc::channel(self.capacity);
        self.senders.push(sender);
        Subscription { receiver }
    }

    /// Deliver `value` to every live observer.
    ///
    /// Delivery never waits. Dropped observers are forgotten, and so are
    /// observers whose queue is full: their receiver drains what is queued
    /// and then ends.
    pub fn notify(&mut self, value: &T) {
        let capacity = self.capacity;
        self.senders.retain(|sender| match sender.try_send(value.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(capacity, "subscriber lagging, disconnecting it");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        });
    }

    /// Number of observers still registered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.senders.iter().filter(|s| !s.is_closed()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Receiving half handed to an observer. Dropping it cancels the subscription.
#[derive(Debug)]
pub struct Subscription<T> {
    receiver: mpsc::Receiver<T>,
}

impl<T> Subscription<T> {
    /// Wait for the next value. `None` once the publisher is gone or has
    /// disconnected this observer.
    pub async fn recv(&mut self) -> Option<T> {
        self.receiver.recv().await
    }

    /// Take the next value if one is already queued.
    pub fn try_recv(&mut self) -> Option<T> {
        self.receiver.try_recv().ok()
    }

    /// Unwrap into the underlying receiver, e.g. to build a stream.
    #[must_use]
    pub fn into_inner(self) -> mpsc::Receiver<T> {
        self.receiver
    }
}
