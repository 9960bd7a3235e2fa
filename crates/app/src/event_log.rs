//! Bounded in-memory event log with live fan-out.
//!
//! The log keeps the most recent entries in insertion order and pushes every
//! append to registered observers before `append` returns. Snapshot and
//! registration share one lock so a new observer sees each entry exactly
//! once: either in its snapshot or as a live notification.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use linescript_domain::id::ChannelId;
use linescript_domain::log::{LogEntry, LogKind};

use crate::fanout::{Subscribers, Subscription};

/// Number of entries kept when no capacity is configured.
pub const DEFAULT_LOG_CAPACITY: usize = 200;

/// Process-wide, session-scoped log of automation activity.
#[derive(Debug)]
pub struct EventLog {
    capacity: usize,
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    entries: VecDeque<LogEntry>,
    subscribers: Subscribers<LogEntry>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

impl EventLog {
    /// Create an empty log holding at most `capacity` entries (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            inner: Mutex::new(Inner {
                entries: VecDeque::with_capacity(capacity),
                subscribers: Subscribers::default(),
            }),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stamp, store and broadcast a new entry, evicting the oldest when full.
    pub fn append(
        &self,
        kind: LogKind,
        message: impl Into<String>,
        channel_id: Option<ChannelId>,
        color: Option<String>,
    ) -> LogEntry {
        let entry = LogEntry::new(kind, message, channel_id, color);
        let mut inner = self.lock();
        if inner.entries.len() == self.capacity {
            inner.entries.pop_front();
        }
        inner.entries.push_back(entry.clone());
        inner.subscribers.notify(&entry);
        entry
    }

    /// Entries visible to `filter`, oldest first.
    #[must_use]
    pub fn snapshot(&self, filter: Option<&ChannelId>) -> Vec<LogEntry> {
        Self::visible(&self.lock().entries, filter)
    }

    /// Observe every future append.
    pub fn subscribe(&self) -> Subscription<LogEntry> {
        self.lock().subscribers.add()
    }

    /// Take a snapshot and register an observer in one step.
    ///
    /// The live subscription is not filtered; callers apply
    /// [`LogEntry::is_visible_to`] themselves.
    pub fn subscribe_with_snapshot(
        &self,
        filter: Option<&ChannelId>,
    ) -> (Vec<LogEntry>, Subscription<LogEntry>) {
        let mut inner = self.lock();
        let snapshot = Self::visible(&inner.entries, filter);
        (snapshot, inner.subscribers.add())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    fn visible(entries: &VecDeque<LogEntry>, filter: Option<&ChannelId>) -> Vec<LogEntry> {
        entries
            .iter()
            .filter(|entry| entry.is_visible_to(filter))
            .cloned()
            .collect()
    }
}
