//! Log entry: one immutable record in the event log.
//!
//! Entries are produced by the automation coordinator (info), the send path
//! (send), the receive console (receive) and running scripts (console,
//! error, alert). An entry without a channel is global: every observer sees
//! it regardless of its channel filter.

use serde::{Deserialize, Serialize};

use crate::id::ChannelId;
use crate::time::{Timestamp, now};

/// Color attached to `error` entries.
pub const ERROR_COLOR: &str = "red";
/// Color attached to `console.warn` entries.
pub const WARN_COLOR: &str = "darkgreen";
/// Color attached to `alert` entries.
pub const ALERT_COLOR: &str = "orange";

/// Receive-console sentinel: the viewer clears its history.
pub const CLEAR_MARKER: &str = "[clear]";
/// Receive-console sentinel: the viewer drops its last received entry.
pub const CLEAR_LAST_MARKER: &str = "[clear-last]";

/// Category of a [`LogEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Info,
    Receive,
    Send,
    Console,
    Error,
    Alert,
}

/// A timestamped, optionally channel-tagged record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: Timestamp,
    pub kind: LogKind,
    pub message: String,
    pub color: Option<String>,
    pub channel_id: Option<ChannelId>,
}

impl LogEntry {
    /// Create an entry stamped with the current time.
    #[must_use]
    pub fn new(
        kind: LogKind,
        message: impl Into<String>,
        channel_id: Option<ChannelId>,
        color: Option<String>,
    ) -> Self {
        Self {
            timestamp: now(),
            kind,
            message: message.into(),
            color,
            channel_id,
        }
    }

    /// Whether an observer filtering on `filter` should see this entry.
    ///
    /// Global entries and unfiltered observers always match.
    #[must_use]
    pub fn is_visible_to(&self, filter: Option<&ChannelId>) -> bool {
        match (filter, &self.channel_id) {
            (None, _) | (_, None) => true,
            (Some(wanted), Some(own)) => wanted == own,
        }
    }
}
