//! Channel event hub: per-channel, per-kind views over the transport's
//! event feed.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use linescript_domain::channel::{ChannelEvent, ChannelEventKind};
use linescript_domain::error::LineScriptError;
use linescript_domain::id::ChannelId;

use crate::ports::ChannelTransport;

/// Thin pass-through over [`ChannelTransport::events`].
pub struct ChannelEventHub<T> {
    transport: Arc<T>,
}

impl<T> Clone for ChannelEventHub<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T: ChannelTransport> ChannelEventHub<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self { transport }
    }

    /// Events of a single `kind` on `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`LineScriptError::NotFound`] for unknown channels.
    pub fn subscribe(
        &self,
        channel: &ChannelId,
        kind: ChannelEventKind,
    ) -> Result<ChannelEventStream, LineScriptError> {
        let receiver = self.transport.events(channel)?;
        Ok(ChannelEventStream {
            channel: channel.clone(),
            kind: Some(kind),
            receiver,
        })
    }

    /// Every event on `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`LineScriptError::NotFound`] for unknown channels.
    pub fn subscribe_all(&self, channel: &ChannelId) -> Result<ChannelEventStream, LineScriptError> {
        let receiver = self.transport.events(channel)?;
        Ok(ChannelEventStream {
            channel: channel.clone(),
            kind: None,
            receiver,
        })
    }
}

/// A live, optionally kind-filtered feed of one channel's events.
///
/// Dropping the stream unsubscribes.
pub struct ChannelEventStream {
    channel: ChannelId,
    kind: Option<ChannelEventKind>,
    receiver: broadcast::Receiver<ChannelEvent>,
}

impl ChannelEventStream {
    #[must_use]
    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    /// Next matching event, or `None` once the channel is gone.
    ///
    /// Events dropped because this reader fell behind are skipped with a
    /// warning.
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.kind.is_none_or(|kind| event.kind() == kind) => {
                    return Some(event);
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(channel = %self.channel, skipped, "channel subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
