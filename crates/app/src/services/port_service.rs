//! Port service: writes to channels and to the receive console.
//!
//! Every successful send is mirrored into the event log as a `send` entry
//! tagged with the channel, so observers see exactly what left the host.

use std::sync::Arc;

use linescript_domain::codec;
use linescript_domain::error::{LineScriptError, ValidationError};
use linescript_domain::id::ChannelId;
use linescript_domain::log::{CLEAR_LAST_MARKER, CLEAR_MARKER, LogEntry, LogKind};

use crate::event_log::EventLog;
use crate::ports::ChannelTransport;

/// Application service for the send path and receive-console writes.
pub struct PortService<T> {
    transport: Arc<T>,
    log: Arc<EventLog>,
}

impl<T: ChannelTransport> PortService<T> {
    /// Create a new service writing through `transport` and logging to `log`.
    pub fn new(transport: Arc<T>, log: Arc<EventLog>) -> Self {
        Self { transport, log }
    }

    #[must_use]
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    #[must_use]
    pub fn log(&self) -> &Arc<EventLog> {
        &self.log
    }

    /// Send `text` verbatim.
    ///
    /// # Errors
    ///
    /// Returns the transport error when the write fails; nothing is logged then.
    #[tracing::instrument(skip(self, text), fields(len = text.len()))]
    pub async fn send_text(&self, channel: &ChannelId, text: &str) -> Result<(), LineScriptError> {
        self.transport.write(channel, text.as_bytes().to_vec()).await?;
        self.log.append(LogKind::Send, text, Some(channel.clone()), None);
        Ok(())
    }

    /// Decode `hex` (separators ignored) and send the bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingHexPayload`] when no digit is left
    /// after stripping, [`ValidationError::OddHexLength`] for an unpaired
    /// digit, or the transport error when the write fails.
    #[tracing::instrument(skip(self, hex))]
    pub async fn send_hex(&self, channel: &ChannelId, hex: &str) -> Result<(), LineScriptError> {
        let clean = codec::strip_non_hex(hex);
        if clean.is_empty() {
            return Err(ValidationError::MissingHexPayload.into());
        }
        let Some(bytes) = codec::decode_hex(&clean) else {
            return Err(ValidationError::OddHexLength(clean.len()).into());
        };
        let message = format!("HEX {}", codec::encode_hex(&bytes, true));
        self.transport.write(channel, bytes).await?;
        self.log.append(LogKind::Send, message, Some(channel.clone()), None);
        Ok(())
    }

    /// Send raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyPayload`] for an empty buffer, or the
    /// transport error when the write fails.
    #[tracing::instrument(skip(self, bytes), fields(len = bytes.len()))]
    pub async fn send_bytes(
        &self,
        channel: &ChannelId,
        bytes: Vec<u8>,
    ) -> Result<(), LineScriptError> {
        if bytes.is_empty() {
            return Err(ValidationError::EmptyPayload.into());
        }
        let message = format!("BYTES {}", codec::encode_hex(&bytes, true));
        self.transport.write(channel, bytes).await?;
        self.log.append(LogKind::Send, message, Some(channel.clone()), None);
        Ok(())
    }

    /// Append `message` to the receive console of `channel`.
    pub fn receive_write(
        &self,
        channel: Option<&ChannelId>,
        message: &str,
        color: Option<String>,
    ) -> LogEntry {
        self.log.append(LogKind::Receive, message, channel.cloned(), color)
    }

    /// Like [`Self::receive_write`], guaranteeing a trailing newline.
    pub fn receive_write_line(
        &self,
        channel: Option<&ChannelId>,
        message: &str,
        color: Option<String>,
    ) -> LogEntry {
        let line = if message.ends_with('\n') {
            message.to_string()
        } else {
            format!("{message}\n")
        };
        self.log.append(LogKind::Receive, line, channel.cloned(), color)
    }

    /// Ask viewers of `channel` to clear their receive console.
    pub fn receive_clear(&self, channel: Option<&ChannelId>) -> LogEntry {
        self.log.append(LogKind::Receive, CLEAR_MARKER, channel.cloned(), None)
    }

    /// Ask viewers of `channel` to drop their last received entry.
    pub fn receive_clear_last(&self, channel: Option<&ChannelId>) -> LogEntry {
        self.log
            .append(LogKind::Receive, CLEAR_LAST_MARKER, channel.cloned(), None)
    }
}
