//! Channel transport port: the communication lines scripts talk to.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast;

use linescript_domain::channel::{ChannelConfig, ChannelEvent, ChannelInfo};
use linescript_domain::error::LineScriptError;
use linescript_domain::id::ChannelId;

/// Opens, closes and writes to addressable channels, and publishes what
/// happens on each of them.
///
/// Unknown channel ids are reported as [`LineScriptError::NotFound`].
pub trait ChannelTransport {
    /// Every channel known to the transport, open or not.
    fn list(&self) -> Vec<ChannelInfo>;

    /// Open `id` with `config`. Opening an already open channel is a no-op.
    fn open(
        &self,
        id: &ChannelId,
        config: ChannelConfig,
    ) -> impl Future<Output = Result<(), LineScriptError>> + Send;

    /// Close `id`. Closing a closed channel is a no-op.
    fn close(&self, id: &ChannelId) -> impl Future<Output = Result<(), LineScriptError>> + Send;

    /// Write `bytes` to `id`.
    ///
    /// Resolves only once the medium has accepted the whole buffer.
    fn write(
        &self,
        id: &ChannelId,
        bytes: Vec<u8>,
    ) -> impl Future<Output = Result<(), LineScriptError>> + Send;

    /// Change the baud rate of an open channel.
    fn set_baud(
        &self,
        id: &ChannelId,
        baud_rate: u32,
    ) -> impl Future<Output = Result<(), LineScriptError>> + Send;

    /// Subscribe to every event emitted by `id`, starting now.
    ///
    /// # Errors
    ///
    /// Returns [`LineScriptError::NotFound`] for unknown channels.
    fn events(&self, id: &ChannelId) -> Result<broadcast::Receiver<ChannelEvent>, LineScriptError>;
}

impl<T: ChannelTransport + Send + Sync> ChannelTransport for Arc<T> {
    fn list(&self) -> Vec<ChannelInfo> {
        (**self).list()
    }

    fn open(
        &self,
        id: &ChannelId,
        config: ChannelConfig,
    ) -> impl Future<Output = Result<(), LineScriptError>> + Send {
        (**self).open(id, config)
    }

    fn close(&self, id: &ChannelId) -> impl Future<Output = Result<(), LineScriptError>> + Send {
        (**self).close(id)
    }

    fn write(
        &self,
        id: &ChannelId,
        bytes: Vec<u8>,
    ) -> impl Future<Output = Result<(), LineScriptError>> + Send {
        (**self).write(id, bytes)
    }

    fn set_baud(
        &self,
        id: &ChannelId,
        baud_rate: u32,
    ) -> impl Future<Output = Result<(), LineScriptError>> + Send {
        (**self).set_baud(id, baud_rate)
    }

    fn events(&self, id: &ChannelId) -> Result<broadcast::Receiver<ChannelEvent>, LineScriptError> {
        (**self).events(id)
    }
}
