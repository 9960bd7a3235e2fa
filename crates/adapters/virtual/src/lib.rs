//! # linescript-adapter-virtual
//!
//! Simulated communication lines implementing the `ChannelTransport` port.
//!
//! Each channel is registered from a device path; its id is the last path
//! segment (`/dev/rs485-1` → `rs485-1`). Inbound traffic is injected by the
//! host (`feed` for raw bytes framed on `\n`, `inject_line` for a ready
//! line). Writes are recorded and, with loopback enabled, echoed back as
//! inbound bytes.
//!
//! ## Dependency rule
//!
//! Depends on `linescript-app` (port traits) and `linescript-domain` only.

mod line;

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;

use linescript_app::ports::ChannelTransport;
use linescript_domain::channel::{ChannelConfig, ChannelEvent, ChannelInfo};
use linescript_domain::error::{LineScriptError, NotFoundError, TransportError};
use linescript_domain::id::ChannelId;

use line::LineDecoder;

/// Events buffered per channel before slow subscribers start lagging.
const EVENT_CAPACITY: usize = 256;

/// In-memory transport with one simulated line per configured path.
#[derive(Debug)]
pub struct VirtualTransport {
    channels: BTreeMap<ChannelId, VirtualChannel>,
    loopback: bool,
}

#[derive(Debug)]
struct VirtualChannel {
    path: String,
    events: broadcast::Sender<ChannelEvent>,
    line: Mutex<LineState>,
}

#[derive(Debug, Default)]
struct LineState {
    open: bool,
    unplugged: bool,
    config: ChannelConfig,
    decoder: LineDecoder,
    written: Vec<Vec<u8>>,
}

impl VirtualChannel {
    fn lock(&self) -> MutexGuard<'_, LineState> {
        self.line.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: ChannelEvent) {
        // No subscriber is not an error.
        let _ = self.events.send(event);
    }
}

impl VirtualTransport {
    /// Register one closed channel per device path.
    ///
    /// # Errors
    ///
    /// Returns a validation error when a path does not yield a usable id.
    pub fn from_paths<I, S>(paths: I) -> Result<Self, LineScriptError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut channels = BTreeMap::new();
        for path in paths {
            let path = path.into();
            let id = ChannelId::from_path(&path)?;
            channels.insert(
                id,
                VirtualChannel {
                    path,
                    events: broadcast::channel(EVENT_CAPACITY).0,
                    line: Mutex::new(LineState::default()),
                },
            );
        }
        Ok(Self {
            channels,
            loopback: false,
        })
    }

    /// Echo every write back as inbound data.
    #[must_use]
    pub fn with_loopback(mut self, loopback: bool) -> Self {
        self.loopback = loopback;
        self
    }

    fn channel(&self, id: &ChannelId) -> Result<&VirtualChannel, LineScriptError> {
        self.channels.get(id).ok_or_else(|| {
            NotFoundError {
                entity: "Channel",
                id: id.to_string(),
            }
            .into()
        })
    }

    fn open_channel(
        &self,
        id: &ChannelId,
    ) -> Result<(&VirtualChannel, MutexGuard<'_, LineState>), LineScriptError> {
        let channel = self.channel(id)?;
        let line = channel.lock();
        if !line.open {
            return Err(TransportError::NotOpen(id.clone()).into());
        }
        Ok((channel, line))
    }

    /// Push raw inbound bytes; each complete `\n`-terminated line becomes a
    /// `data` event.
    ///
    /// # Errors
    ///
    /// Fails when the channel is unknown or closed.
    pub fn feed(&self, id: &ChannelId, bytes: &[u8]) -> Result<(), LineScriptError> {
        let (channel, mut line) = self.open_channel(id)?;
        for decoded in line.decoder.feed(bytes) {
            channel.emit(ChannelEvent::Data(decoded));
        }
        Ok(())
    }

    /// Deliver one already framed inbound line.
    ///
    /// # Errors
    ///
    /// Fails when the channel is unknown or closed.
    pub fn inject_line(
        &self,
        id: &ChannelId,
        line: impl Into<Vec<u8>>,
    ) -> Result<(), LineScriptError> {
        let (channel, _line) = self.open_channel(id)?;
        channel.emit(ChannelEvent::Data(line.into()));
        Ok(())
    }

    /// Everything written to `id` so far, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`LineScriptError::NotFound`] for unknown channels.
    pub fn written(&self, id: &ChannelId) -> Result<Vec<Vec<u8>>, LineScriptError> {
        Ok(self.channel(id)?.lock().written.clone())
    }

    /// Current line settings of `id`.
    ///
    /// # Errors
    ///
    /// Returns [`LineScriptError::NotFound`] for unknown channels.
    pub fn config(&self, id: &ChannelId) -> Result<ChannelConfig, LineScriptError> {
        Ok(self.channel(id)?.lock().config)
    }

    /// Simulate the device disappearing: an open line reports an error and
    /// closes, and later opens fail until [`Self::plug`] is called.
    ///
    /// # Errors
    ///
    /// Returns [`LineScriptError::NotFound`] for unknown channels.
    pub fn unplug(&self, id: &ChannelId) -> Result<(), LineScriptError> {
        let channel = self.channel(id)?;
        let mut line = channel.lock();
        line.unplugged = true;
        if line.open {
            line.open = false;
            line.decoder.reset();
            channel.emit(ChannelEvent::Error(format!("device removed: {}", channel.path)));
            channel.emit(ChannelEvent::Close);
        }
        Ok(())
    }

    /// Make an unplugged device available again.
    ///
    /// # Errors
    ///
    /// Returns [`LineScriptError::NotFound`] for unknown channels.
    pub fn plug(&self, id: &ChannelId) -> Result<(), LineScriptError> {
        self.channel(id)?.lock().unplugged = false;
        Ok(())
    }

    /// Close every open channel.
    pub fn close_all(&self) {
        for (id, channel) in &self.channels {
            let mut line = channel.lock();
            if line.open {
                line.open = false;
                line.decoder.reset();
                channel.emit(ChannelEvent::Close);
                tracing::debug!(channel = %id, "virtual channel closed");
            }
        }
    }
}

impl ChannelTransport for VirtualTransport {
    fn list(&self) -> Vec<ChannelInfo> {
        self.channels
            .iter()
            .map(|(id, channel)| ChannelInfo {
                id: id.clone(),
                path: channel.path.clone(),
                open: channel.lock().open,
            })
            .collect()
    }

    async fn open(&self, id: &ChannelId, config: ChannelConfig) -> Result<(), LineScriptError> {
        config.validate()?;
        let channel = self.channel(id)?;
        let mut line = channel.lock();
        if line.open {
            return Ok(());
        }
        if line.unplugged {
            return Err(TransportError::DeviceMissing {
                path: channel.path.clone(),
            }
            .into());
        }
        line.open = true;
        line.config = config;
        channel.emit(ChannelEvent::Open);
        tracing::debug!(channel = %id, baud_rate = config.baud_rate, "virtual channel opened");
        Ok(())
    }

    async fn close(&self, id: &ChannelId) -> Result<(), LineScriptError> {
        let channel = self.channel(id)?;
        let mut line = channel.lock();
        if line.open {
            line.open = false;
            line.decoder.reset();
            channel.emit(ChannelEvent::Close);
        }
        Ok(())
    }

    async fn write(&self, id: &ChannelId, bytes: Vec<u8>) -> Result<(), LineScriptError> {
        let (channel, mut line) = self.open_channel(id)?;
        if self.loopback {
            for decoded in line.decoder.feed(&bytes) {
                channel.emit(ChannelEvent::Data(decoded));
            }
        }
        line.written.push(bytes);
        Ok(())
    }

    async fn set_baud(&self, id: &ChannelId, baud_rate: u32) -> Result<(), LineScriptError> {
        let (channel, mut line) = self.open_channel(id)?;
        let config = ChannelConfig {
            baud_rate,
            ..line.config
        };
        config.validate()?;
        line.config = config;
        channel.emit(ChannelEvent::Baud(baud_rate));
        Ok(())
    }

    fn events(&self, id: &ChannelId) -> Result<broadcast::Receiver<ChannelEvent>, LineScriptError> {
        Ok(self.channel(id)?.events.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use linescript_domain::error::ValidationError;

    use super::*;

    fn transport() -> VirtualTransport {
        VirtualTransport::from_paths(["/dev/rs485-1", "/dev/rs485-2"]).unwrap()
    }

    fn id(value: &str) -> ChannelId {
        ChannelId::new(value).unwrap()
    }

    #[test]
    fn should_list_channels_closed_with_ids_from_paths() {
        let infos = transport().list();
        assert_eq!(
            infos,
            vec![
                ChannelInfo {
                    id: id("rs485-1"),
                    path: "/dev/rs485-1".to_string(),
                    open: false,
                },
                ChannelInfo {
                    id: id("rs485-2"),
                    path: "/dev/rs485-2".to_string(),
                    open: false,
                },
            ]
        );
    }

    #[test]
    fn should_reject_path_without_name() {
        let result = VirtualTransport::from_paths(["/dev/"]);
        assert!(matches!(
            result,
            Err(LineScriptError::Validation(ValidationError::EmptyChannelId))
        ));
    }

    #[tokio::test]
    async fn should_emit_open_once_and_mark_channel_open() {
        let transport = transport();
        let mut events = transport.events(&id("rs485-1")).unwrap();

        transport.open(&id("rs485-1"), ChannelConfig::default()).await.unwrap();
        transport.open(&id("rs485-1"), ChannelConfig::default()).await.unwrap();

        assert_eq!(events.try_recv().unwrap(), ChannelEvent::Open);
        assert!(events.try_recv().is_err());
        assert!(transport.list()[0].open);
    }

    #[tokio::test]
    async fn should_reject_write_when_closed() {
        let transport = transport();

        let result = transport.write(&id("rs485-1"), b"PING".to_vec()).await;

        assert!(matches!(
            result,
            Err(LineScriptError::Transport(TransportError::NotOpen(_)))
        ));
    }

    #[tokio::test]
    async fn should_return_not_found_when_channel_unknown() {
        let transport = transport();

        let result = transport.close(&id("ttyUSB0")).await;

        assert!(matches!(result, Err(LineScriptError::NotFound(_))));
    }

    #[tokio::test]
    async fn should_record_writes_and_echo_them_with_loopback() {
        let transport = transport().with_loopback(true);
        transport.open(&id("rs485-1"), ChannelConfig::default()).await.unwrap();
        let mut events = transport.events(&id("rs485-1")).unwrap();

        transport.write(&id("rs485-1"), b"PONG\n".to_vec()).await.unwrap();

        assert_eq!(transport.written(&id("rs485-1")).unwrap(), vec![b"PONG\n".to_vec()]);
        assert_eq!(events.try_recv().unwrap(), ChannelEvent::Data(b"PONG".to_vec()));
    }

    #[tokio::test]
    async fn should_frame_fed_bytes_into_lines() {
        let transport = transport();
        transport.open(&id("rs485-2"), ChannelConfig::default()).await.unwrap();
        let mut events = transport.events(&id("rs485-2")).unwrap();

        transport.feed(&id("rs485-2"), b"T=21\nT=").unwrap();
        transport.feed(&id("rs485-2"), b"22\n").unwrap();

        assert_eq!(events.try_recv().unwrap(), ChannelEvent::Data(b"T=21".to_vec()));
        assert_eq!(events.try_recv().unwrap(), ChannelEvent::Data(b"T=22".to_vec()));
    }

    #[tokio::test]
    async fn should_emit_baud_and_keep_other_settings() {
        let transport = transport();
        transport
            .open(&id("rs485-1"), ChannelConfig::with_baud_rate(19200))
            .await
            .unwrap();
        let mut events = transport.events(&id("rs485-1")).unwrap();

        transport.set_baud(&id("rs485-1"), 115_200).await.unwrap();

        assert_eq!(events.try_recv().unwrap(), ChannelEvent::Baud(115_200));
        assert_eq!(transport.config(&id("rs485-1")).unwrap().baud_rate, 115_200);
        assert!(transport.set_baud(&id("rs485-1"), 0).await.is_err());
    }

    #[tokio::test]
    async fn should_close_and_refuse_open_when_unplugged() {
        let transport = transport();
        transport.open(&id("rs485-1"), ChannelConfig::default()).await.unwrap();
        let mut events = transport.events(&id("rs485-1")).unwrap();

        transport.unplug(&id("rs485-1")).unwrap();
        let reopened = transport.open(&id("rs485-1"), ChannelConfig::default()).await;

        assert!(matches!(events.try_recv().unwrap(), ChannelEvent::Error(_)));
        assert_eq!(events.try_recv().unwrap(), ChannelEvent::Close);
        assert!(matches!(
            reopened,
            Err(LineScriptError::Transport(TransportError::DeviceMissing { .. }))
        ));

        transport.plug(&id("rs485-1")).unwrap();
        assert!(transport.open(&id("rs485-1"), ChannelConfig::default()).await.is_ok());
    }

    #[tokio::test]
    async fn should_close_every_open_channel() {
        let transport = transport();
        transport.open(&id("rs485-1"), ChannelConfig::default()).await.unwrap();
        transport.open(&id("rs485-2"), ChannelConfig::default()).await.unwrap();

        transport.close_all();

        assert!(transport.list().iter().all(|info| !info.open));
    }
}
