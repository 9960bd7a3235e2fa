//! The capability surface handed to one script run.
//!
//! A [`Sandbox`] is built fresh for every inbound line. It closes over the
//! active channel and the triggering payload and exposes exactly the
//! operations a script may perform; script engines translate these into
//! their own calling conventions and nothing else of the host leaks through.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use linescript_domain::codec;
use linescript_domain::error::LineScriptError;
use linescript_domain::id::ChannelId;
use linescript_domain::log::{ALERT_COLOR, ERROR_COLOR, LogEntry, LogKind, WARN_COLOR};

use crate::event_log::EventLog;
use crate::ports::ChannelTransport;
use crate::services::PortService;

/// Label used by `console.time` / `console.timeEnd` when none is given.
pub const DEFAULT_TIMER_LABEL: &str = "timer";

/// Named stopwatches shared by every run of one coordinator.
#[derive(Debug, Default)]
pub struct ConsoleTimers {
    started: Mutex<HashMap<String, Instant>>,
}

impl ConsoleTimers {
    /// Start (or restart) the stopwatch `label`.
    pub fn start(&self, label: &str) {
        self.started
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(label.to_string(), Instant::now());
    }

    /// Stop `label` and return the elapsed time, if it was running.
    pub fn stop(&self, label: &str) -> Option<Duration> {
        self.started
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(label)
            .map(|started| started.elapsed())
    }
}

/// Capabilities available to a single script run.
pub struct Sandbox<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    channel: ChannelId,
    payload: Vec<u8>,
    ports: Arc<PortService<T>>,
    timers: Arc<ConsoleTimers>,
}

impl<T> Clone for Sandbox<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: ChannelTransport> Sandbox<T> {
    pub fn new(
        channel: ChannelId,
        payload: Vec<u8>,
        ports: Arc<PortService<T>>,
        timers: Arc<ConsoleTimers>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                channel,
                payload,
                ports,
                timers,
            }),
        }
    }

    /// The channel the triggering line arrived on.
    #[must_use]
    pub fn channel(&self) -> &ChannelId {
        &self.inner.channel
    }

    /// The triggering line as raw bytes.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.inner.payload
    }

    /// The triggering line decoded as UTF-8, invalid sequences replaced.
    #[must_use]
    pub fn payload_text(&self) -> String {
        String::from_utf8_lossy(&self.inner.payload).into_owned()
    }

    fn log(&self) -> &EventLog {
        self.inner.ports.log()
    }

    fn tag(&self) -> Option<ChannelId> {
        Some(self.inner.channel.clone())
    }

    // receive console

    pub fn receive_write(&self, message: &str, color: Option<String>) -> LogEntry {
        self.inner
            .ports
            .receive_write(Some(&self.inner.channel), message, color)
    }

    pub fn receive_write_line(&self, message: &str, color: Option<String>) -> LogEntry {
        self.inner
            .ports
            .receive_write_line(Some(&self.inner.channel), message, color)
    }

    pub fn receive_clear(&self) -> LogEntry {
        self.inner.ports.receive_clear(Some(&self.inner.channel))
    }

    pub fn receive_clear_last(&self) -> LogEntry {
        self.inner.ports.receive_clear_last(Some(&self.inner.channel))
    }

    // send path

    /// Send `value` as text, or as decoded hex when `is_hex` is set.
    ///
    /// Empty text and hex that is empty or has an odd digit count after
    /// stripping are silently skipped.
    ///
    /// # Errors
    ///
    /// Propagates transport failures.
    pub async fn send_write(&self, value: &str, is_hex: bool) -> Result<(), LineScriptError> {
        if is_hex {
            if codec::decode_hex(value).is_none() {
                return Ok(());
            }
            self.inner.ports.send_hex(&self.inner.channel, value).await
        } else if value.is_empty() {
            Ok(())
        } else {
            self.inner.ports.send_text(&self.inner.channel, value).await
        }
    }

    /// Send raw bytes. An empty buffer is skipped.
    ///
    /// # Errors
    ///
    /// Propagates transport failures.
    pub async fn send_bytes(&self, bytes: Vec<u8>) -> Result<(), LineScriptError> {
        if bytes.is_empty() {
            return Ok(());
        }
        self.inner.ports.send_bytes(&self.inner.channel, bytes).await
    }

    // console

    pub fn console_log(&self, message: &str) -> LogEntry {
        self.log().append(LogKind::Console, message, self.tag(), None)
    }

    pub fn console_warn(&self, message: &str) -> LogEntry {
        self.log()
            .append(LogKind::Console, message, self.tag(), Some(WARN_COLOR.into()))
    }

    pub fn console_error(&self, message: &str) -> LogEntry {
        self.log()
            .append(LogKind::Error, message, self.tag(), Some(ERROR_COLOR.into()))
    }

    pub fn console_time(&self, label: &str) {
        self.inner.timers.start(label);
    }

    /// Log the time since the matching [`Self::console_time`]. Unmatched
    /// labels are ignored.
    pub fn console_time_end(&self, label: &str) -> Option<LogEntry> {
        let elapsed = self.inner.timers.stop(label)?;
        Some(self.console_log(&format!("{label}: {}ms", elapsed.as_millis())))
    }

    pub fn alert(&self, title: &str, message: Option<&str>) -> LogEntry {
        let text = match message {
            Some(message) => format!("{title}: {message}"),
            None => title.to_string(),
        };
        self.log()
            .append(LogKind::Alert, text, self.tag(), Some(ALERT_COLOR.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::port_service::tests::RecordingTransport;

    fn sandbox(payload: &[u8]) -> (Sandbox<RecordingTransport>, Arc<EventLog>) {
        let log = Arc::new(EventLog::default());
        let transport = Arc::new(RecordingTransport::new(&["rs485-1"]));
        let ports = Arc::new(PortService::new(transport, Arc::clone(&log)));
        let sandbox = Sandbox::new(
            ChannelId::new("rs485-1").unwrap(),
            payload.to_vec(),
            ports,
            Arc::new(ConsoleTimers::default()),
        );
        (sandbox, log)
    }

    #[test]
    fn should_expose_payload_as_text_and_bytes() {
        let (sb, _log) = sandbox(&[0x54, 0x3d, 0xff]);
        assert_eq!(sb.payload(), &[0x54, 0x3d, 0xff]);
        assert_eq!(sb.payload_text(), "T=\u{fffd}");
    }

    #[tokio::test]
    async fn should_skip_hex_send_when_digit_count_odd() {
        let (sb, log) = sandbox(b"");

        sb.send_write("4,", true).await.unwrap();

        assert!(sb.inner.ports.transport().written().is_empty());
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn should_send_decoded_hex_and_log_it() {
        let (sb, log) = sandbox(b"");

        sb.send_write("48656c6c6f", true).await.unwrap();

        let written = sb.inner.ports.transport().written();
        assert_eq!(written[0].1, b"Hello".to_vec());
        let entry = &log.snapshot(None)[0];
        assert_eq!(entry.kind, LogKind::Send);
        assert!(entry.message.contains("48 65 6C 6C 6F"));
    }

    #[tokio::test]
    async fn should_skip_empty_text_and_empty_bytes() {
        let (sb, log) = sandbox(b"");

        sb.send_write("", false).await.unwrap();
        sb.send_bytes(Vec::new()).await.unwrap();

        assert!(log.is_empty());
    }

    #[test]
    fn should_tag_console_entries_with_channel_and_color() {
        let (sb, _log) = sandbox(b"");

        let log_entry = sb.console_log("hello");
        let warn = sb.console_warn("careful");
        let error = sb.console_error("boom");

        assert_eq!(log_entry.channel_id, Some(ChannelId::new("rs485-1").unwrap()));
        assert_eq!(log_entry.color, None);
        assert_eq!(warn.kind, LogKind::Console);
        assert_eq!(warn.color.as_deref(), Some(WARN_COLOR));
        assert_eq!(error.kind, LogKind::Error);
        assert_eq!(error.color.as_deref(), Some(ERROR_COLOR));
    }

    #[test]
    fn should_format_alert_with_optional_message() {
        let (sb, _log) = sandbox(b"");

        assert_eq!(sb.alert("Door", Some("open")).message, "Door: open");
        let bare = sb.alert("Door", None);
        assert_eq!(bare.message, "Door");
        assert_eq!(bare.kind, LogKind::Alert);
        assert_eq!(bare.color.as_deref(), Some(ALERT_COLOR));
    }

    #[test]
    fn should_log_elapsed_time_only_for_matched_timer() {
        let (sb, log) = sandbox(b"");

        assert!(sb.console_time_end("poll").is_none());
        sb.console_time("poll");
        let entry = sb.console_time_end("poll").unwrap();

        assert!(entry.message.starts_with("poll: "));
        assert!(entry.message.ends_with("ms"));
        assert_eq!(log.len(), 1);
        assert!(sb.console_time_end("poll").is_none());
    }

    #[test]
    fn should_share_timers_between_sandboxes() {
        let timers = Arc::new(ConsoleTimers::default());
        let log = Arc::new(EventLog::default());
        let ports = Arc::new(PortService::new(
            Arc::new(RecordingTransport::new(&["rs485-1"])),
            Arc::clone(&log),
        ));
        let id = ChannelId::new("rs485-1").unwrap();
        let first = Sandbox::new(id.clone(), b"a".to_vec(), Arc::clone(&ports), Arc::clone(&timers));
        let second = Sandbox::new(id, b"b".to_vec(), ports, timers);

        first.console_time(DEFAULT_TIMER_LABEL);

        assert!(second.console_time_end(DEFAULT_TIMER_LABEL).is_some());
    }
}
