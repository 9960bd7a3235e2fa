//! Shared application state for axum handlers.

use std::sync::Arc;
use std::time::Duration;

use linescript_app::automation_coordinator::AutomationCoordinator;
use linescript_app::ports::{ChannelTransport, ScriptEngine};
use linescript_app::services::PortService;

/// Interval between SSE keep-alive comments when none is configured.
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(15);

/// Application state shared across all axum handlers.
///
/// Generic over the channel transport and the script engine to avoid
/// dynamic dispatch. `Clone` is implemented manually so neither needs to be
/// `Clone` itself; only the `Arc` is cloned.
pub struct AppState<T, E: ScriptEngine> {
    /// The single automation slot and, through it, the send path and log.
    pub coordinator: Arc<AutomationCoordinator<T, E>>,
    /// Keep-alive interval of every SSE stream.
    pub heartbeat: Duration,
}

impl<T, E: ScriptEngine> Clone for AppState<T, E> {
    fn clone(&self) -> Self {
        Self {
            coordinator: Arc::clone(&self.coordinator),
            heartbeat: self.heartbeat,
        }
    }
}

impl<T, E> AppState<T, E>
where
    T: ChannelTransport + Send + Sync + 'static,
    E: ScriptEngine + Send + Sync + 'static,
{
    /// Create the state from a coordinator that may already be shared with
    /// background tasks.
    pub fn new(coordinator: Arc<AutomationCoordinator<T, E>>) -> Self {
        Self {
            coordinator,
            heartbeat: DEFAULT_HEARTBEAT,
        }
    }

    #[must_use]
    pub fn with_heartbeat(mut self, heartbeat: Duration) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    pub(crate) fn ports(&self) -> &Arc<PortService<T>> {
        self.coordinator.ports()
    }

    pub(crate) fn transport(&self) -> &Arc<T> {
        self.coordinator.ports().transport()
    }
}
