//! Automation coordinator: owns the single automation slot.
//!
//! ## Responsibilities
//! - Keep the script source, its compiled artifact and the last error together
//!   so a recompile replaces all three at once
//! - Bind the slot to at most one channel and feed that channel's inbound
//!   lines to the script engine
//! - Record script failures (state, log, notification) without ever
//!   disabling automation
//! - Push an [`AutomationState`] to observers after every mutation
//!
//! ## Dispatch
//! Each `enable` spawns one dispatcher task that drains the channel's `data`
//! events and awaits every run before taking the next line, so runs on the
//! active channel never overlap. Re-binding or disabling stops the task
//! before the call returns; a run already in flight completes on its own.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use linescript_domain::automation::{AutomationSnapshot, AutomationState};
use linescript_domain::channel::{ChannelConfig, ChannelEvent, ChannelEventKind};
use linescript_domain::error::{ConflictError, LineScriptError};
use linescript_domain::id::ChannelId;
use linescript_domain::log::{ERROR_COLOR, LogEntry, LogKind};

use crate::channel_hub::{ChannelEventHub, ChannelEventStream};
use crate::event_log::EventLog;
use crate::fanout::{Subscribers, Subscription};
use crate::ports::{ChannelTransport, ScriptEngine};
use crate::sandbox::{ConsoleTimers, Sandbox};
use crate::services::PortService;

/// Everything a new live observer needs: history first, then updates.
#[derive(Debug)]
pub struct AutomationFeed {
    pub logs: Vec<LogEntry>,
    pub state: AutomationState,
    pub log_updates: Subscription<LogEntry>,
    pub state_updates: Subscription<AutomationState>,
}

/// The process-wide automation slot.
pub struct AutomationCoordinator<T, E: ScriptEngine> {
    ports: Arc<PortService<T>>,
    hub: ChannelEventHub<T>,
    engine: E,
    timers: Arc<ConsoleTimers>,
    open_config: ChannelConfig,
    inner: Mutex<Inner<E::Artifact>>,
}

struct Inner<A> {
    script: String,
    artifact: Option<Arc<A>>,
    enabled: bool,
    active: Option<ChannelId>,
    last_error: Option<String>,
    generation: u64,
    binding: Option<Binding>,
    subscribers: Subscribers<AutomationState>,
}

struct Binding {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl<A> Inner<A> {
    fn state(&self) -> AutomationState {
        AutomationState {
            script: self.script.clone(),
            enabled: self.enabled,
            active_channel_id: self.active.clone(),
            last_error: self.last_error.clone(),
        }
    }

    fn publish(&mut self) -> AutomationState {
        let state = self.state();
        self.subscribers.notify(&state);
        state
    }

    /// Stop the current dispatcher, handing back its task.
    fn unbind(&mut self) -> Option<JoinHandle<()>> {
        self.generation += 1;
        self.binding.take().map(|binding| {
            let _ = binding.stop.send(());
            binding.task
        })
    }
}

impl<T, E> AutomationCoordinator<T, E>
where
    T: ChannelTransport + Send + Sync + 'static,
    E: ScriptEngine + Send + Sync + 'static,
{
    /// Create a disabled coordinator with an empty script.
    pub fn new(ports: Arc<PortService<T>>, engine: E) -> Self {
        let hub = ChannelEventHub::new(Arc::clone(ports.transport()));
        Self {
            ports,
            hub,
            engine,
            timers: Arc::default(),
            open_config: ChannelConfig::default(),
            inner: Mutex::new(Inner {
                script: String::new(),
                artifact: None,
                enabled: false,
                active: None,
                last_error: None,
                generation: 0,
                binding: None,
                subscribers: Subscribers::default(),
            }),
        }
    }

    /// Configuration used when `enable` has to open the target channel.
    #[must_use]
    pub fn with_channel_config(mut self, config: ChannelConfig) -> Self {
        self.open_config = config;
        self
    }

    #[must_use]
    pub fn ports(&self) -> &Arc<PortService<T>> {
        &self.ports
    }

    #[must_use]
    pub fn log(&self) -> &Arc<EventLog> {
        self.ports.log()
    }

    fn lock(&self) -> MutexGuard<'_, Inner<E::Artifact>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the script and recompile it.
    ///
    /// A compile failure clears the artifact, records the message as
    /// `last_error` and logs it; it never fails the call.
    #[tracing::instrument(skip(self, source), fields(len = source.len()))]
    pub fn set_script(&self, source: String) -> AutomationState {
        let compiled = self.engine.compile(&source);
        let mut inner = self.lock();
        inner.script = source;
        match compiled {
            Ok(artifact) => {
                inner.artifact = Some(Arc::new(artifact));
                inner.last_error = None;
            }
            Err(err) => {
                tracing::warn!(error = %err, "script failed to compile");
                inner.artifact = None;
                inner.last_error = Some(err.to_string());
                self.log().append(
                    LogKind::Error,
                    format!("Compile error: {err}"),
                    inner.active.clone(),
                    Some(ERROR_COLOR.into()),
                );
            }
        }
        inner.publish()
    }

    fn compile_if_missing(&self) {
        let source = {
            let inner = self.lock();
            if inner.artifact.is_some() {
                return;
            }
            inner.script.clone()
        };
        self.set_script(source);
    }

    fn is_open(&self, channel: &ChannelId) -> bool {
        self.ports
            .transport()
            .list()
            .iter()
            .any(|info| &info.id == channel && info.open)
    }

    /// Bind automation to `channel`, replacing any previous binding.
    ///
    /// Compiles the current script if no artifact exists and opens the
    /// channel if needed; an open failure is logged and otherwise ignored.
    ///
    /// # Errors
    ///
    /// Returns [`LineScriptError::NotFound`] when the transport does not
    /// know `channel`.
    #[tracing::instrument(skip(self))]
    pub async fn enable(
        self: &Arc<Self>,
        channel: ChannelId,
    ) -> Result<AutomationState, LineScriptError> {
        let data = self.hub.subscribe(&channel, ChannelEventKind::Data)?;
        self.compile_if_missing();
        if !self.is_open(&channel) {
            if let Err(err) = self.ports.transport().open(&channel, self.open_config).await {
                tracing::warn!(%channel, error = %err, "could not open automation channel");
            }
        }

        let (stop, stopped) = oneshot::channel();
        let mut inner = self.lock();
        drop(inner.unbind());
        let generation = inner.generation;
        let task = tokio::spawn(Self::dispatch_loop(
            Arc::downgrade(self),
            generation,
            data,
            stopped,
        ));
        inner.binding = Some(Binding { stop, task });
        inner.enabled = true;
        inner.active = Some(channel.clone());
        inner.last_error = None;
        self.log().append(
            LogKind::Info,
            format!("Automation enabled on {channel}"),
            Some(channel),
            None,
        );
        Ok(inner.publish())
    }

    /// Unbind automation. Calling it while disabled is harmless.
    #[tracing::instrument(skip(self))]
    pub fn disable(&self) -> AutomationState {
        let mut inner = self.lock();
        drop(inner.unbind());
        inner.enabled = false;
        let previous = inner.active.take();
        self.log().append(LogKind::Info, "Automation disabled", previous, None);
        inner.publish()
    }

    /// Disable automation and wait for an in-flight run to finish.
    pub async fn shutdown(&self) {
        let (task, enabled) = {
            let mut inner = self.lock();
            (inner.unbind(), inner.enabled)
        };
        if enabled {
            self.disable();
        }
        if let Some(task) = task {
            if let Err(err) = task.await {
                tracing::warn!(error = %err, "automation dispatcher ended abnormally");
            }
        }
    }

    #[must_use]
    pub fn state(&self) -> AutomationState {
        self.lock().state()
    }

    /// Current state plus the log history visible to `filter`.
    #[must_use]
    pub fn snapshot(&self, filter: Option<&ChannelId>) -> AutomationSnapshot {
        let inner = self.lock();
        AutomationSnapshot {
            state: inner.state(),
            logs: self.log().snapshot(filter),
        }
    }

    /// Observe every future state change.
    pub fn subscribe_state(&self) -> Subscription<AutomationState> {
        self.lock().subscribers.add()
    }

    /// Log history, current state and both live subscriptions, taken together
    /// so nothing is missed or seen twice.
    pub fn subscribe_feed(&self, filter: Option<&ChannelId>) -> AutomationFeed {
        let mut inner = self.lock();
        let (logs, log_updates) = self.log().subscribe_with_snapshot(filter);
        AutomationFeed {
            logs,
            state: inner.state(),
            log_updates,
            state_updates: inner.subscribers.add(),
        }
    }

    /// Require automation to be enabled on `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`ConflictError::Disabled`] or [`ConflictError::ActiveElsewhere`].
    pub fn ensure_active_for(&self, channel: &ChannelId) -> Result<(), ConflictError> {
        self.lock().state().ensure_active_on(channel)
    }

    fn guarded<R>(
        &self,
        channel: &ChannelId,
        write: impl FnOnce(&PortService<T>) -> R,
    ) -> Result<R, ConflictError> {
        let inner = self.lock();
        inner.state().ensure_active_on(channel)?;
        Ok(write(&self.ports))
    }

    /// Receive-console write on behalf of an external caller.
    ///
    /// # Errors
    ///
    /// Fails with a [`ConflictError`] unless automation is active on `channel`.
    pub fn receive_write(
        &self,
        channel: &ChannelId,
        message: &str,
        color: Option<String>,
    ) -> Result<LogEntry, ConflictError> {
        self.guarded(channel, |ports| ports.receive_write(Some(channel), message, color))
    }

    /// # Errors
    ///
    /// Fails with a [`ConflictError`] unless automation is active on `channel`.
    pub fn receive_write_line(
        &self,
        channel: &ChannelId,
        message: &str,
        color: Option<String>,
    ) -> Result<LogEntry, ConflictError> {
        self.guarded(channel, |ports| {
            ports.receive_write_line(Some(channel), message, color)
        })
    }

    /// # Errors
    ///
    /// Fails with a [`ConflictError`] unless automation is active on `channel`.
    pub fn receive_clear(&self, channel: &ChannelId) -> Result<LogEntry, ConflictError> {
        self.guarded(channel, |ports| ports.receive_clear(Some(channel)))
    }

    /// # Errors
    ///
    /// Fails with a [`ConflictError`] unless automation is active on `channel`.
    pub fn receive_clear_last(&self, channel: &ChannelId) -> Result<LogEntry, ConflictError> {
        self.guarded(channel, |ports| ports.receive_clear_last(Some(channel)))
    }

    async fn dispatch_loop(
        coordinator: Weak<Self>,
        generation: u64,
        mut data: ChannelEventStream,
        mut stopped: oneshot::Receiver<()>,
    ) {
        loop {
            let event = tokio::select! {
                biased;
                _ = &mut stopped => break,
                event = data.recv() => event,
            };
            let Some(event) = event else { break };
            let ChannelEvent::Data(line) = event else {
                continue;
            };
            let Some(coordinator) = coordinator.upgrade() else {
                break;
            };
            coordinator.dispatch(data.channel(), generation, line).await;
        }
        tracing::debug!(channel = %data.channel(), "automation dispatcher stopped");
    }

    async fn dispatch(&self, channel: &ChannelId, generation: u64, line: Vec<u8>) {
        let artifact = {
            let inner = self.lock();
            if !inner.enabled || inner.generation != generation {
                return;
            }
            let Some(artifact) = inner.artifact.clone() else {
                tracing::debug!(%channel, "no compiled script, skipping line");
                return;
            };
            artifact
        };

        tracing::debug!(%channel, len = line.len(), "running automation script");
        let sandbox = Sandbox::new(
            channel.clone(),
            line,
            Arc::clone(&self.ports),
            Arc::clone(&self.timers),
        );
        let outcome = self.engine.run(artifact, sandbox).await;

        let mut inner = self.lock();
        match outcome {
            Ok(()) => {
                if inner.last_error.take().is_some() {
                    inner.publish();
                }
            }
            Err(err) => {
                tracing::warn!(%channel, error = %err, "automation script failed");
                let message = err.to_string();
                inner.last_error = Some(message.clone());
                self.log().append(
                    LogKind::Error,
                    message,
                    Some(channel.clone()),
                    Some(ERROR_COLOR.into()),
                );
                inner.publish();
            }
        }
    }
}
