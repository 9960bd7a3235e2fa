//! # linescript-app
//!
//! Application layer: use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `ChannelTransport`: open, close, write and observe communication lines
//!   - `ScriptEngine`: compile script source and run it against a sandbox
//! - Define **driving/inbound** use-cases:
//!   - `PortService`: send path and receive-console helpers
//!   - `AutomationCoordinator`: the single automation slot (enable, disable, script)
//! - Provide **in-process infrastructure** that doesn't need IO: the bounded
//!   event log, subscriber fan-out and the channel event hub
//!
//! ## Dependency rule
//! Depends on `linescript-domain` only (plus `tokio` for channels, tasks and timers).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod automation_coordinator;
pub mod channel_hub;
pub mod event_log;
pub mod fanout;
pub mod ports;
pub mod sandbox;
pub mod services;
