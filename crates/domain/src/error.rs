//! Common error types used across the workspace.
//!
//! Each failure family has its own typed error; [`LineScriptError`] unifies
//! them via `#[from]` so the `?` operator works across layers.

use crate::id::ChannelId;

/// Top-level error returned by ports and application services.
#[derive(Debug, thiserror::Error)]
pub enum LineScriptError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Input that violates a domain invariant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("channel id must not be empty")]
    EmptyChannelId,

    #[error("channel id must not contain '/' or whitespace: {0:?}")]
    InvalidChannelId(String),

    #[error("missing hex payload")]
    MissingHexPayload,

    #[error("hex payload has an odd number of digits ({0})")]
    OddHexLength(usize),

    #[error("payload must not be empty")]
    EmptyPayload,

    #[error("baud rate must be non-zero")]
    ZeroBaudRate,
}

/// A lookup by identifier found nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} not found: {id}")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// A request targets a channel other than the one automation is bound to.
///
/// The coordinator never raises this itself; callers that want exclusive
/// access check the current state and reject with it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConflictError {
    #[error("automation is disabled")]
    Disabled,

    #[error("automation is active on {active}, not {requested}")]
    ActiveElsewhere {
        active: ChannelId,
        requested: ChannelId,
    },

    #[error("automation already enabled on {active}")]
    AlreadyEnabled { active: ChannelId },
}

/// Failure reported by the channel transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("channel not open: {0}")]
    NotOpen(ChannelId),

    #[error("device not found: {path}")]
    DeviceMissing { path: String },

    #[error("i/o failure on channel {channel}")]
    Io {
        channel: ChannelId,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Script source that could not be compiled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct CompileError {
    pub message: String,
}

impl CompileError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failure raised while a compiled script was executing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    /// The run exceeded its wall-clock budget.
    #[error("Script timeout")]
    Timeout,

    /// The script raised an error (or a host call it made failed).
    #[error("{0}")]
    Failed(String),
}
