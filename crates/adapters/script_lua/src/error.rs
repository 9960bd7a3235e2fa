//! Lua-specific error type and its mapping onto the domain taxonomy.

use std::time::Instant;

use linescript_domain::error::RuntimeError;

/// Errors raised while preparing or executing a Lua run.
#[derive(Debug, thiserror::Error)]
pub enum LuaEngineError {
    /// The interpreter reported an error (syntax, runtime or host callback).
    #[error("{}", describe(.0))]
    Lua(#[from] mlua::Error),

    /// The run did not settle before its deadline.
    #[error("Script timeout")]
    Timeout,

    /// The blocking worker panicked or was cancelled.
    #[error("script worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl LuaEngineError {
    /// Any failure observed at or past the deadline is reported as a timeout,
    /// whatever the interpreter made of the abort.
    #[must_use]
    pub fn at_deadline(self, deadline: Instant) -> Self {
        if Instant::now() >= deadline {
            Self::Timeout
        } else {
            self
        }
    }

    #[must_use]
    pub fn into_domain(self) -> RuntimeError {
        match self {
            Self::Timeout => RuntimeError::Timeout,
            other => RuntimeError::Failed(other.to_string()),
        }
    }
}

impl From<LuaEngineError> for RuntimeError {
    fn from(err: LuaEngineError) -> Self {
        err.into_domain()
    }
}

/// The message a script author wants to see: the innermost cause, without
/// the traceback mlua appends.
pub(crate) fn describe(err: &mlua::Error) -> String {
    match err {
        mlua::Error::CallbackError { cause, .. } => describe(cause),
        mlua::Error::SyntaxError { message, .. } | mlua::Error::RuntimeError(message) => {
            strip_traceback(message)
        }
        mlua::Error::ExternalError(inner) => inner.to_string(),
        other => strip_traceback(&other.to_string()),
    }
}

fn strip_traceback(message: &str) -> String {
    message
        .split("\nstack traceback:")
        .next()
        .unwrap_or(message)
        .trim_end()
        .to_string()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn should_drop_traceback_from_runtime_message() {
        let err = mlua::Error::RuntimeError(
            "automation:3: bad frame\nstack traceback:\n\t[C]: in ?".to_string(),
        );
        assert_eq!(describe(&err), "automation:3: bad frame");
    }

    #[test]
    fn should_unwrap_callback_error_to_its_cause() {
        let err = mlua::Error::CallbackError {
            traceback: "stack traceback:".to_string(),
            cause: Arc::new(mlua::Error::RuntimeError("channel not open: rs485-1".into())),
        };
        assert_eq!(
            LuaEngineError::from(err).into_domain(),
            RuntimeError::Failed("channel not open: rs485-1".to_string())
        );
    }

    #[test]
    fn should_report_timeout_when_failing_after_deadline() {
        let past = Instant::now().checked_sub(Duration::from_millis(1)).unwrap();
        let err = LuaEngineError::from(mlua::Error::RuntimeError("interrupted".into()));
        assert_eq!(err.at_deadline(past).into_domain(), RuntimeError::Timeout);
    }

    #[test]
    fn should_keep_error_when_failing_before_deadline() {
        let future = Instant::now() + Duration::from_secs(60);
        let err = LuaEngineError::from(mlua::Error::RuntimeError("boom".into()));
        assert_eq!(
            err.at_deadline(future).into_domain(),
            RuntimeError::Failed("boom".to_string())
        );
    }
}
