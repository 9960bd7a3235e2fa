//! Script engine port: compile user scripts and run them in a sandbox.

use std::future::Future;
use std::sync::Arc;

use linescript_domain::error::{CompileError, RuntimeError};

use crate::ports::ChannelTransport;
use crate::sandbox::Sandbox;

/// Turns script source into a runnable artifact and executes it.
///
/// Implementations own the execution budget: a run that outlives it must
/// resolve to [`RuntimeError::Timeout`].
pub trait ScriptEngine {
    /// Executable form of a script. Shared between overlapping runs.
    type Artifact: Send + Sync + 'static;

    /// Compile `source`. Does not need an active channel.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError`] when the source is malformed.
    fn compile(&self, source: &str) -> Result<Self::Artifact, CompileError>;

    /// Run `artifact` once with the capabilities exposed by `sandbox`.
    fn run<T>(
        &self,
        artifact: Arc<Self::Artifact>,
        sandbox: Sandbox<T>,
    ) -> impl Future<Output = Result<(), RuntimeError>> + Send
    where
        T: ChannelTransport + Send + Sync + 'static;
}
