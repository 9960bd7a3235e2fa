//! # linescript-adapter-script-lua
//!
//! Script engine backed by an embedded Lua 5.4 interpreter (`mlua`).
//!
//! ## Execution model
//! - Compiling checks the source in a scratch interpreter; the artifact keeps
//!   the validated source
//! - Every run gets a fresh interpreter whose environment holds only the
//!   sandbox surface (see [`globals`](crate::globals)) and a safe subset of
//!   the standard library
//! - The chunk runs as a coroutine on a blocking worker thread: `delay` and
//!   `send.*` suspend the script, `sleep` blocks only that worker
//! - One deadline bounds the run. An instruction hook aborts code that spins
//!   past it, `sleep` refuses to overrun it, and pending asynchronous work is
//!   cut off when it passes
//! - `pcall` and `xpcall` re-raise the timeout after the protected call
//!   returns, so a script cannot swallow it and keep running
//!
//! ## Dependency rule
//! Depends on `linescript-app` (port traits) and `linescript-domain` only.

mod budget;
mod error;
mod globals;
mod values;

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use mlua::{HookTriggers, Lua, VmState};
use tokio::runtime::Handle;

use linescript_app::ports::{ChannelTransport, ScriptEngine};
use linescript_app::sandbox::Sandbox;
use linescript_domain::error::{CompileError, RuntimeError};

use crate::budget::Budget;

pub use error::LuaEngineError;

/// Wall-clock budget of one run unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

pub(crate) const TIMEOUT_MESSAGE: &str = "Script timeout";

/// Chunk name shown in error messages (`automation:3: ...`).
const CHUNK_NAME: &str = "=automation";

/// VM instructions between two deadline checks.
const HOOK_INTERVAL: u32 = 1_000;

/// Tunables of the Lua engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LuaEngineConfig {
    pub timeout: Duration,
}

impl Default for LuaEngineConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Source that is known to compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledScript {
    source: String,
}

impl CompiledScript {
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }
}

/// [`ScriptEngine`] running scripts as sandboxed Lua chunks.
#[derive(Debug, Clone, Default)]
pub struct LuaScriptEngine {
    config: LuaEngineConfig,
}

impl LuaScriptEngine {
    #[must_use]
    pub fn new(config: LuaEngineConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.config.timeout
    }
}

impl ScriptEngine for LuaScriptEngine {
    type Artifact = CompiledScript;

    fn compile(&self, source: &str) -> Result<CompiledScript, CompileError> {
        let lua = Lua::new();
        lua.load(source)
            .set_name(CHUNK_NAME)
            .into_function()
            .map_err(|err| CompileError::new(error::describe(&err)))?;
        Ok(CompiledScript {
            source: source.to_string(),
        })
    }

    fn run<T>(
        &self,
        artifact: Arc<CompiledScript>,
        sandbox: Sandbox<T>,
    ) -> impl Future<Output = Result<(), RuntimeError>> + Send
    where
        T: ChannelTransport + Send + Sync + 'static,
    {
        let timeout = self.config.timeout;
        async move {
            let deadline = Instant::now() + timeout;
            let handle = Handle::current();
            let worker = tokio::task::spawn_blocking(move || {
                execute(&handle, &artifact, &sandbox, deadline)
            });
            let outcome = worker.await.map_err(LuaEngineError::from)?;
            outcome.map_err(|err| {
                tracing::debug!(error = %err, "lua run failed");
                err.into_domain()
            })
        }
    }
}

/// Run one script to completion on the current (blocking) thread.
fn execute<T>(
    handle: &Handle,
    script: &CompiledScript,
    sandbox: &Sandbox<T>,
    deadline: Instant,
) -> Result<(), LuaEngineError>
where
    T: ChannelTransport + Send + Sync + 'static,
{
    let budget = Budget::new(deadline);
    let lua = Lua::new();
    let watchdog = budget.clone();
    lua.set_hook(
        HookTriggers::new().every_nth_instruction(HOOK_INTERVAL),
        move |_lua, _debug| watchdog.check().map(|()| VmState::Continue),
    );

    let env = globals::build(&lua, sandbox, &budget)?;
    let chunk = lua
        .load(script.source())
        .set_name(CHUNK_NAME)
        .set_environment(env)
        .into_function()?;

    handle
        .block_on(async {
            let finished: Result<mlua::Result<()>, _> =
                tokio::time::timeout_at(budget.deadline().into(), chunk.call_async(())).await;
            match finished {
                Ok(Ok(())) if budget.is_expired() => Err(LuaEngineError::Timeout),
                Ok(result) => result.map_err(LuaEngineError::from),
                Err(_elapsed) => Err(LuaEngineError::Timeout),
            }
        })
        .map_err(|err| err.at_deadline(budget.deadline()))
}
