//! JSON REST handlers for the automation slot.
//!
//! The unscoped routes see every log entry and may move the binding from one
//! channel to another; the routes under `/ports/:id/automation` filter the
//! history to that channel and refuse to steal a binding held by another
//! channel.

use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;

use linescript_app::ports::{ChannelTransport, ScriptEngine};
use linescript_domain::automation::{AutomationSnapshot, AutomationState};
use linescript_domain::error::ConflictError;

use crate::api::known_channel;
use crate::error::ApiError;
use crate::state::AppState;

/// Request body for replacing the automation script.
#[derive(Debug, Deserialize)]
pub struct ScriptRequest {
    pub script: String,
}

/// Request body of the unscoped enable route.
#[derive(Debug, Deserialize)]
pub struct EnableRequest {
    #[serde(rename = "portId", default)]
    pub port_id: Option<String>,
}

/// `GET /api/automation/state`: state plus the whole log history.
pub async fn state<T, E>(State(state): State<AppState<T, E>>) -> Json<AutomationSnapshot>
where
    T: ChannelTransport + Send + Sync + 'static,
    E: ScriptEngine + Send + Sync + 'static,
{
    Json(state.coordinator.snapshot(None))
}

/// `POST /api/automation/script`: replace and recompile the script.
///
/// A compile failure is not an HTTP error; it shows up as `last_error`.
pub async fn set_script<T, E>(
    State(state): State<AppState<T, E>>,
    Json(req): Json<ScriptRequest>,
) -> Json<AutomationState>
where
    T: ChannelTransport + Send + Sync + 'static,
    E: ScriptEngine + Send + Sync + 'static,
{
    Json(state.coordinator.set_script(req.script))
}

/// `POST /api/automation/enable`: bind automation to the channel named in
/// the body, moving it off whichever channel held it before.
pub async fn retarget<T, E>(
    State(state): State<AppState<T, E>>,
    Json(req): Json<EnableRequest>,
) -> Result<Json<AutomationState>, ApiError>
where
    T: ChannelTransport + Send + Sync + 'static,
    E: ScriptEngine + Send + Sync + 'static,
{
    let id = known_channel(state.transport(), req.port_id.unwrap_or_default())?;
    let updated = state.coordinator.enable(id).await?;
    Ok(Json(updated))
}

/// `GET /api/ports/:id/automation/state`: state plus the log history
/// visible to one channel.
pub async fn port_state<T, E>(
    State(state): State<AppState<T, E>>,
    Path(id): Path<String>,
) -> Result<Json<AutomationSnapshot>, ApiError>
where
    T: ChannelTransport + Send + Sync + 'static,
    E: ScriptEngine + Send + Sync + 'static,
{
    let id = known_channel(state.transport(), id)?;
    Ok(Json(state.coordinator.snapshot(Some(&id))))
}

/// `POST /api/ports/:id/automation/script`.
pub async fn port_set_script<T, E>(
    State(state): State<AppState<T, E>>,
    Path(id): Path<String>,
    Json(req): Json<ScriptRequest>,
) -> Result<Json<AutomationState>, ApiError>
where
    T: ChannelTransport + Send + Sync + 'static,
    E: ScriptEngine + Send + Sync + 'static,
{
    known_channel(state.transport(), id)?;
    Ok(Json(state.coordinator.set_script(req.script)))
}

/// `POST /api/ports/:id/automation/enable`: bind automation to a channel.
///
/// Re-enabling on the channel that already holds the binding restarts it;
/// enabling while another channel holds it is a conflict.
pub async fn enable<T, E>(
    State(state): State<AppState<T, E>>,
    Path(id): Path<String>,
) -> Result<Json<AutomationState>, ApiError>
where
    T: ChannelTransport + Send + Sync + 'static,
    E: ScriptEngine + Send + Sync + 'static,
{
    let id = known_channel(state.transport(), id)?;
    state.coordinator.state().ensure_free_for(&id)?;
    let updated = state.coordinator.enable(id).await?;
    Ok(Json(updated))
}

/// `POST /api/ports/:id/automation/disable`.
///
/// Nothing happens when automation is already off.
pub async fn disable<T, E>(
    State(state): State<AppState<T, E>>,
    Path(id): Path<String>,
) -> Result<Json<AutomationState>, ApiError>
where
    T: ChannelTransport + Send + Sync + 'static,
    E: ScriptEngine + Send + Sync + 'static,
{
    let id = known_channel(state.transport(), id)?;
    match state.coordinator.ensure_active_for(&id) {
        Ok(()) => Ok(Json(state.coordinator.disable())),
        Err(ConflictError::Disabled) => Ok(Json(state.coordinator.state())),
        Err(err) => Err(err.into()),
    }
}
