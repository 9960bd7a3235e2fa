//! Receive-console handlers.
//!
//! Only the channel automation is bound to may write to its receive console;
//! every route answers 409 otherwise.

use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;

use linescript_app::ports::{ChannelTransport, ScriptEngine};
use linescript_domain::log::LogEntry;

use crate::api::known_channel;
use crate::error::ApiError;
use crate::state::AppState;

/// Request body for the write endpoints.
#[derive(Debug, Deserialize)]
pub struct ReceiveRequest {
    pub message: String,
    #[serde(default)]
    pub color: Option<String>,
}

/// `POST /api/ports/:id/receive/write`.
pub async fn write<T, E>(
    State(state): State<AppState<T, E>>,
    Path(id): Path<String>,
    Json(req): Json<ReceiveRequest>,
) -> Result<Json<LogEntry>, ApiError>
where
    T: ChannelTransport + Send + Sync + 'static,
    E: ScriptEngine + Send + Sync + 'static,
{
    let id = known_channel(state.transport(), id)?;
    let entry = state
        .coordinator
        .receive_write(&id, &req.message, req.color)?;
    Ok(Json(entry))
}

/// `POST /api/ports/:id/receive/write-line`: like `write`, newline-terminated.
pub async fn write_line<T, E>(
    State(state): State<AppState<T, E>>,
    Path(id): Path<String>,
    Json(req): Json<ReceiveRequest>,
) -> Result<Json<LogEntry>, ApiError>
where
    T: ChannelTransport + Send + Sync + 'static,
    E: ScriptEngine + Send + Sync + 'static,
{
    let id = known_channel(state.transport(), id)?;
    let entry = state
        .coordinator
        .receive_write_line(&id, &req.message, req.color)?;
    Ok(Json(entry))
}

/// `POST /api/ports/:id/receive/clear`.
pub async fn clear<T, E>(
    State(state): State<AppState<T, E>>,
    Path(id): Path<String>,
) -> Result<Json<LogEntry>, ApiError>
where
    T: ChannelTransport + Send + Sync + 'static,
    E: ScriptEngine + Send + Sync + 'static,
{
    let id = known_channel(state.transport(), id)?;
    Ok(Json(state.coordinator.receive_clear(&id)?))
}

/// `POST /api/ports/:id/receive/clear-last`.
pub async fn clear_last<T, E>(
    State(state): State<AppState<T, E>>,
    Path(id): Path<String>,
) -> Result<Json<LogEntry>, ApiError>
where
    T: ChannelTransport + Send + Sync + 'static,
    E: ScriptEngine + Send + Sync + 'static,
{
    let id = known_channel(state.transport(), id)?;
    Ok(Json(state.coordinator.receive_clear_last(&id)?))
}
