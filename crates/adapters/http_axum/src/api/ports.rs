//! JSON REST handlers for the channel registry and the send path.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use linescript_app::ports::{ChannelTransport, ScriptEngine};
use linescript_domain::channel::{ChannelConfig, ChannelInfo};

use crate::api::{channel_info, known_channel};
use crate::error::ApiError;
use crate::state::AppState;

/// Request body for writing to a channel.
///
/// `bytes` wins over `data`; otherwise `data` is sent as text, or decoded
/// as hex digits when `hex` is set.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WriteRequest {
    pub data: String,
    pub hex: bool,
    pub bytes: Option<Vec<u8>>,
}

/// Request body for changing the baud rate of an open channel.
#[derive(Debug, Deserialize)]
pub struct BaudRequest {
    pub baud_rate: u32,
}

/// Possible responses from the list endpoint.
pub enum ListResponse {
    Ok(Json<Vec<ChannelInfo>>),
}

impl IntoResponse for ListResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the open/close/baud endpoints.
pub enum ChannelResponse {
    Ok(Json<ChannelInfo>),
}

impl IntoResponse for ChannelResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the write endpoint.
pub enum WriteResponse {
    NoContent,
}

impl IntoResponse for WriteResponse {
    fn into_response(self) -> Response {
        match self {
            Self::NoContent => StatusCode::NO_CONTENT.into_response(),
        }
    }
}

/// `GET /api/ports`: list configured channels.
pub async fn list<T, E>(State(state): State<AppState<T, E>>) -> ListResponse
where
    T: ChannelTransport + Send + Sync + 'static,
    E: ScriptEngine + Send + Sync + 'static,
{
    ListResponse::Ok(Json(state.transport().list()))
}

/// `POST /api/ports/:id/open`: open a channel; every line setting is optional.
pub async fn open<T, E>(
    State(state): State<AppState<T, E>>,
    Path(id): Path<String>,
    Json(config): Json<ChannelConfig>,
) -> Result<ChannelResponse, ApiError>
where
    T: ChannelTransport + Send + Sync + 'static,
    E: ScriptEngine + Send + Sync + 'static,
{
    let transport = state.transport();
    let id = known_channel(transport, id)?;
    config.validate()?;
    transport.open(&id, config).await?;
    let info = channel_info(transport, id.to_string())?;
    Ok(ChannelResponse::Ok(Json(info)))
}

/// `POST /api/ports/:id/close`: close a channel.
pub async fn close<T, E>(
    State(state): State<AppState<T, E>>,
    Path(id): Path<String>,
) -> Result<ChannelResponse, ApiError>
where
    T: ChannelTransport + Send + Sync + 'static,
    E: ScriptEngine + Send + Sync + 'static,
{
    let transport = state.transport();
    let id = known_channel(transport, id)?;
    transport.close(&id).await?;
    let info = channel_info(transport, id.to_string())?;
    Ok(ChannelResponse::Ok(Json(info)))
}

/// `POST /api/ports/:id/baud`: change the baud rate of a channel.
pub async fn set_baud<T, E>(
    State(state): State<AppState<T, E>>,
    Path(id): Path<String>,
    Json(req): Json<BaudRequest>,
) -> Result<ChannelResponse, ApiError>
where
    T: ChannelTransport + Send + Sync + 'static,
    E: ScriptEngine + Send + Sync + 'static,
{
    let transport = state.transport();
    let id = known_channel(transport, id)?;
    ChannelConfig::with_baud_rate(req.baud_rate).validate()?;
    transport.set_baud(&id, req.baud_rate).await?;
    let info = channel_info(transport, id.to_string())?;
    Ok(ChannelResponse::Ok(Json(info)))
}

/// `POST /api/ports/:id/write`: send text, hex digits or raw bytes.
pub async fn write<T, E>(
    State(state): State<AppState<T, E>>,
    Path(id): Path<String>,
    Json(req): Json<WriteRequest>,
) -> Result<WriteResponse, ApiError>
where
    T: ChannelTransport + Send + Sync + 'static,
    E: ScriptEngine + Send + Sync + 'static,
{
    let id = known_channel(state.transport(), id)?;
    let ports = state.ports();
    match req.bytes {
        Some(bytes) => ports.send_bytes(&id, bytes).await?,
        None if req.hex => ports.send_hex(&id, &req.data).await?,
        None => ports.send_text(&id, &req.data).await?,
    }
    Ok(WriteResponse::NoContent)
}
