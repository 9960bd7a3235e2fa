//! Server-Sent Events (SSE) streams for live updates.
//!
//! Automation streams open with the log history and the current state, then
//! relay live `log` and `state` events. Channel streams open with a `status`
//! event listing every channel, then relay transport events together with the
//! log entries tagged for that channel (`console-log`).

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use serde::Serialize;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::{BroadcastStream, ReceiverStream};
use tokio_stream::{Stream, StreamExt};

use linescript_app::ports::{ChannelTransport, ScriptEngine};
use linescript_domain::id::ChannelId;

use crate::api::known_channel;
use crate::error::ApiError;
use crate::state::AppState;

type SseItem = Result<Event, Infallible>;

fn json_event(name: &str, value: &impl Serialize) -> Option<SseItem> {
    match serde_json::to_string(value) {
        Ok(json) => Some(Ok(Event::default().event(name).data(json))),
        Err(err) => {
            tracing::warn!(%err, event = name, "failed to serialize SSE payload");
            None
        }
    }
}

fn keep_alive(interval: Duration) -> KeepAlive {
    KeepAlive::new().interval(interval).text("ping")
}

fn automation_events<T, E>(
    state: &AppState<T, E>,
    filter: Option<ChannelId>,
) -> Sse<impl Stream<Item = SseItem> + use<T, E>>
where
    T: ChannelTransport + Send + Sync + 'static,
    E: ScriptEngine + Send + Sync + 'static,
{
    let feed = state.coordinator.subscribe_feed(filter.as_ref());
    let history: Vec<SseItem> = feed
        .logs
        .iter()
        .filter_map(|entry| json_event("log", entry))
        .chain(json_event("state", &feed.state))
        .collect();

    let logs = ReceiverStream::new(feed.log_updates.into_inner())
        .filter(move |entry| entry.is_visible_to(filter.as_ref()))
        .filter_map(|entry| json_event("log", &entry));
    let states = ReceiverStream::new(feed.state_updates.into_inner())
        .filter_map(|update| json_event("state", &update));

    let stream = tokio_stream::iter(history).chain(logs.merge(states));
    Sse::new(stream).keep_alive(keep_alive(state.heartbeat))
}

/// `GET /api/automation/stream`: every log entry and state change.
pub async fn automation_stream<T, E>(
    State(state): State<AppState<T, E>>,
) -> Sse<impl Stream<Item = SseItem>>
where
    T: ChannelTransport + Send + Sync + 'static,
    E: ScriptEngine + Send + Sync + 'static,
{
    automation_events(&state, None)
}

/// `GET /api/ports/:id/automation/stream`: like the unscoped stream, with
/// log entries of other channels left out.
pub async fn port_automation_stream<T, E>(
    State(state): State<AppState<T, E>>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = SseItem>>, ApiError>
where
    T: ChannelTransport + Send + Sync + 'static,
    E: ScriptEngine + Send + Sync + 'static,
{
    let id = known_channel(state.transport(), id)?;
    Ok(automation_events(&state, Some(id)))
}

/// `GET /api/ports/:id/stream`: transport events of one channel.
pub async fn port_stream<T, E>(
    State(state): State<AppState<T, E>>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = SseItem>>, ApiError>
where
    T: ChannelTransport + Send + Sync + 'static,
    E: ScriptEngine + Send + Sync + 'static,
{
    let transport = state.transport();
    let id = known_channel(transport, id)?;
    let events = transport.events(&id)?;
    let entries = state.coordinator.log().subscribe();
    let status = json_event("status", &transport.list());

    let channel_events = BroadcastStream::new(events).filter_map(|result| match result {
        Ok(event) => json_event(event.kind().as_str(), &event.payload()),
        Err(BroadcastStreamRecvError::Lagged(n)) => {
            tracing::warn!(
                skipped = n,
                "SSE subscriber lagged, some channel events were dropped"
            );
            None
        }
    });
    let console = ReceiverStream::new(entries.into_inner())
        .filter(move |entry| entry.is_visible_to(Some(&id)))
        .filter_map(|entry| json_event("console-log", &entry));

    let stream = tokio_stream::iter(status).chain(channel_events.merge(console));
    Ok(Sse::new(stream).keep_alive(keep_alive(state.heartbeat)))
}
