//! Axum router assembly.

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use linescript_app::ports::{ChannelTransport, ScriptEngine};

use crate::state::AppState;

/// Build the top-level axum [`Router`].
///
/// Nests the API routes under `/api` and adds a [`TraceLayer`] that logs
/// each HTTP request/response at the `DEBUG` level.
pub fn build<T, E>(state: AppState<T, E>) -> Router
where
    T: ChannelTransport + Send + Sync + 'static,
    E: ScriptEngine + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(health_check))
        .nest("/api", crate::api::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
