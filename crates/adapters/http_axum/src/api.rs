//! JSON REST API handler modules.

#[allow(clippy::missing_errors_doc)]
pub mod automation;
#[allow(clippy::missing_errors_doc)]
pub mod ports;
#[allow(clippy::missing_errors_doc)]
pub mod receive;
#[allow(clippy::missing_errors_doc)]
pub mod sse;

use axum::Router;
use axum::routing::{get, post};

use linescript_app::ports::{ChannelTransport, ScriptEngine};
use linescript_domain::channel::ChannelInfo;
use linescript_domain::error::NotFoundError;
use linescript_domain::id::ChannelId;

use crate::error::ApiError;
use crate::state::AppState;

/// Build the `/api` sub-router.
pub fn routes<T, E>() -> Router<AppState<T, E>>
where
    T: ChannelTransport + Send + Sync + 'static,
    E: ScriptEngine + Send + Sync + 'static,
{
    Router::new()
        // Channels
        .route("/ports", get(ports::list::<T, E>))
        .route("/ports/{id}/open", post(ports::open::<T, E>))
        .route("/ports/{id}/close", post(ports::close::<T, E>))
        .route("/ports/{id}/baud", post(ports::set_baud::<T, E>))
        .route("/ports/{id}/write", post(ports::write::<T, E>))
        .route("/ports/{id}/stream", get(sse::port_stream::<T, E>))
        // Automation, unscoped
        .route("/automation/state", get(automation::state::<T, E>))
        .route("/automation/script", post(automation::set_script::<T, E>))
        .route("/automation/enable", post(automation::retarget::<T, E>))
        .route("/automation/stream", get(sse::automation_stream::<T, E>))
        // Automation, scoped to one channel
        .route(
            "/ports/{id}/automation/state",
            get(automation::port_state::<T, E>),
        )
        .route(
            "/ports/{id}/automation/script",
            post(automation::port_set_script::<T, E>),
        )
        .route(
            "/ports/{id}/automation/enable",
            post(automation::enable::<T, E>),
        )
        .route(
            "/ports/{id}/automation/disable",
            post(automation::disable::<T, E>),
        )
        .route(
            "/ports/{id}/automation/stream",
            get(sse::port_automation_stream::<T, E>),
        )
        // Receive console
        .route("/ports/{id}/receive/write", post(receive::write::<T, E>))
        .route(
            "/ports/{id}/receive/write-line",
            post(receive::write_line::<T, E>),
        )
        .route("/ports/{id}/receive/clear", post(receive::clear::<T, E>))
        .route(
            "/ports/{id}/receive/clear-last",
            post(receive::clear_last::<T, E>),
        )
}

/// Registry entry for the channel named in the path.
pub(crate) fn channel_info<T: ChannelTransport>(
    transport: &T,
    raw: String,
) -> Result<ChannelInfo, ApiError> {
    let id = ChannelId::new(raw)?;
    transport
        .list()
        .into_iter()
        .find(|info| info.id == id)
        .ok_or_else(|| {
            NotFoundError {
                entity: "Channel",
                id: id.to_string(),
            }
            .into()
        })
}

/// Parse the channel named in the path and require the transport to know it.
pub(crate) fn known_channel<T: ChannelTransport>(
    transport: &T,
    raw: String,
) -> Result<ChannelId, ApiError> {
    channel_info(transport, raw).map(|info| info.id)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, Response, StatusCode};
    use http_body_util::BodyExt;
    use linescript_adapter_virtual::VirtualTransport;
    use linescript_app::automation_coordinator::AutomationCoordinator;
    use linescript_app::event_log::EventLog;
    use linescript_app::ports::{ChannelTransport, ScriptEngine};
    use linescript_app::sandbox::Sandbox;
    use linescript_app::services::PortService;
    use linescript_domain::error::{CompileError, RuntimeError};
    use linescript_domain::id::ChannelId;
    use tower::ServiceExt;

    use crate::state::AppState;

    /// Engine whose artifact is the source itself: `echo` writes the
    /// triggering line back, anything else does nothing.
    pub(crate) struct StubEngine;

    impl ScriptEngine for StubEngine {
        type Artifact = String;

        fn compile(&self, source: &str) -> Result<String, CompileError> {
            if source.contains("syntax") {
                return Err(CompileError::new("unexpected symbol near 'syntax'"));
            }
            Ok(source.to_string())
        }

        async fn run<T>(
            &self,
            artifact: Arc<String>,
            sandbox: Sandbox<T>,
        ) -> Result<(), RuntimeError>
        where
            T: ChannelTransport + Send + Sync + 'static,
        {
            if artifact.trim() == "echo" {
                sandbox
                    .send_write(&sandbox.payload_text(), false)
                    .await
                    .map_err(|err| RuntimeError::Failed(err.to_string()))?;
            }
            Ok(())
        }
    }

    pub(crate) type Coordinator = AutomationCoordinator<VirtualTransport, StubEngine>;

    pub(crate) struct TestApp {
        pub(crate) router: Router,
        pub(crate) transport: Arc<VirtualTransport>,
        pub(crate) coordinator: Arc<Coordinator>,
    }

    impl TestApp {
        pub(crate) async fn call(&self, request: Request<Body>) -> Response<Body> {
            self.router.clone().oneshot(request).await.unwrap()
        }
    }

    pub(crate) fn app() -> TestApp {
        let transport = Arc::new(
            VirtualTransport::from_paths(["/dev/rs485-1", "/dev/rs485-2"]).unwrap(),
        );
        let ports = Arc::new(PortService::new(
            Arc::clone(&transport),
            Arc::new(EventLog::default()),
        ));
        let coordinator = Arc::new(AutomationCoordinator::new(ports, StubEngine));
        let router = crate::router::build(AppState::new(Arc::clone(&coordinator)));
        TestApp {
            router,
            transport,
            coordinator,
        }
    }

    pub(crate) fn channel(id: &str) -> ChannelId {
        ChannelId::new(id).unwrap()
    }

    pub(crate) fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    pub(crate) fn post(uri: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    pub(crate) fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub(crate) async fn json_body(response: Response<Body>) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    pub(crate) async fn expect_json(
        response: Response<Body>,
        status: StatusCode,
    ) -> serde_json::Value {
        assert_eq!(response.status(), status);
        json_body(response).await
    }
}
