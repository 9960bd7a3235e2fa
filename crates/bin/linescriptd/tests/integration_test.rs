//! End-to-end smoke tests for the full linescriptd stack.
//!
//! Each test wires the real adapters (virtual transport, Lua engine, axum
//! router) around a real coordinator and exercises the HTTP layer via
//! `tower::ServiceExt::oneshot`; no TCP port is bound.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use linescript_adapter_http_axum::router;
use linescript_adapter_http_axum::state::AppState;
use linescript_adapter_script_lua::{LuaEngineConfig, LuaScriptEngine};
use linescript_adapter_virtual::VirtualTransport;
use linescript_app::automation_coordinator::AutomationCoordinator;
use linescript_app::event_log::EventLog;
use linescript_app::services::PortService;
use linescript_domain::id::ChannelId;
use tower::ServiceExt;

type Coordinator = AutomationCoordinator<VirtualTransport, LuaScriptEngine>;

struct Stack {
    app: axum::Router,
    transport: Arc<VirtualTransport>,
    coordinator: Arc<Coordinator>,
}

/// Build a fully-wired router over two simulated lines.
fn stack() -> Stack {
    let transport = Arc::new(
        VirtualTransport::from_paths(["/dev/rs485-1", "/dev/rs485-2"])
            .expect("channel paths should be valid"),
    );
    let ports = Arc::new(PortService::new(
        Arc::clone(&transport),
        Arc::new(EventLog::new(200)),
    ));
    let engine = LuaScriptEngine::new(LuaEngineConfig {
        timeout: Duration::from_millis(200),
    });
    let coordinator = Arc::new(AutomationCoordinator::new(ports, engine));
    let app = router::build(AppState::new(Arc::clone(&coordinator)));
    Stack {
        app,
        transport,
        coordinator,
    }
}

fn rs485_1() -> ChannelId {
    ChannelId::new("rs485-1").unwrap()
}

async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<&str>,
) -> (StatusCode, serde_json::Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if body.is_some() {
        request = request.header("content-type", "application/json");
    }
    let resp = app
        .clone()
        .oneshot(
            request
                .body(body.map_or_else(Body::empty, |json| Body::from(json.to_string())))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// Poll until `check` holds or a second has passed.
async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_return_ok_when_health_check_called() {
    let resp = stack()
        .app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
}

// ---------------------------------------------------------------------------
// Automation: script → enable → inbound line → reply
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread")]
async fn should_reply_to_inbound_line_when_lua_script_enabled() {
    let stack = stack();

    let (status, state) = send(
        &stack.app,
        "POST",
        "/api/automation/script",
        Some(r#"{"script":"if receive.getString() == 'ping' then send.write('pong') end"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state["last_error"], serde_json::Value::Null);

    let (status, state) = send(
        &stack.app,
        "POST",
        "/api/ports/rs485-1/automation/enable",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state["active_channel_id"], "rs485-1");

    stack.transport.inject_line(&rs485_1(), b"ping".to_vec()).unwrap();

    let transport = Arc::clone(&stack.transport);
    assert!(eventually(|| transport.written(&rs485_1()).unwrap() == [b"pong".to_vec()]).await);

    let (_, snapshot) = send(
        &stack.app,
        "GET",
        "/api/ports/rs485-1/automation/state",
        None,
    )
    .await;
    let messages: Vec<&str> = snapshot["logs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["message"].as_str().unwrap())
        .collect();
    assert_eq!(messages, ["Automation enabled on rs485-1", "pong"]);

    stack.coordinator.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn should_record_timeout_and_keep_running_when_script_spins() {
    let stack = stack();
    send(
        &stack.app,
        "POST",
        "/api/automation/script",
        Some(r#"{"script":"while true do end"}"#),
    )
    .await;
    send(&stack.app, "POST", "/api/ports/rs485-1/automation/enable", None).await;

    stack.transport.inject_line(&rs485_1(), b"x".to_vec()).unwrap();

    let coordinator = Arc::clone(&stack.coordinator);
    let timed_out = || coordinator.state().last_error.as_deref() == Some("Script timeout");
    assert!(eventually(timed_out).await);
    assert!(stack.coordinator.state().enabled);

    stack.coordinator.shutdown().await;
}

#[tokio::test]
async fn should_surface_compile_error_without_failing_request() {
    let stack = stack();

    let (status, state) = send(
        &stack.app,
        "POST",
        "/api/automation/script",
        Some(r#"{"script":"this is not lua"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(state["last_error"].as_str().unwrap().starts_with("automation:1:"));
}

// ---------------------------------------------------------------------------
// Send path and exclusivity
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_write_text_after_opening_port() {
    let stack = stack();

    let (status, _) = send(&stack.app, "POST", "/api/ports/rs485-2/open", Some("{}")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(
        &stack.app,
        "POST",
        "/api/ports/rs485-2/write",
        Some(r#"{"data":"AT\r\n"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let written = stack
        .transport
        .written(&ChannelId::new("rs485-2").unwrap())
        .unwrap();
    assert_eq!(written, vec![b"AT\r\n".to_vec()]);
}

#[tokio::test(flavor = "multi_thread")]
async fn should_keep_single_binding_when_second_channel_enabled() {
    let stack = stack();
    send(&stack.app, "POST", "/api/ports/rs485-1/automation/enable", None).await;

    let (status, body) = send(
        &stack.app,
        "POST",
        "/api/ports/rs485-2/automation/enable",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "automation already enabled on rs485-1");

    let (status, _) = send(
        &stack.app,
        "POST",
        "/api/ports/rs485-2/receive/write",
        Some(r#"{"message":"hello"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    stack.coordinator.shutdown().await;
    assert!(!stack.coordinator.state().enabled);
}
