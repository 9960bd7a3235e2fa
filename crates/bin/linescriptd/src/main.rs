//! # linescriptd: linescript daemon
//!
//! Composition root that wires all adapters together and starts the server.
//!
//! ## Responsibilities
//! - Parse configuration (env vars, config file)
//! - Install the `tracing` subscriber
//! - Construct the channel transport and the script engine (adapters)
//! - Construct the event log, port service and automation coordinator,
//!   injecting the adapters via port traits
//! - Build the axum router, injecting the coordinator
//! - Bind to a TCP port and serve
//! - Handle graceful shutdown (SIGTERM/SIGINT): disable automation, close
//!   every open channel
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; no domain logic belongs here.

mod config;

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use linescript_adapter_http_axum::state::AppState;
use linescript_adapter_script_lua::{LuaEngineConfig, LuaScriptEngine};
use linescript_adapter_virtual::VirtualTransport;
use linescript_app::automation_coordinator::AutomationCoordinator;
use linescript_app::event_log::EventLog;
use linescript_app::services::PortService;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("loading linescript.toml")?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    // Adapters
    let transport = Arc::new(
        VirtualTransport::from_paths(config.channels.paths.iter().cloned())
            .context("registering channels")?,
    );
    let engine = LuaScriptEngine::new(LuaEngineConfig {
        timeout: config.script_timeout(),
    });

    // Services
    let log = Arc::new(EventLog::new(config.automation.log_capacity));
    let ports = Arc::new(PortService::new(Arc::clone(&transport), log));
    let coordinator = Arc::new(
        AutomationCoordinator::new(ports, engine).with_channel_config(config.channel_config()),
    );

    // HTTP
    let state = AppState::new(Arc::clone(&coordinator)).with_heartbeat(config.heartbeat());
    let app = linescript_adapter_http_axum::router::build(state);

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {bind_addr}"))?;
    tracing::info!(
        %bind_addr,
        channels = config.channels.paths.len(),
        "linescriptd listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    coordinator.shutdown().await;
    transport.close_all();
    tracing::info!("linescriptd stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
