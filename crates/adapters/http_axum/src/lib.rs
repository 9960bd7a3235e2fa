//! # linescript-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Serve a **JSON API** for the channel registry, the send path, the
//!   automation script and its enable/disable controls
//!   (`/api/ports`, `/api/automation`, `/api/ports/{id}/automation`, …)
//! - Stream live updates as **Server-Sent Events**: automation `log`/`state`
//!   events and per-channel transport events
//! - Map HTTP requests into application calls (driving adapter)
//! - Map domain errors into HTTP status codes
//!
//! ## Dependency rule
//! Depends on `linescript-app` (for port traits and the coordinator) and
//! `linescript-domain` (for request/response types). Never leaks axum types
//! into the domain.

pub mod api;
pub mod error;
pub mod router;
pub mod state;
