//! Passive WebSocket traffic observer.
//!
//! Captures the lifecycle and frames of WebSocket connections opened through
//! an intercepting connector, relays them over a bridge into a per-source
//! bounded history, and fans them out to any number of attached observers
//! with payloads classified as JSON, XML or text.

pub mod bridge;
pub mod classifier;
pub mod config;
pub mod error;
pub mod handlers;
pub mod interceptor;
pub mod models;
pub mod observer;
pub mod relay;
pub mod services;

pub use config::Config;
pub use error::AppError;
pub use handlers::http::AppState;
pub use services::{Hub, HubHandle};

use axum::routing::get;
use handlers::http;

/// Build the API router (ingest, source views, observer ws, health). Used by
/// main and by integration tests.
pub fn create_app(state: AppState) -> axum::Router {
    let source_routes = axum::Router::new()
        .route("/", get(http::list_sources))
        .route("/:source_id", axum::routing::delete(http::drop_source))
        .route(
            "/:source_id/events",
            get(http::source_events).post(http::ingest_events),
        );

    axum::Router::new()
        .route("/ws/observe", get(handlers::ws_handler))
        .route("/health", get(http::health))
        .nest("/api/sources", source_routes)
        .with_state(state)
}
