//! HTTP/WebSocket control plane for iceOS: blueprint submission, run
//! dispatch and polling, a Server-Sent Events run log, draft authoring,
//! and the builder proposal surface.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod error;
pub mod routes;
pub mod state;
pub mod ws;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use error::McpError;
pub use state::AppState;

/// Build the full MCP router: every route from `/api/v1/mcp`,
/// `/api/v1/drafts`, `/api/v1/builder`, and `/ws/mcp/`, behind the bearer
/// auth layer.
#[must_use]
pub fn build_router(state: AppState) -> Router {
    let mcp_and_drafts = Router::new()
        .route("/api/v1/mcp/blueprints", post(routes::blueprints::accept_blueprint))
        .route("/api/v1/mcp/runs", post(routes::runs::start_run))
        .route("/api/v1/mcp/runs/{run_id}", get(routes::runs::get_run))
        .route(
            "/api/v1/mcp/runs/{run_id}/events",
            get(routes::runs::stream_run_events),
        )
        .route(
            "/api/v1/drafts/{session_id}",
            post(routes::drafts::create_or_get_draft).get(routes::drafts::get_draft),
        )
        .route("/api/v1/drafts/{session_id}/lock", post(routes::drafts::lock_node))
        .route(
            "/api/v1/drafts/{session_id}/position",
            post(routes::drafts::update_position),
        )
        .route(
            "/api/v1/drafts/{session_id}/instantiate",
            post(routes::drafts::instantiate_node),
        )
        .route("/api/v1/builder/suggest", post(routes::builder::suggest))
        .route("/api/v1/builder/propose", post(routes::builder::propose))
        .route("/api/v1/builder/apply", post(routes::builder::apply))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_bearer_token));

    Router::new()
        .route("/ws/mcp/", get(ws::upgrade))
        .merge(mcp_and_drafts)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
