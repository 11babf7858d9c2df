//! HTTP router for the broker.

use std::sync::Arc;

use axum::{Json, Router, response::IntoResponse, routing::get};
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::flow::AuthorizationFlow;

/// Create the HTTP router.
pub fn create_router(flow: Arc<AuthorizationFlow>) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .route(
            "/authorize",
            get(handlers::handle_authorize_get).post(handlers::handle_authorize_post),
        )
        .route("/callback", get(handlers::handle_callback))
        .layer(TraceLayer::new_for_http())
        .with_state(flow)
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "mcp-login-broker",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
