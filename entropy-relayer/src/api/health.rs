//! Health Check Endpoints
//!
//! - `/health` – general health check
//! - `/health/ready` – readiness check
//! - `/health/live` – liveness check
//!
//! The endpoints include a `Cache-Control: no-cache` header to prevent caching of responses.

use axum::{
    Router,
    http::{HeaderValue, StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use tower_http::set_header::SetResponseHeaderLayer;

/// Create a router containing the health endpoints.
pub(crate) fn routes() -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(ready))
        .route("/health/live", get(live))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache"),
        ))
}

/// General health check endpoint.
///
/// Returns `200 OK` with a plain `"healthy"` response as long as the server is up.
async fn health() -> impl IntoResponse {
    (StatusCode::OK, "healthy")
}

/// The router is only served after the ledger connection and the reveal
/// pipeline are set up, so answering at all means ready.
async fn ready() -> impl IntoResponse {
    (StatusCode::OK, "ready")
}

async fn live() -> impl IntoResponse {
    (StatusCode::OK, "live")
}
