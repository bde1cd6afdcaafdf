//! Info Endpoint
//!
//! Returns cargo package name, cargo package version, the git hash of the repository that was used to build the binary and the operator address.
//!
//! - `/info` – general info about the deployment
//!
//! The endpoint includes a `Cache-Control: no-cache` header to prevent caching of responses.
use alloy::primitives::Address;
use axum::{
    Router,
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use tower_http::set_header::SetResponseHeaderLayer;

/// Create a router containing the info endpoint.
///
/// All endpoints have `Cache-Control: no-cache` set.
pub(crate) fn routes(operator: Address) -> Router {
    Router::new()
        .route("/info", get(info))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache"),
        ))
        .with_state(operator)
}

/// Responds with the version info and the operator address.
///
/// Returns `200 OK` with a string response.
async fn info(State(operator): State<Address>) -> impl IntoResponse {
    (
        StatusCode::OK,
        format!("{}\noperator: {operator}", crate::version_info()),
    )
}
