//! API module for the entropy relayer.
//!
//! This module defines all HTTP endpoints of the relayer and organizes them into submodules:
//!
//! - [`errors`] – Defines API error types and conversions from internal service errors.
//! - [`health`] – Provides the health endpoint (`/health`).
//! - [`info`] – Info about the service (`/info`).
//! - [`v1`] – Version 1 of the commit endpoint (`/api/v1/commit`).

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::services::commit_signer::CommitSigner;

pub(crate) mod errors;
pub(crate) mod health;
pub(crate) mod info;
pub(crate) mod v1;

/// Builds the main API router for the relayer.
///
/// This function sets up:
///
/// - The `/api/v1/commit` endpoint from [`v1`].
/// - The health endpoint from [`health`].
/// - General info about the deployment from [`info`].
/// - An HTTP trace layer via [`TraceLayer`].
pub fn routes(commit_signer: CommitSigner) -> Router {
    let operator = commit_signer.operator();
    Router::new()
        .nest("/api/v1", v1::routes(commit_signer))
        .merge(health::routes())
        .merge(info::routes(operator))
        .layer(TraceLayer::new_for_http())
}
