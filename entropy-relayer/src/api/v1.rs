//! Version 1 (v1) API Routes
//!
//! This module defines the v1 API routes of the relayer.
//! Currently, all endpoints are unauthenticated.
//! # Endpoints
//!
//! - `POST /commit` – Draws an operator seed and returns the signed commitment for the requester.

use alloy::primitives::Address;
use axum::{Json, Router, extract::State, routing::post};
use entropy_types::api::v1::{CommitRequest, CommitResponse};
use tracing::instrument;

use crate::{api::errors::ApiErrors, services::commit_signer::CommitSigner};

/// Handles `POST /commit`.
///
/// The operator seed is stored before the response is sent, so the reveal
/// pipeline can pick up the commitment as soon as the requester submits it.
#[instrument(level = "debug", skip_all, fields(owner = %request.owner))]
async fn commit(
    State(commit_signer): State<CommitSigner>,
    Json(request): Json<CommitRequest>,
) -> Result<Json<CommitResponse>, ApiErrors> {
    tracing::debug!("received commit request: {request:?}");
    if request.owner == Address::ZERO {
        return Err(ApiErrors::BadRequest("owner must not be the zero address".to_owned()));
    }
    let response = commit_signer
        .sign_commit(request.owner, request.user_seed_hash)
        .await?;
    tracing::debug!("signed commit {}", response.commit_id);
    Ok(Json(response))
}

/// Builds the router for the v1 endpoints.
pub(crate) fn routes(commit_signer: CommitSigner) -> Router {
    Router::new()
        .route("/commit", post(commit))
        .with_state(commit_signer)
}
