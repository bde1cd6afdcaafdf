use axum::{http::StatusCode, response::IntoResponse};
use eyre::Report;
use uuid::Uuid;

use crate::services::commit_signer::CommitSignerError;

#[derive(Debug, thiserror::Error)]
pub(crate) enum ApiErrors {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error(transparent)]
    InternalServerError(#[from] eyre::Report),
}

impl From<CommitSignerError> for ApiErrors {
    fn from(value: CommitSignerError) -> Self {
        tracing::debug!("{value:?}");
        ApiErrors::InternalServerError(Report::new(value))
    }
}

impl IntoResponse for ApiErrors {
    fn into_response(self) -> axum::response::Response {
        match self {
            ApiErrors::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            ApiErrors::InternalServerError(inner) => {
                handle_internal_server_error(inner).into_response()
            }
        }
    }
}

fn handle_internal_server_error(err: Report) -> (StatusCode, String) {
    let error_id = Uuid::new_v4();
    tracing::error!("{error_id} - {err:?}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("An internal server error has occurred. Error ID={error_id}"),
    )
}
