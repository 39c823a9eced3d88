//! Mapping of engine errors onto HTTP responses

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{ErrorKind, StateLockError};

/// Error returned by every handler
#[derive(Debug)]
pub struct ApiError(pub StateLockError);

impl From<StateLockError> for ApiError {
    fn from(e: StateLockError) -> Self {
        ApiError(e)
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

pub(crate) fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let status = status_for(kind);

        let message = match kind {
            // internal detail stays in the log, keyed by a correlation id
            ErrorKind::Internal => {
                let correlation_id = Uuid::new_v4();
                tracing::error!(%correlation_id, error = %self.0, "Internal error");
                format!("Internal service error (correlation id {correlation_id})")
            }
            ErrorKind::Unavailable => {
                tracing::warn!(error = %self.0, "Dependency unavailable");
                self.0.to_string()
            }
            _ => self.0.to_string(),
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: kind.code(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}
