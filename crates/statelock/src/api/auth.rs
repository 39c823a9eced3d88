//! Optional shared-key authentication

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::AppState;
use crate::api::error::ApiError;
use crate::error::{Result, StateLockError};

/// Header carrying the API key
pub const API_KEY_HEADER: &str = "x-statelock-api-key";

/// Check the request headers against the configured key.
///
/// A no-op unless `auth_required` is set. Requiring auth without a
/// configured key rejects every request.
pub fn check_api_key(auth_required: bool, expected: &str, headers: &HeaderMap) -> Result<()> {
    if !auth_required {
        return Ok(());
    }

    let expected = expected.trim();
    if expected.is_empty() {
        return Err(StateLockError::Unauthorized(
            "auth_required is set but no API key is configured".to_string(),
        ));
    }

    let supplied = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim);

    match supplied {
        Some(key) if keys_match(key.as_bytes(), expected.as_bytes()) => Ok(()),
        _ => Err(StateLockError::Unauthorized(
            "Missing or invalid X-Statelock-Api-Key".to_string(),
        )),
    }
}

/// Constant-time comparison for equal-length keys
fn keys_match(supplied: &[u8], expected: &[u8]) -> bool {
    if supplied.len() != expected.len() {
        return false;
    }
    supplied
        .iter()
        .zip(expected)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

/// Middleware guarding every route it wraps
pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    match check_api_key(
        state.server.auth_required,
        &state.server.api_key,
        request.headers(),
    ) {
        Ok(()) => next.run(request).await,
        Err(e) => ApiError(e).into_response(),
    }
}
