//! Shared-secret authentication middleware.
//!
//! Every protected route requires the `x-internal-secret` header to equal the
//! configured secret. The comparison is constant time.

use axum::{
    Json,
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;

use crate::state::AppState;

/// Header carrying the shared secret.
pub const INTERNAL_SECRET_HEADER: &str = "x-internal-secret";

// ─────────────────────────────────────────────────────────────────────────────
// Auth Error
// ─────────────────────────────────────────────────────────────────────────────

/// Authentication error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// Header absent.
    MissingSecret,
    /// Header present but not valid UTF-8.
    InvalidFormat,
    /// Header does not match the configured secret.
    InvalidSecret,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingSecret => write!(f, "Missing internal secret"),
            AuthError::InvalidFormat => write!(f, "Malformed internal secret"),
            AuthError::InvalidSecret => write!(f, "Invalid internal secret"),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        // Callers get the same body regardless of the reason.
        tracing::warn!(reason = %self, "Rejected unauthenticated request");
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "unauthorized" })),
        )
            .into_response()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Security Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Compare two strings in constant time.
///
/// Differing lengths still perform a comparison before returning false.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();

    if a_bytes.len() == b_bytes.len() {
        a_bytes.ct_eq(b_bytes).into()
    } else {
        let _ = a_bytes.ct_eq(a_bytes);
        false
    }
}

/// Check the `x-internal-secret` header against `expected`.
pub fn verify_internal_secret(headers: &HeaderMap, expected: &str) -> Result<(), AuthError> {
    let value = headers
        .get(INTERNAL_SECRET_HEADER)
        .ok_or(AuthError::MissingSecret)?;
    let presented = value.to_str().map_err(|_| AuthError::InvalidFormat)?;

    if constant_time_eq(presented, expected) {
        Ok(())
    } else {
        Err(AuthError::InvalidSecret)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Middleware
// ─────────────────────────────────────────────────────────────────────────────

/// Rejects requests without the correct shared secret before any handler runs.
pub async fn internal_secret_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    verify_internal_secret(request.headers(), &state.config().shared_secret)?;
    Ok(next.run(request).await)
}
