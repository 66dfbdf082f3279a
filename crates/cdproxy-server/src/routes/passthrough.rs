//! Generic partner API passthrough.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, Uri},
};

use crate::error::{Result, ServerError};
use crate::state::AppState;
use crate::upstream::{ForwardRequest, ForwardResponse, sanitize_headers};

/// Prefix under which partner paths are exposed.
pub const PASSTHROUGH_PREFIX: &str = "/papi";

/// `ANY /papi/{*path}`
///
/// Forwards method, path, query, safe headers and body to the same path on the
/// partner API. The raw request path is used so percent-encoding survives.
pub async fn passthrough_handler(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<ForwardResponse> {
    let path = uri
        .path()
        .strip_prefix(PASSTHROUGH_PREFIX)
        .filter(|p| p.starts_with('/'))
        .ok_or(ServerError::NotFound)?;

    let request = ForwardRequest::new(method, path)
        .with_query(uri.query().map(str::to_string))
        .with_headers(sanitize_headers(&headers))
        .with_body(body);
    state.forward(request).await
}
