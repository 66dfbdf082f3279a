//! Gateway routes.

pub mod credit_score;
pub mod customers;
pub mod health;
pub mod login_as;
pub mod passthrough;

pub use credit_score::credit_score_handler;
pub use customers::{create_customer_handler, list_customers_handler};
pub use health::{HealthResponse, health_routes};
pub use login_as::login_as_handler;
pub use passthrough::passthrough_handler;

use axum::body::Bytes;
use serde_json::{Map, Value};

use crate::error::{Result, ServerError};

/// Fallback for unmatched routes.
pub async fn not_found() -> ServerError {
    ServerError::NotFound
}

/// Parse a request body that must be a JSON object.
///
/// An empty body is treated as `{}`.
pub(crate) fn parse_object(body: &Bytes) -> Result<Map<String, Value>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }

    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ServerError::InvalidJson(
            "Request body must be a JSON object".to_string(),
        )),
        Err(e) => Err(ServerError::InvalidJson(format!(
            "Request body is not valid JSON: {}",
            e
        ))),
    }
}

/// Read a required scalar field as a non-empty string.
///
/// Numbers are accepted and rendered in their JSON form.
pub(crate) fn required_field(map: &Map<String, Value>, field: &'static str) -> Result<String> {
    optional_field(map, field).ok_or(ServerError::MissingField(field))
}

/// Accept `value` only if it can stand as one path segment.
///
/// `.` and `..` are rejected: URL normalization would resolve them and move
/// the partner call to a different endpoint, percent-encoded or not.
pub(crate) fn path_segment(field: &'static str, value: String) -> Result<String> {
    if value == "." || value == ".." {
        return Err(ServerError::InvalidField(field));
    }
    Ok(value)
}

pub(crate) fn optional_field(map: &Map<String, Value>, field: &str) -> Option<String> {
    match map.get(field)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
