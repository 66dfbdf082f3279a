//! Customer listing and creation.

use axum::{
    body::Bytes,
    extract::{RawQuery, State},
    http::Method,
};
use serde_json::{Map, Value};

use super::parse_object;
use crate::error::{Result, ServerError};
use crate::state::AppState;
use crate::upstream::{ForwardRequest, ForwardResponse};

/// Partner customer collection.
pub const CUSTOMERS_PATH: &str = "/v1/customers";

/// Encode JSON object fields as query parameters.
///
/// Scalars are rendered as text, arrays repeat the key per element, nulls are
/// skipped and nested objects are sent as compact JSON.
pub fn filters_to_query(filters: &Map<String, Value>) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in filters {
        match value {
            Value::Array(items) => {
                for item in items {
                    if let Some(text) = scalar_text(item) {
                        query.append_pair(key, &text);
                    }
                }
            }
            other => {
                if let Some(text) = scalar_text(other) {
                    query.append_pair(key, &text);
                }
            }
        }
    }
    query.finish()
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

/// `GET|POST /customers`
///
/// A GET forwards its query string verbatim. A POST turns its JSON object
/// into query parameters, appended after any query string it also carries.
pub async fn list_customers_handler(
    State(state): State<AppState>,
    method: Method,
    RawQuery(raw_query): RawQuery,
    body: Bytes,
) -> Result<ForwardResponse> {
    let mut query = raw_query.unwrap_or_default();

    if method == Method::POST {
        let filters = filters_to_query(&parse_object(&body)?);
        if !filters.is_empty() {
            if !query.is_empty() {
                query.push('&');
            }
            query.push_str(&filters);
        }
    }

    let request = ForwardRequest::new(Method::GET, CUSTOMERS_PATH).with_query(Some(query));
    state.forward(request).await
}

/// `POST /create-customer`
///
/// Answers with the policy error unless creation is enabled, in which case the
/// JSON body is forwarded unchanged.
pub async fn create_customer_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<ForwardResponse> {
    if !state.config.allow_customer_create {
        return Err(ServerError::CustomerCreationDisabled);
    }

    serde_json::from_slice::<Value>(&body).map_err(|e| {
        ServerError::InvalidJson(format!("Request body is not valid JSON: {}", e))
    })?;

    let request = ForwardRequest::new(Method::POST, CUSTOMERS_PATH).with_json_bytes(body);
    state.forward(request).await
}
