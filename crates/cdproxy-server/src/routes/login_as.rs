//! One-time login code for agent impersonation.

use axum::{body::Bytes, extract::State, http::Method};
use serde_json::Value;

use super::{parse_object, path_segment, required_field};
use crate::error::Result;
use crate::state::AppState;
use crate::upstream::{ForwardRequest, ForwardResponse, encode_segment};

/// Partner path issuing a login-as code for a customer.
pub fn login_as_path(customer_token: &str) -> String {
    format!(
        "/v1/customers/{}/otcs/login-as",
        encode_segment(customer_token)
    )
}

/// `POST /login-as`
///
/// Requires `customerToken` and `agentId`. Every field except
/// `customerToken` is forwarded as the partner request body.
pub async fn login_as_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<ForwardResponse> {
    let mut payload = parse_object(&body)?;
    let customer_token = path_segment(
        "customerToken",
        required_field(&payload, "customerToken")?,
    )?;
    required_field(&payload, "agentId")?;

    payload.remove("customerToken");

    let request = ForwardRequest::new(Method::POST, login_as_path(&customer_token))
        .with_json(&Value::Object(payload));
    state.forward(request).await
}
