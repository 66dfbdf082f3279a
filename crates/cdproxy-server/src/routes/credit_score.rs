//! Credit score lookup.

use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::Method,
};

use super::{optional_field, parse_object, path_segment};
use crate::error::{Result, ServerError};
use crate::state::AppState;
use crate::upstream::{ForwardRequest, ForwardResponse, encode_segment};

/// Partner path for a customer's credit scores.
pub fn credit_scores_path(customer_token: &str) -> String {
    format!(
        "/v1/customers/{}/credit-scores",
        encode_segment(customer_token)
    )
}

/// `POST /get-credit-score`
///
/// `customerToken` comes from the JSON body, falling back to the query string.
pub async fn credit_score_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    body: Bytes,
) -> Result<ForwardResponse> {
    let payload = parse_object(&body)?;
    let customer_token = optional_field(&payload, "customerToken")
        .or_else(|| {
            params
                .get("customerToken")
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
        })
        .ok_or(ServerError::MissingField("customerToken"))?;
    let customer_token = path_segment("customerToken", customer_token)?;

    let request = ForwardRequest::new(Method::GET, credit_scores_path(&customer_token));
    state.forward(request).await
}
