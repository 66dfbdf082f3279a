//! Error types for the gateway.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use cdproxy_oauth::OAuthError;
use serde::Serialize;
use thiserror::Error;

/// Fixed message returned while customer creation is disabled.
pub const CUSTOMER_CREATION_DISABLED_MESSAGE: &str =
    "Customer creation is not available through this gateway";

/// Gateway error type.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A required request field is absent or empty.
    #[error("Missing required field '{0}'")]
    MissingField(&'static str),

    /// A field is present but cannot be used as given.
    #[error("Invalid value for field '{0}'")]
    InvalidField(&'static str),

    /// The request body could not be used as JSON.
    #[error("Invalid JSON body: {0}")]
    InvalidJson(String),

    /// Customer creation is turned off by configuration.
    #[error("Customer creation disabled")]
    CustomerCreationDisabled,

    /// No access token could be obtained from the authorization server.
    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    /// The partner API did not answer within the configured timeout.
    #[error("Upstream timeout: {0}")]
    UpstreamTimeout(String),

    /// No route matched.
    #[error("Not found")]
    NotFound,

    /// Any other failure while forwarding.
    #[error("Proxy error: {0}")]
    Proxy(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<OAuthError> for ServerError {
    fn from(e: OAuthError) -> Self {
        match e {
            OAuthError::TokenExchange { status, .. } => ServerError::TokenExchange(format!(
                "authorization server responded with status {}",
                status
            )),
            OAuthError::Network(msg) => {
                tracing::error!(error = %msg, "Authorization server unreachable");
                ServerError::TokenExchange("authorization server unreachable".to_string())
            }
            OAuthError::Config(msg) => ServerError::Config(msg),
        }
    }
}

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub error: &'static str,
    /// Name of the offending field, for field errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<&'static str>,
    /// Human-readable error message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ServerError {
    /// HTTP status and error code for this error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ServerError::MissingField(_) => (StatusCode::BAD_REQUEST, "missing_field"),
            ServerError::InvalidField(_) => (StatusCode::BAD_REQUEST, "invalid_field"),
            ServerError::InvalidJson(_) => (StatusCode::BAD_REQUEST, "invalid_json"),
            ServerError::CustomerCreationDisabled => {
                (StatusCode::BAD_REQUEST, "customer_creation_disabled")
            }
            ServerError::TokenExchange(_) => (StatusCode::BAD_GATEWAY, "token_exchange_failed"),
            ServerError::UpstreamTimeout(_) => (StatusCode::BAD_GATEWAY, "upstream_timeout"),
            ServerError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
            ServerError::Proxy(_) | ServerError::Config(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "proxy_error")
            }
        }
    }

    fn body(&self, code: &'static str) -> ErrorResponse {
        let (field, message) = match self {
            ServerError::MissingField(field) => {
                (Some(*field), Some(format!("{} is required", field)))
            }
            ServerError::InvalidField(field) => (
                Some(*field),
                Some(format!("{} must be a single path segment", field)),
            ),
            ServerError::InvalidJson(msg) => (None, Some(msg.clone())),
            ServerError::CustomerCreationDisabled => {
                (None, Some(CUSTOMER_CREATION_DISABLED_MESSAGE.to_string()))
            }
            ServerError::TokenExchange(msg) => (None, Some(msg.clone())),
            ServerError::UpstreamTimeout(_) => (
                None,
                Some("The partner API did not respond in time".to_string()),
            ),
            ServerError::NotFound => (None, None),
            // Internal detail stays in the logs.
            ServerError::Proxy(_) | ServerError::Config(_) => {
                (None, Some("The request could not be forwarded".to_string()))
            }
        };

        ErrorResponse {
            error: code,
            field,
            message,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(status = %status, code, error = %message, "Server error");
        } else {
            tracing::warn!(status = %status, code, error = %message, "Client error");
        }

        (status, Json(self.body(code))).into_response()
    }
}
