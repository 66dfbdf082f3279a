//! Error types for the token manager.

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, OAuthError>;

/// Errors that can occur while obtaining an access token.
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    /// The exchange request never produced a response (connect, TLS, timeout).
    #[error("Network error: {0}")]
    Network(String),

    /// The authorization server answered, but not with a usable token.
    ///
    /// `body` holds the raw upstream response for server-side diagnostics.
    #[error("Token exchange failed (status {status}): {reason}")]
    TokenExchange {
        status: u16,
        reason: String,
        body: String,
    },

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),
}

impl OAuthError {
    /// Upstream HTTP status, when the authorization server responded.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            OAuthError::TokenExchange { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Raw upstream body, when the authorization server responded.
    pub fn upstream_body(&self) -> Option<&str> {
        match self {
            OAuthError::TokenExchange { body, .. } => Some(body),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for OAuthError {
    fn from(e: reqwest::Error) -> Self {
        OAuthError::Network(e.to_string())
    }
}
