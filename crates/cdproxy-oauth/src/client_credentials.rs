//! OAuth 2.0 client-credentials exchange against the partner's authorization server.

use std::time::Duration;

use base64::{Engine, engine::general_purpose::STANDARD};
use cdproxy_config::{Credentials, MIN_REFRESH_MARGIN, RelayConfig};
use reqwest::header;
use serde::Deserialize;

use crate::error::{OAuthError, Result};

/// Grant type sent on every exchange.
pub const GRANT_TYPE: &str = "client_credentials";

/// Lifetime assumed when the authorization server omits `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECS: u64 = 300;

/// Default timeout for a single exchange request.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Upstream bodies longer than this are truncated in log lines.
const LOGGED_BODY_LIMIT: usize = 512;

/// Configuration for the client-credentials token manager.
#[derive(Debug, Clone)]
pub struct ClientCredentialsConfig {
    pub token_url: String,
    pub credentials: Credentials,
    /// Target entity id; produces `scope=target-entity:<id>` when set.
    pub target_entity: Option<String>,
    /// Tokens are refreshed this long before their stated expiry.
    pub refresh_margin: Duration,
    pub http_timeout: Duration,
}

impl ClientCredentialsConfig {
    pub fn new(token_url: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            token_url: token_url.into(),
            credentials,
            target_entity: None,
            refresh_margin: cdproxy_config::DEFAULT_REFRESH_MARGIN,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    /// Build from the process-wide relay configuration.
    pub fn from_relay(config: &RelayConfig) -> Self {
        let mut this = Self::new(config.token_url.clone(), config.credentials.clone())
            .with_refresh_margin(config.token_refresh_margin);
        this.target_entity = config.target_entity.clone();
        this
    }

    pub fn with_target_entity(mut self, target_entity: impl Into<String>) -> Self {
        self.target_entity = Some(target_entity.into());
        self
    }

    /// Set the refresh margin. Values below 5 seconds are raised to 5 seconds.
    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin.max(MIN_REFRESH_MARGIN);
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// The `scope` form parameter, if a target entity is configured.
    pub fn scope(&self) -> Option<String> {
        self.target_entity
            .as_deref()
            .map(|id| format!("target-entity:{}", id))
    }
}

/// A freshly issued access token.
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub access_token: String,
    /// Lifetime in seconds as reported (or defaulted).
    pub expires_in: u64,
}

impl std::fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedToken")
            .field("access_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Token endpoint response. Everything is optional so that a missing
/// `access_token` is reported as such rather than as a parse error.
#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<serde_json::Value>,
}

/// `Authorization: Basic base64(client_id:client_secret)`.
pub fn basic_authorization(credentials: &Credentials) -> String {
    let raw = format!("{}:{}", credentials.client_id, credentials.client_secret);
    format!("Basic {}", STANDARD.encode(raw))
}

/// Perform one client-credentials exchange.
///
/// Fails with [`OAuthError::TokenExchange`] on a non-success status, a body
/// that is not JSON, or a missing/empty `access_token`.
pub async fn exchange_client_credentials(
    client: &reqwest::Client,
    config: &ClientCredentialsConfig,
) -> Result<IssuedToken> {
    let mut form: Vec<(&str, String)> = vec![("grant_type", GRANT_TYPE.to_string())];
    if let Some(scope) = config.scope() {
        form.push(("scope", scope));
    }

    tracing::debug!(
        token_url = %config.token_url,
        scoped = config.target_entity.is_some(),
        "Requesting client-credentials token"
    );

    let response = client
        .post(&config.token_url)
        .header(header::AUTHORIZATION, basic_authorization(&config.credentials))
        .header(header::ACCEPT, "application/json")
        .form(&form)
        .send()
        .await
        .map_err(|e| OAuthError::Network(format!("Token exchange request failed: {}", e)))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| OAuthError::Network(format!("Failed to read token response: {}", e)))?;

    if !status.is_success() {
        return Err(exchange_failure(
            status.as_u16(),
            "authorization server rejected the request",
            body,
        ));
    }

    let parsed: TokenResponse = match serde_json::from_str(&body) {
        Ok(parsed) => parsed,
        Err(_) => {
            return Err(exchange_failure(
                status.as_u16(),
                "response body is not valid JSON",
                body,
            ));
        }
    };

    let access_token = match parsed.access_token {
        Some(token) if !token.is_empty() => token,
        _ => {
            return Err(exchange_failure(
                status.as_u16(),
                "response did not include an access_token",
                body,
            ));
        }
    };

    Ok(IssuedToken {
        access_token,
        expires_in: expires_in_secs(parsed.expires_in.as_ref()),
    })
}

/// Interpret `expires_in`, accepting numbers or numeric strings.
fn expires_in_secs(value: Option<&serde_json::Value>) -> u64 {
    match value {
        Some(serde_json::Value::Number(n)) => n.as_u64().unwrap_or(DEFAULT_EXPIRES_IN_SECS),
        Some(serde_json::Value::String(s)) => s.trim().parse().unwrap_or(DEFAULT_EXPIRES_IN_SECS),
        _ => DEFAULT_EXPIRES_IN_SECS,
    }
}

fn exchange_failure(status: u16, reason: &str, body: String) -> OAuthError {
    tracing::warn!(
        status,
        reason,
        body = %truncate(&body, LOGGED_BODY_LIMIT),
        "Client-credentials exchange failed"
    );
    OAuthError::TokenExchange {
        status,
        reason: reason.to_string(),
        body,
    }
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
