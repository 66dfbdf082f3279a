//! Application state shared across handlers.

use std::sync::Arc;

use axum::http::StatusCode;
use cdproxy_oauth::SharedTokenManager;
use tracing::warn;

use crate::config::ServerConfig;
use crate::error::Result;
use crate::upstream::{ForwardRequest, ForwardResponse, PartnerClient};

/// Application state shared across all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,

    /// Source of partner bearer tokens.
    pub tokens: SharedTokenManager,

    /// Client bound to the partner base URL.
    pub partner: PartnerClient,
}

impl AppState {
    /// Create a new application state.
    pub fn new(config: ServerConfig, tokens: SharedTokenManager) -> Result<Self> {
        let partner = PartnerClient::new(&config.partner_base_url, config.upstream_timeout)?;
        Ok(Self {
            config: Arc::new(config),
            tokens,
            partner,
        })
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Obtain a bearer token and send `request` to the partner.
    ///
    /// A partner `401` drops the cached token, unless a concurrent refresh
    /// already replaced it, so the next call exchanges a fresh one. The
    /// rejected request itself is not retried.
    pub async fn forward(&self, request: ForwardRequest) -> Result<ForwardResponse> {
        let token = self.tokens.get_access_token().await?;
        let response = self.partner.dispatch(request, &token).await?;

        if response.status == StatusCode::UNAUTHORIZED {
            warn!("Partner rejected the bearer token, invalidating cached token");
            self.tokens.invalidate(&token);
        }

        Ok(response)
    }
}
