//! Common test utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use tokio::sync::oneshot;
use tokio::time::timeout;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cdproxy_config::Credentials;
use cdproxy_oauth::{ClientCredentialsConfig, ClientCredentialsTokenManager};
use cdproxy_server::{INTERNAL_SECRET_HEADER, Server, ServerConfig};

/// Shared secret every test server expects.
pub const SECRET: &str = "S";

/// Token endpoint path on the mock authorization server.
pub const TOKEN_PATH: &str = "/oauth2/token";

/// A gateway running in the background against mock upstreams.
pub struct TestServer {
    /// The gateway's address.
    pub addr: SocketAddr,
    /// HTTP client for talking to the gateway.
    pub client: Client,
    /// Mock authorization server.
    pub auth: MockServer,
    /// Mock partner API.
    pub partner: MockServer,
    /// The gateway's token manager.
    pub tokens: Arc<ClientCredentialsTokenManager>,
    _shutdown: oneshot::Sender<()>,
}

impl TestServer {
    /// Start a gateway with default configuration.
    pub async fn start() -> Result<Self> {
        Self::start_with(|config| config).await
    }

    /// Start a gateway, letting the caller adjust its configuration.
    pub async fn start_with(configure: impl FnOnce(ServerConfig) -> ServerConfig) -> Result<Self> {
        let auth = MockServer::start().await;
        let partner = MockServer::start().await;

        let token_config = ClientCredentialsConfig::new(
            format!("{}{}", auth.uri(), TOKEN_PATH),
            Credentials::new("client", "secret"),
        );
        let tokens = Arc::new(ClientCredentialsTokenManager::new(token_config)?);

        let config = configure(
            ServerConfig::new(SECRET, partner.uri())
                .with_bind_address("127.0.0.1:0".parse()?)
                .with_request_logging(false),
        );

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = Server::new(config, tokens.clone())?;
        let addr = server
            .run_with_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await?;

        let client = Client::new();
        wait_for_server(&client, addr).await?;

        Ok(Self {
            addr,
            client,
            auth,
            partner,
            tokens,
            _shutdown: shutdown_tx,
        })
    }

    /// Get the base URL for the gateway.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Authenticated POST request builder.
    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}{}", self.base_url(), path))
            .header(INTERNAL_SECRET_HEADER, SECRET)
    }

    /// Authenticated GET request builder.
    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}{}", self.base_url(), path))
            .header(INTERNAL_SECRET_HEADER, SECRET)
    }

    /// Request builder without the shared secret.
    pub fn anonymous(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url(), path))
    }

    /// Make the authorization server issue `token` for `expires_in` seconds.
    pub async fn issue_token(&self, token: &str, expires_in: u64) {
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": token,
                "expires_in": expires_in,
                "token_type": "Bearer",
            })))
            .mount(&self.auth)
            .await;
    }

    /// Number of requests the authorization server has received.
    pub async fn auth_calls(&self) -> usize {
        self.auth
            .received_requests()
            .await
            .map(|r| r.len())
            .unwrap_or(0)
    }

    /// Number of requests the partner API has received.
    pub async fn partner_calls(&self) -> usize {
        self.partner
            .received_requests()
            .await
            .map(|r| r.len())
            .unwrap_or(0)
    }
}

/// Wait for the server to become ready.
async fn wait_for_server(client: &Client, addr: SocketAddr) -> Result<()> {
    let url = format!("http://{}/health", addr);

    let result = timeout(Duration::from_secs(5), async {
        loop {
            match client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => return,
                _ => tokio::time::sleep(Duration::from_millis(50)).await,
            }
        }
    })
    .await;

    match result {
        Ok(()) => Ok(()),
        Err(_) => anyhow::bail!("Timeout waiting for server to start"),
    }
}
