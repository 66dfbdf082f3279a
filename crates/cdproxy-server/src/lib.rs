//! Forwarding gateway for the cdproxy relay.
//!
//! Exposes a small set of internal routes, authenticates each caller with a
//! shared secret, attaches a cached partner bearer token and relays the
//! partner API's answer unchanged.
//!
//! # Features
//!
//! - Shared-secret authentication (`x-internal-secret`)
//! - Fixed partner routes plus an optional `/papi/*` passthrough
//! - Policy gate for customer creation
//! - Request logging with per-request ids
//!
//! # Example
//!
//! ```ignore
//! use cdproxy_server::{Server, ServerConfig};
//!
//! let config = ServerConfig::new("shared-secret", "https://papi.example.com")
//!     .with_bind_address("127.0.0.1:10000".parse()?);
//!
//! let server = Server::new(config, token_manager)?;
//! server.run(shutdown_signal()).await?;
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod routes;
pub mod state;
pub mod upstream;

pub use auth::{AuthError, INTERNAL_SECRET_HEADER, internal_secret_middleware};
pub use config::ServerConfig;
pub use error::{CUSTOMER_CREATION_DISABLED_MESSAGE, Result, ServerError};
pub use logging::{REQUEST_ID_HEADER, request_logging_middleware};
pub use state::AppState;
pub use upstream::{ForwardRequest, ForwardResponse, PartnerClient};

use std::future::Future;
use std::net::SocketAddr;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{any, get, post},
};
use cdproxy_oauth::SharedTokenManager;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// The cdproxy HTTP server.
pub struct Server {
    /// Application state.
    state: AppState,
}

impl Server {
    /// Create a new server with the given configuration and token source.
    pub fn new(config: ServerConfig, tokens: SharedTokenManager) -> Result<Self> {
        Ok(Self {
            state: AppState::new(config, tokens)?,
        })
    }

    /// Create a server from a pre-built application state.
    pub fn from_state(state: AppState) -> Self {
        Self { state }
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        Router::new()
            // Health routes (no auth required)
            .merge(routes::health_routes())
            .merge(self.protected_routes())
            .fallback(routes::not_found)
            .layer(DefaultBodyLimit::max(self.state.config.max_body_size))
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                logging::request_logging_middleware,
            ))
            // TraceLayer for detailed HTTP tracing
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Routes that require the shared secret.
    fn protected_routes(&self) -> Router<AppState> {
        let mut router = Router::new()
            .route("/get-credit-score", post(routes::credit_score_handler))
            .route(
                "/customers",
                get(routes::list_customers_handler).post(routes::list_customers_handler),
            )
            .route("/create-customer", post(routes::create_customer_handler))
            .route("/login-as", post(routes::login_as_handler));

        if self.state.config.enable_passthrough {
            router = router.route("/papi/{*path}", any(routes::passthrough_handler));
        }

        // route_layer keeps unmatched paths answering 404 rather than 401.
        router.route_layer(middleware::from_fn_with_state(
            self.state.clone(),
            auth::internal_secret_middleware,
        ))
    }

    /// Run the server until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.state.config.bind_address;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Config(format!("Failed to bind {}: {}", addr, e)))?;

        self.serve(listener, shutdown).await
    }

    /// Bind, spawn the server in the background and return the bound address.
    ///
    /// Port `0` picks an ephemeral port, which is what tests use.
    pub async fn run_with_shutdown<F>(self, shutdown: F) -> Result<SocketAddr>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.state.config.bind_address;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Config(format!("Failed to bind {}: {}", addr, e)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::Config(format!("Failed to read local address: {}", e)))?;

        tokio::spawn(async move {
            if let Err(e) = self.serve(listener, shutdown).await {
                tracing::error!(error = %e, "Server terminated");
            }
        });

        Ok(local_addr)
    }

    async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = self.router();
        if let Ok(addr) = listener.local_addr() {
            info!(
                addr = %addr,
                passthrough = self.state.config.enable_passthrough,
                customer_create = self.state.config.allow_customer_create,
                "Starting cdproxy server"
            );
        }

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Proxy(format!("Server error: {}", e)))?;

        info!("Server stopped");
        Ok(())
    }

    /// Get the configured bind address.
    pub fn bind_address(&self) -> SocketAddr {
        self.state.config.bind_address
    }
}
