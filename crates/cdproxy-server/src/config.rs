//! Server configuration.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use cdproxy_config::RelayConfig;

/// Default max body size for inbound requests (10 MB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Default timeout for forwarded partner calls.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = cdproxy_config::DEFAULT_UPSTREAM_TIMEOUT;

/// Gateway configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Address to bind the server to.
    pub bind_address: SocketAddr,

    /// Value expected in the `x-internal-secret` header.
    pub shared_secret: String,

    /// Partner API base URL, no trailing slash.
    pub partner_base_url: String,

    /// Timeout applied to each forwarded partner call.
    pub upstream_timeout: Duration,

    /// Forward `/create-customer` instead of answering with the policy error.
    pub allow_customer_create: bool,

    /// Mount the generic `/papi/*` passthrough route.
    pub enable_passthrough: bool,

    /// Enable request logging.
    pub request_logging: bool,

    /// Maximum inbound request body size in bytes.
    pub max_body_size: usize,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_address", &self.bind_address)
            .field("shared_secret", &"[REDACTED]")
            .field("partner_base_url", &self.partner_base_url)
            .field("upstream_timeout", &self.upstream_timeout)
            .field("allow_customer_create", &self.allow_customer_create)
            .field("enable_passthrough", &self.enable_passthrough)
            .field("request_logging", &self.request_logging)
            .field("max_body_size", &self.max_body_size)
            .finish()
    }
}

impl ServerConfig {
    /// Create a config with the given secret and partner base URL.
    pub fn new(shared_secret: impl Into<String>, partner_base_url: impl Into<String>) -> Self {
        Self {
            bind_address: SocketAddr::from((Ipv4Addr::LOCALHOST, cdproxy_config::DEFAULT_PORT)),
            shared_secret: shared_secret.into(),
            partner_base_url: partner_base_url.into().trim_end_matches('/').to_string(),
            upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT,
            allow_customer_create: false,
            enable_passthrough: false,
            request_logging: true,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }

    /// Derive the server config from the relay configuration.
    ///
    /// Binds all interfaces on the configured port.
    pub fn from_relay(relay: &RelayConfig) -> Self {
        Self::new(relay.shared_secret.clone(), relay.partner_base_url.clone())
            .with_bind_address(SocketAddr::from((Ipv4Addr::UNSPECIFIED, relay.port)))
            .with_upstream_timeout(relay.upstream_timeout)
            .with_customer_creation(relay.allow_customer_create)
            .with_passthrough(relay.enable_passthrough)
    }

    /// Set the bind address.
    pub fn with_bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = addr;
        self
    }

    pub fn with_upstream_timeout(mut self, timeout: Duration) -> Self {
        self.upstream_timeout = timeout;
        self
    }

    pub fn with_customer_creation(mut self, enabled: bool) -> Self {
        self.allow_customer_create = enabled;
        self
    }

    pub fn with_passthrough(mut self, enabled: bool) -> Self {
        self.enable_passthrough = enabled;
        self
    }

    /// Enable or disable request logging.
    pub fn with_request_logging(mut self, enabled: bool) -> Self {
        self.request_logging = enabled;
        self
    }

    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }
}
