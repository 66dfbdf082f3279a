//! Access token cache.
//!
//! A single cached bearer token, refreshed through the client-credentials
//! exchange only when absent or inside the refresh margin. Concurrent callers
//! that miss the cache share one in-flight exchange.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::Mutex;

use crate::client_credentials::{ClientCredentialsConfig, exchange_client_credentials};
use crate::clock::{SharedClock, SystemClock};
use crate::error::{OAuthError, Result};

// ============================================================================
// TokenManager Trait
// ============================================================================

/// Trait for managing the bearer token lifecycle.
#[async_trait]
pub trait TokenManager: Send + Sync + std::fmt::Debug {
    /// Get a valid access token, exchanging credentials if necessary.
    async fn get_access_token(&self) -> Result<String>;

    /// Drop the cached token if it is still `rejected`, so the next call
    /// performs an exchange. A token stored by a later refresh is kept.
    fn invalidate(&self, rejected: &str);

    /// Expiry of the cached token in epoch milliseconds, if one is cached.
    fn cached_expiry(&self) -> Option<u64>;
}

/// Shared token manager for use across async contexts.
pub type SharedTokenManager = Arc<dyn TokenManager>;

// ============================================================================
// CachedToken
// ============================================================================

/// The single cached token slot.
#[derive(Clone, PartialEq, Eq)]
pub struct CachedToken {
    pub value: String,
    pub expires_at_ms: u64,
}

impl CachedToken {
    /// Usable at `now_ms` if it is still outside the refresh margin.
    pub fn is_fresh(&self, now_ms: u64, margin_ms: u64) -> bool {
        now_ms < self.expires_at_ms.saturating_sub(margin_ms)
    }
}

impl std::fmt::Debug for CachedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedToken")
            .field("value", &"[REDACTED]")
            .field("expires_at_ms", &self.expires_at_ms)
            .finish()
    }
}

// ============================================================================
// ClientCredentialsTokenManager
// ============================================================================

/// Production token manager backed by the partner's authorization server.
#[derive(Debug)]
pub struct ClientCredentialsTokenManager {
    config: ClientCredentialsConfig,
    http: reqwest::Client,
    clock: SharedClock,
    slot: RwLock<Option<CachedToken>>,
    /// Held for the duration of an exchange.
    refresh: Mutex<()>,
    exchanges: AtomicU64,
}

impl ClientCredentialsTokenManager {
    /// Create a manager using the system clock.
    pub fn new(config: ClientCredentialsConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| OAuthError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http,
            clock: Arc::new(SystemClock),
            slot: RwLock::new(None),
            refresh: Mutex::new(()),
            exchanges: AtomicU64::new(0),
        })
    }

    /// Replace the clock (tests use a manual clock).
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &ClientCredentialsConfig {
        &self.config
    }

    /// Number of exchanges attempted so far.
    pub fn exchange_count(&self) -> u64 {
        self.exchanges.load(Ordering::SeqCst)
    }

    fn margin_ms(&self) -> u64 {
        u64::try_from(self.config.refresh_margin.as_millis()).unwrap_or(u64::MAX)
    }

    fn fresh_token(&self) -> Option<String> {
        let now = self.clock.now_millis();
        let margin = self.margin_ms();
        self.slot
            .read()
            .as_ref()
            .filter(|cached| cached.is_fresh(now, margin))
            .map(|cached| cached.value.clone())
    }
}

#[async_trait]
impl TokenManager for ClientCredentialsTokenManager {
    async fn get_access_token(&self) -> Result<String> {
        if let Some(token) = self.fresh_token() {
            return Ok(token);
        }

        let _in_flight = self.refresh.lock().await;

        // Another caller may have refreshed while we waited.
        if let Some(token) = self.fresh_token() {
            tracing::debug!("Reusing token from concurrent refresh");
            return Ok(token);
        }

        self.exchanges.fetch_add(1, Ordering::SeqCst);
        let issued = exchange_client_credentials(&self.http, &self.config).await?;

        let lifetime_ms = issued.expires_in.saturating_mul(1000);
        if lifetime_ms <= self.margin_ms() {
            tracing::warn!(
                expires_in = issued.expires_in,
                "Token lifetime is shorter than the refresh margin; every request will refresh"
            );
        }

        let expires_at_ms = self.clock.now_millis().saturating_add(lifetime_ms);
        *self.slot.write() = Some(CachedToken {
            value: issued.access_token.clone(),
            expires_at_ms,
        });

        tracing::info!(expires_in = issued.expires_in, "Access token refreshed");
        Ok(issued.access_token)
    }

    fn invalidate(&self, rejected: &str) {
        let mut slot = self.slot.write();
        if slot.as_ref().is_some_and(|cached| cached.value == rejected) {
            *slot = None;
            tracing::info!("Cached access token invalidated");
        } else {
            tracing::debug!("Rejected token already replaced, keeping cache");
        }
    }

    fn cached_expiry(&self) -> Option<u64> {
        self.slot.read().as_ref().map(|cached| cached.expires_at_ms)
    }
}

// ============================================================================
// InMemoryTokenManager (for testing)
// ============================================================================

#[cfg(any(test, feature = "testing"))]
pub use in_memory::InMemoryTokenManager;

#[cfg(any(test, feature = "testing"))]
mod in_memory {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::TokenManager;
    use crate::error::{OAuthError, Result};

    /// Hands out a fixed token (or a fixed failure) and counts calls.
    #[derive(Debug)]
    pub struct InMemoryTokenManager {
        token: Mutex<Option<String>>,
        fail_status: Option<u16>,
        calls: AtomicU32,
        invalidations: AtomicU32,
        last_rejected: Mutex<Option<String>>,
    }

    impl InMemoryTokenManager {
        pub fn new(token: impl Into<String>) -> Self {
            Self {
                token: Mutex::new(Some(token.into())),
                fail_status: None,
                calls: AtomicU32::new(0),
                invalidations: AtomicU32::new(0),
                last_rejected: Mutex::new(None),
            }
        }

        /// Every call fails as if the authorization server returned `status`.
        pub fn failing(status: u16) -> Self {
            Self {
                token: Mutex::new(None),
                fail_status: Some(status),
                calls: AtomicU32::new(0),
                invalidations: AtomicU32::new(0),
                last_rejected: Mutex::new(None),
            }
        }

        pub fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn invalidations(&self) -> u32 {
            self.invalidations.load(Ordering::SeqCst)
        }

        /// Token passed to the most recent `invalidate` call.
        pub fn last_rejected(&self) -> Option<String> {
            self.last_rejected.lock().clone()
        }
    }

    #[async_trait]
    impl TokenManager for InMemoryTokenManager {
        async fn get_access_token(&self) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(status) = self.fail_status {
                return Err(OAuthError::TokenExchange {
                    status,
                    reason: "simulated failure".to_string(),
                    body: String::new(),
                });
            }
            self.token
                .lock()
                .clone()
                .ok_or_else(|| OAuthError::Config("No token available".to_string()))
        }

        fn invalidate(&self, rejected: &str) {
            self.invalidations.fetch_add(1, Ordering::SeqCst);
            *self.last_rejected.lock() = Some(rejected.to_string());
        }

        fn cached_expiry(&self) -> Option<u64> {
            None
        }
    }
}
