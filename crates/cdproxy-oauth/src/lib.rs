//! OAuth 2.0 client-credentials token cache for the partner API.
//!
//! # Components
//!
//! - [`client_credentials`]: the token exchange and response validation
//! - [`token_manager`]: single-slot token cache with single-flight refresh
//! - [`clock`]: injectable wall clock used for expiry decisions

pub mod client_credentials;
pub mod clock;
pub mod error;
pub mod token_manager;

pub use client_credentials::{
    ClientCredentialsConfig, DEFAULT_EXPIRES_IN_SECS, IssuedToken, basic_authorization,
    exchange_client_credentials,
};
#[cfg(any(test, feature = "testing"))]
pub use clock::ManualClock;
pub use clock::{Clock, SharedClock, SystemClock};
pub use error::{OAuthError, Result};
#[cfg(any(test, feature = "testing"))]
pub use token_manager::InMemoryTokenManager;
pub use token_manager::{
    CachedToken, ClientCredentialsTokenManager, SharedTokenManager, TokenManager,
};
