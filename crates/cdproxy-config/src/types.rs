//! The typed relay configuration.

use std::fmt;
use std::time::Duration;

use crate::env::{EnvSource, ProcessEnv};
use crate::error::{ConfigError, MissingField, Result};
use crate::resolver::{ResolvedValue, first_non_empty, first_non_empty_or};

// ─────────────────────────────────────────────────────────────────────────────
// Variable names (precedence order)
// ─────────────────────────────────────────────────────────────────────────────

pub const CLIENT_ID_VARS: &[&str] = &[
    "CD_CLIENT_ID",
    "CONSUMER_DIRECT_CLIENT_ID",
    "CONSUMER_DIRECT_API_KEY",
];
pub const CLIENT_SECRET_VARS: &[&str] = &[
    "CD_CLIENT_SECRET",
    "CONSUMER_DIRECT_CLIENT_SECRET",
    "CONSUMER_DIRECT_API_SECRET",
];
pub const BASE_URL_VARS: &[&str] = &["CD_BASE_URL", "CONSUMER_DIRECT_BASE_URL"];
pub const TOKEN_URL_VARS: &[&str] = &["CONSUMER_DIRECT_TOKEN_URL"];
pub const TARGET_ENTITY_VARS: &[&str] = &["CONSUMER_DIRECT_TARGET_ENTITY"];
pub const SHARED_SECRET_VARS: &[&str] =
    &["INTERNAL_SHARED_SECRET", "CD_PROXY_INTERNAL_SHARED_SECRET"];
pub const PORT_VARS: &[&str] = &["PORT"];
pub const REFRESH_MARGIN_VARS: &[&str] = &["CDPROXY_TOKEN_REFRESH_MARGIN_SECS"];
pub const UPSTREAM_TIMEOUT_VARS: &[&str] = &["CDPROXY_UPSTREAM_TIMEOUT_SECS"];
pub const ALLOW_CUSTOMER_CREATE_VARS: &[&str] = &["CDPROXY_ALLOW_CUSTOMER_CREATE"];
pub const ENABLE_PASSTHROUGH_VARS: &[&str] = &["CDPROXY_ENABLE_PASSTHROUGH"];

// ─────────────────────────────────────────────────────────────────────────────
// Defaults
// ─────────────────────────────────────────────────────────────────────────────

pub const DEFAULT_BASE_URL: &str = "https://papi.consumerdirect.io";
pub const DEFAULT_TOKEN_URL: &str = "https://auth.consumerdirect.io/oauth2/token";
pub const DEFAULT_PORT: u16 = 10000;
pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(30);
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Tokens must never be served closer than this to their expiry.
pub const MIN_REFRESH_MARGIN: Duration = Duration::from_secs(5);

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// OAuth client credentials for the partner's authorization server.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl Credentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Complete relay configuration, resolved once at startup.
#[derive(Clone)]
pub struct RelayConfig {
    pub credentials: Credentials,
    /// Partner API base URL without trailing slashes.
    pub partner_base_url: String,
    /// OAuth2 token endpoint.
    pub token_url: String,
    /// Target entity id used for the `scope` parameter, if any.
    pub target_entity: Option<String>,
    /// Secret expected in `x-internal-secret`.
    pub shared_secret: String,
    pub port: u16,
    pub token_refresh_margin: Duration,
    pub upstream_timeout: Duration,
    pub allow_customer_create: bool,
    pub enable_passthrough: bool,
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("credentials", &self.credentials)
            .field("partner_base_url", &self.partner_base_url)
            .field("token_url", &self.token_url)
            .field("target_entity", &self.target_entity)
            .field("shared_secret", &"[REDACTED]")
            .field("port", &self.port)
            .field("token_refresh_margin", &self.token_refresh_margin)
            .field("upstream_timeout", &self.upstream_timeout)
            .field("allow_customer_create", &self.allow_customer_create)
            .field("enable_passthrough", &self.enable_passthrough)
            .finish()
    }
}

impl RelayConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_source(&ProcessEnv)
    }

    /// Load from an arbitrary environment source.
    ///
    /// Every missing required field is reported in a single
    /// [`ConfigError::MissingRequired`].
    pub fn from_source<E: EnvSource + ?Sized>(env: &E) -> Result<Self> {
        let mut missing = Vec::new();
        let mut required = |name: &'static str, aliases: &'static [&'static str]| {
            let resolved = first_non_empty(env, aliases);
            if resolved.is_none() {
                missing.push(MissingField { name, aliases });
            }
            resolved
        };

        let client_id = required("client_id", CLIENT_ID_VARS);
        let client_secret = required("client_secret", CLIENT_SECRET_VARS);
        let shared_secret = required("shared_secret", SHARED_SECRET_VARS);

        let (Some(client_id), Some(client_secret), Some(shared_secret)) =
            (client_id, client_secret, shared_secret)
        else {
            return Err(ConfigError::MissingRequired(missing));
        };

        let base_url = first_non_empty_or(env, BASE_URL_VARS, DEFAULT_BASE_URL);
        let token_url = first_non_empty_or(env, TOKEN_URL_VARS, DEFAULT_TOKEN_URL);
        let partner_base_url = validate_url(&base_url)?
            .trim_end_matches('/')
            .to_string();
        let token_url = validate_url(&token_url)?.to_string();

        let target_entity = first_non_empty(env, TARGET_ENTITY_VARS).map(|v| v.value);

        let port = match first_non_empty(env, PORT_VARS) {
            Some(v) => parse_port(&v)?,
            None => DEFAULT_PORT,
        };

        let token_refresh_margin = match first_non_empty(env, REFRESH_MARGIN_VARS) {
            Some(v) => {
                let margin = Duration::from_secs(parse_u64(&v)?);
                if margin < MIN_REFRESH_MARGIN {
                    return Err(invalid(&v, "must be at least 5 seconds"));
                }
                margin
            }
            None => DEFAULT_REFRESH_MARGIN,
        };

        let upstream_timeout = match first_non_empty(env, UPSTREAM_TIMEOUT_VARS) {
            Some(v) => {
                let secs = parse_u64(&v)?;
                if secs == 0 {
                    return Err(invalid(&v, "must be greater than zero"));
                }
                Duration::from_secs(secs)
            }
            None => DEFAULT_UPSTREAM_TIMEOUT,
        };

        let allow_customer_create = match first_non_empty(env, ALLOW_CUSTOMER_CREATE_VARS) {
            Some(v) => parse_bool(&v)?,
            None => false,
        };
        let enable_passthrough = match first_non_empty(env, ENABLE_PASSTHROUGH_VARS) {
            Some(v) => parse_bool(&v)?,
            None => false,
        };

        tracing::debug!(
            client_id = %client_id.source,
            client_secret = %client_secret.source,
            shared_secret = %shared_secret.source,
            base_url = %base_url.source,
            "Resolved relay configuration sources"
        );

        Ok(Self {
            credentials: Credentials::new(client_id.value, client_secret.value),
            partner_base_url,
            token_url,
            target_entity,
            shared_secret: shared_secret.value,
            port,
            token_refresh_margin,
            upstream_timeout,
            allow_customer_create,
            enable_passthrough,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Parsing helpers
// ─────────────────────────────────────────────────────────────────────────────

fn invalid(resolved: &ResolvedValue, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        var: resolved.source.to_string(),
        reason: reason.to_string(),
    }
}

fn validate_url(resolved: &ResolvedValue) -> Result<&str> {
    let value = resolved.value.as_str();
    let has_host = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"))
        .is_some_and(|rest| !rest.trim_start_matches('/').is_empty());
    if has_host {
        Ok(value)
    } else {
        Err(invalid(resolved, "expected an http(s) URL"))
    }
}

fn parse_port(resolved: &ResolvedValue) -> Result<u16> {
    match resolved.value.parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(invalid(resolved, "expected a port number between 1 and 65535")),
    }
}

fn parse_u64(resolved: &ResolvedValue) -> Result<u64> {
    resolved
        .value
        .parse::<u64>()
        .map_err(|_| invalid(resolved, "expected a whole number of seconds"))
}

fn parse_bool(resolved: &ResolvedValue) -> Result<bool> {
    match resolved.value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(resolved, "expected true or false")),
    }
}
