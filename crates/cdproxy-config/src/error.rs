//! Configuration error types.

use std::fmt;

/// Result type alias for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// A required setting that no alias provided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingField {
    /// Logical field name (e.g. `client_id`).
    pub name: &'static str,
    /// Environment variables that were checked, in precedence order.
    pub aliases: &'static [&'static str],
}

impl fmt::Display for MissingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.aliases.join(" | "))
    }
}

/// Errors that can occur while loading the relay configuration.
///
/// Messages name variables, never their values.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// One or more required settings are absent or empty.
    #[error("missing required configuration: {}", join_missing(.0))]
    MissingRequired(Vec<MissingField>),

    /// A variable is set but cannot be interpreted.
    #[error("invalid value for {var}: {reason}")]
    InvalidValue { var: String, reason: String },
}

impl ConfigError {
    /// Names of the missing fields, if this is a missing-field error.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        match self {
            ConfigError::MissingRequired(fields) => fields.iter().map(|f| f.name).collect(),
            ConfigError::InvalidValue { .. } => Vec::new(),
        }
    }
}

fn join_missing(fields: &[MissingField]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
