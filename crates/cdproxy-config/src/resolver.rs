//! Alias resolution: first non-empty variable wins.

use std::fmt;

use crate::env::EnvSource;

/// Where a configuration value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// Environment variable with this name.
    EnvVar(&'static str),
    /// Built-in default.
    Default,
}

impl fmt::Display for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueSource::EnvVar(var) => write!(f, "env var {}", var),
            ValueSource::Default => write!(f, "built-in default"),
        }
    }
}

/// A resolved value together with its provenance.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedValue {
    pub value: String,
    pub source: ValueSource,
}

// Values may be secrets; only the source is printed.
impl fmt::Debug for ResolvedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedValue")
            .field("value", &"[REDACTED]")
            .field("source", &self.source)
            .finish()
    }
}

/// Return the first alias whose value is non-empty after trimming.
pub fn first_non_empty<E: EnvSource + ?Sized>(
    env: &E,
    aliases: &'static [&'static str],
) -> Option<ResolvedValue> {
    aliases.iter().find_map(|var| {
        let value = env.get(var)?;
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(ResolvedValue {
            value: trimmed.to_string(),
            source: ValueSource::EnvVar(var),
        })
    })
}

/// Like [`first_non_empty`], falling back to `default`.
pub fn first_non_empty_or<E: EnvSource + ?Sized>(
    env: &E,
    aliases: &'static [&'static str],
    default: &str,
) -> ResolvedValue {
    first_non_empty(env, aliases).unwrap_or_else(|| ResolvedValue {
        value: default.to_string(),
        source: ValueSource::Default,
    })
}
