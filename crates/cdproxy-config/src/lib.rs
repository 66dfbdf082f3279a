//! Configuration for the cdproxy relay.
//!
//! All settings come from the environment and are resolved exactly once at
//! startup into a [`RelayConfig`]:
//! - Each setting has an explicit precedence list of variable names; the first
//!   non-empty one wins
//! - Required settings that are absent are reported together, by name
//! - Values are never included in errors or `Debug` output

pub mod env;
pub mod error;
pub mod resolver;
pub mod types;

pub use env::{EnvSource, MapEnv, ProcessEnv};
pub use error::{ConfigError, MissingField, Result};
pub use resolver::{ResolvedValue, ValueSource, first_non_empty, first_non_empty_or};
pub use types::*;
