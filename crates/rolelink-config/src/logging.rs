// crates/rolelink-config/src/logging.rs
// ============================================================================
// Module: RoleLink Logging Configuration
// Description: `[logging]` section and subscriber installation.
// Purpose: Route RoleLink tracing events to a formatted subscriber.
// Dependencies: serde, tracing-subscriber
// ============================================================================

//! ## Overview
//! The `[logging]` section holds an `EnvFilter` directive string. `RUST_LOG`
//! overrides it when set. Installation is fallible because a process may only
//! install one global subscriber.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use crate::config::ConfigError;

// ============================================================================
// SECTION: Logging Config
// ============================================================================

/// Log output configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, e.g. `info` or `rolelink_core=debug`.
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

impl LoggingConfig {
    /// Validates the filter directives.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        self.configured_filter().map(|_| ())
    }

    /// Parses the configured directives.
    fn configured_filter(&self) -> Result<EnvFilter, ConfigError> {
        EnvFilter::try_new(&self.filter)
            .map_err(|err| ConfigError::Invalid(format!("logging.filter: {err}")))
    }

    /// Builds the filter, preferring `RUST_LOG` when it is set and valid.
    fn env_filter(&self) -> Result<EnvFilter, ConfigError> {
        EnvFilter::try_from_default_env().or_else(|_| self.configured_filter())
    }

    /// Installs a global fmt subscriber with this filter.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the filter is invalid or a global
    /// subscriber is already installed.
    pub fn install(&self) -> Result<(), ConfigError> {
        tracing_subscriber::fmt()
            .with_env_filter(self.env_filter()?)
            .with_target(true)
            .try_init()
            .map_err(|err| ConfigError::Logging(err.to_string()))
    }
}

/// Default filter directive.
fn default_filter() -> String {
    "info".to_string()
}
