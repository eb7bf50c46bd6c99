//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use std::collections::HashSet;

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `origin` is not an absolute http(s) URL
    /// - `listen_addr` is not a loopback address
    /// - `cache_version`, `api_marker` or `user_agent` is empty or blank
    /// - a `precache` path is not root-relative or appears twice
    /// - `timeout_ms` is set outside 100ms..=5 minutes
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.origin_url()?;

        if self.cache_version.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "cache_version".into(),
                hint: "Set NINJA_CACHE_CACHE_VERSION to a non-empty store name".into(),
            });
        }

        if !self.listen_addr.ip().is_loopback() {
            return Err(invalid(
                "listen_addr",
                format!("{} is not a loopback address; cached pages are shared by every client", self.listen_addr),
            ));
        }

        if self.api_marker.trim().is_empty() {
            return Err(invalid("api_marker", "must not be empty"));
        }

        if self.user_agent.trim().is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        let mut seen = HashSet::new();
        for path in &self.precache {
            if !path.starts_with('/') || path.starts_with("//") {
                return Err(invalid("precache", format!("{path:?} is not a root-relative path")));
            }
            if !seen.insert(path.as_str()) {
                return Err(invalid("precache", format!("{path:?} is listed more than once")));
            }
        }

        if let Some(timeout_ms) = self.timeout_ms {
            if timeout_ms < 100 {
                return Err(invalid("timeout_ms", "must be at least 100ms"));
            }
            if timeout_ms > 300_000 {
                return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
            }
        }

        if self.precache.is_empty() {
            tracing::warn!("precache list is empty; nothing will be available offline until visited");
        }

        Ok(())
    }
}
