//! Immutable worker configuration.

use ninja_cache_core::config::{DEFAULT_API_MARKER, DEFAULT_CACHE_VERSION, DEFAULT_PRECACHE};
use ninja_cache_core::{AppConfig, Error};
use url::Url;

use crate::fetch::canonicalize;

/// Everything a worker version needs to know, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Origin the worker controls; also the registration scope.
    pub origin: Url,
    /// Name of the current cache store.
    pub cache_name: String,
    /// Root-relative paths precached on install, in order.
    pub precache: Vec<String>,
    /// URL substring marking requests that are never intercepted.
    pub api_marker: String,
    /// Whether install asks to activate immediately.
    pub skip_waiting: bool,
}

impl WorkerConfig {
    /// Config for `origin` with the built-in version, manifest and API marker.
    pub fn new(origin: Url) -> Self {
        Self {
            origin,
            cache_name: DEFAULT_CACHE_VERSION.into(),
            precache: DEFAULT_PRECACHE.iter().map(|p| p.to_string()).collect(),
            api_marker: DEFAULT_API_MARKER.into(),
            skip_waiting: true,
        }
    }

    pub fn with_cache_name(mut self, name: impl Into<String>) -> Self {
        self.cache_name = name.into();
        self
    }

    pub fn with_precache<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.precache = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_skip_waiting(mut self, skip_waiting: bool) -> Self {
        self.skip_waiting = skip_waiting;
        self
    }

    /// Build from validated application config.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = canonicalize(&config.origin)?;
        Ok(Self {
            origin,
            cache_name: config.cache_version.clone(),
            precache: config.precache.clone(),
            api_marker: config.api_marker.clone(),
            skip_waiting: config.skip_waiting,
        })
    }

    /// Registration scope key.
    pub fn scope(&self) -> String {
        self.origin.origin().ascii_serialization()
    }
}
