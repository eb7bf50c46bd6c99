//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (NINJA_CACHE_*)
//! 2. TOML config file (if NINJA_CACHE_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! The loaded value is immutable for the life of the process; the worker
//! shares it behind an `Arc`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

mod validation;

pub use validation::ConfigError;

/// Cache version used when none is configured.
pub const DEFAULT_CACHE_VERSION: &str = "ninja-todo-v1";

/// Substring that marks API requests, which are never intercepted.
pub const DEFAULT_API_MARKER: &str = "/api/";

/// Assets needed to boot the app offline.
pub const DEFAULT_PRECACHE: &[&str] = &[
    "/",
    "/static/style.css",
    "/static/manifest.json",
    "/static/icon-192.png",
    "/static/icon-512.png",
];

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (NINJA_CACHE_*)
/// 2. TOML config file (if NINJA_CACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application origin that requests are forwarded to.
    ///
    /// Set via NINJA_CACHE_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Address the proxy listens on. Must be a loopback address: cached pages
    /// are keyed by URL alone, so one client's pages would be served to any
    /// other client while the origin is down.
    ///
    /// Set via NINJA_CACHE_LISTEN_ADDR environment variable.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Path to SQLite cache storage.
    ///
    /// Set via NINJA_CACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Name of the current cache store. Every other store is deleted on activation.
    ///
    /// Set via NINJA_CACHE_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Root-relative paths fetched and stored on install.
    ///
    /// Set via NINJA_CACHE_PRECACHE environment variable (e.g. `["/", "/static/app.js"]`).
    #[serde(default = "default_precache")]
    pub precache: Vec<String>,

    /// Requests whose URL contains this substring bypass the worker.
    ///
    /// Set via NINJA_CACHE_API_MARKER environment variable.
    #[serde(default = "default_api_marker")]
    pub api_marker: String,

    /// User-Agent string for upstream requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Optional upstream request timeout in milliseconds. Unset means no timeout.
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Activate a freshly installed worker without waiting for the old one to go away.
    #[serde(default = "default_true")]
    pub skip_waiting: bool,
}

fn default_origin() -> String {
    "http://127.0.0.1:5000".into()
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./ninja-cache.sqlite")
}

fn default_cache_version() -> String {
    DEFAULT_CACHE_VERSION.into()
}

fn default_precache() -> Vec<String> {
    DEFAULT_PRECACHE.iter().map(|p| p.to_string()).collect()
}

fn default_api_marker() -> String {
    DEFAULT_API_MARKER.into()
}

fn default_user_agent() -> String {
    "ninja-cache/0.1".into()
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            listen_addr: default_listen_addr(),
            db_path: default_db_path(),
            cache_version: default_cache_version(),
            precache: default_precache(),
            api_marker: default_api_marker(),
            user_agent: default_user_agent(),
            timeout_ms: None,
            skip_waiting: true,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest, if one is configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Parsed origin URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the origin is not an absolute http(s) URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ConfigError::Invalid {
                field: "origin".into(),
                reason: format!("unsupported scheme: {other}"),
            }),
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `NINJA_CACHE_`
    /// 2. TOML file from `NINJA_CACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file or environment cannot be parsed
    /// or validation fails after loading.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("NINJA_CACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("NINJA_CACHE_").map(|key| key.as_str().to_lowercase().into()),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
