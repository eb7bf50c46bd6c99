//! Network side of the worker: the `Fetcher` seam and its reqwest implementation.
//!
//! ### Contract
//! - A fetch resolves with whatever status the server sent; 404 and 500 are
//!   responses, not errors.
//! - Only transport failures (refused connection, DNS, reset, timeout) are
//!   errors, reported as `Error::Network`. The worker's cache fallback keys
//!   off exactly this distinction.
//!
//! ### Forwarding
//! - Method, headers and body are forwarded; connection-scoped headers are
//!   dropped and left to the HTTP client.
//! - Redirects are never followed: a 3xx reaches the caller unchanged, with
//!   its `Location` and `Set-Cookie` headers, as the page would see it.
//! - No timeout unless one is configured.

pub mod url;

use std::time::{Duration, Instant};

use reqwest::{Client, Method};

pub use self::url::{UrlError, canonicalize, resolve};

use ninja_cache_core::{Error, Request, Response};

/// Headers the HTTP client manages itself; never copied between hops.
const MANAGED_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
    "accept-encoding",
];

/// True for headers that must not be forwarded verbatim to the next hop.
pub fn is_managed_header(name: &str) -> bool {
    MANAGED_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// Performs network requests on behalf of the worker.
///
/// Implemented by [`FetchClient`] in production and by scripted fakes in tests.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Send a request and return the response, whatever its status.
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "ninja-cache/0.1")
    pub user_agent: String,

    /// Request timeout (default: none)
    pub timeout: Option<Duration>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { user_agent: "ninja-cache/0.1".to_string(), timeout: None }
    }
}

impl From<&ninja_cache_core::AppConfig> for FetchConfig {
    fn from(config: &ninja_cache_core::AppConfig) -> Self {
        Self { user_agent: config.user_agent.clone(), timeout: config.timeout() }
    }
}

/// reqwest-backed [`Fetcher`].
pub struct FetchClient {
    http: Client,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let mut builder = Client::builder()
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true);

        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        let http = builder
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http })
    }
}

#[async_trait::async_trait]
impl Fetcher for FetchClient {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| Error::InvalidInput(format!("invalid method: {}", request.method)))?;

        let mut builder = self.http.request(method, request.url.clone());
        for (name, value) in request.headers.iter().filter(|(name, _)| !is_managed_header(name)) {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Network(format!("{} {}: {e}", request.method, request.url)))?;

        let status = response.status();
        let final_url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .filter(|(name, _)| !is_managed_header(name.as_str()))
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response from {final_url}: {e}")))?;

        tracing::debug!(
            method = %request.method,
            url = %request.url,
            status = status.as_u16(),
            bytes = body.len(),
            fetch_ms = start.elapsed().as_millis() as u64,
            "fetched"
        );

        Ok(Response {
            url: final_url,
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }
}
