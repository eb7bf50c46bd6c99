//! URL handling for request identity and origin-relative paths.

use url::Url;

/// Error type for URL handling failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("{path} resolves outside origin {origin}")]
    CrossOrigin { path: String, origin: String },
}

impl From<UrlError> for ninja_cache_core::Error {
    fn from(err: UrlError) -> Self {
        ninja_cache_core::Error::InvalidUrl(err.to_string())
    }
}

/// Canonicalize an absolute URL string so equal resources share one identity.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Require an http or https scheme
/// 3. Lowercase the host
/// 4. Remove fragment (#...)
/// 5. Keep query string intact (do not reorder)
pub fn canonicalize(input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut parsed = Url::parse(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if let Some(host) = parsed.host_str().map(str::to_lowercase) {
        parsed
            .set_host(Some(&host))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

/// Resolve a root-relative path (optionally with a query) against the origin.
///
/// Rejects inputs that would leave the origin, such as `//other.host/x`.
pub fn resolve(origin: &Url, path: &str) -> Result<Url, UrlError> {
    if path.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut joined = origin.join(path).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    if joined.origin() != origin.origin() {
        return Err(UrlError::CrossOrigin { path: path.to_string(), origin: origin.origin().ascii_serialization() });
    }

    joined.set_fragment(None);

    Ok(joined)
}
