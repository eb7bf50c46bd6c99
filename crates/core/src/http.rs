//! Plain HTTP values exchanged between the proxy, the worker, the network and the cache.
//!
//! Headers are kept as ordered `(name, value)` pairs so a stored response
//! can be replayed byte-for-byte. Bodies are reference-counted [`Bytes`];
//! cloning a [`Response`] yields an independent reader over the same buffer.

use bytes::Bytes;
use url::Url;

/// An outgoing request as seen by the fetch interceptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Request {
    /// Build a bodyless GET request.
    pub fn get(url: Url) -> Self {
        Self { method: "GET".into(), url, headers: Vec::new(), body: Bytes::new() }
    }

    /// Build a request with an arbitrary method and no body.
    pub fn new(method: impl Into<String>, url: Url) -> Self {
        Self { method: method.into(), url, headers: Vec::new(), body: Bytes::new() }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Method normalized for identity comparisons.
    pub fn normalized_method(&self) -> String {
        self.method.to_ascii_uppercase()
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }

    /// URL used as request identity: fragment stripped, everything else verbatim.
    pub fn identity_url(&self) -> String {
        let mut url = self.url.clone();
        url.set_fragment(None);
        url.into()
    }
}

/// A response received from the network or replayed from a cache store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// URL the response was produced for.
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Response {
    pub fn new(url: impl Into<String>, status: u16, body: impl Into<Bytes>) -> Self {
        Self { url: url.into(), status, status_text: String::new(), headers: Vec::new(), body: body.into() }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Status in the OK range (200-299).
    pub fn is_ok(&self) -> bool {
        (200..=299).contains(&self.status)
    }
}
