//! Proxy request handler.
//!
//! Every incoming request is rewritten onto the origin and dispatched to the
//! registration as a fetch event. Requests the worker does not intercept go
//! straight to the network.

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::extract::State;
use axum::http::{self, StatusCode};
use ninja_cache_client::fetch::{is_managed_header, resolve};
use ninja_cache_client::{FetchDisposition, Fetcher, Registration};
use ninja_cache_core::{Request, Response};
use url::Url;

use crate::error::ProxyError;

/// Largest request body forwarded upstream.
const MAX_REQUEST_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Shared handler state.
#[derive(Clone)]
pub struct ProxyState {
    registration: Arc<Registration>,
    network: Arc<dyn Fetcher>,
    origin: Arc<Url>,
}

impl ProxyState {
    pub fn new(registration: Arc<Registration>, network: Arc<dyn Fetcher>, origin: Url) -> Self {
        Self { registration, network, origin: Arc::new(origin) }
    }
}

/// Every path and method goes through the worker.
pub fn router(state: ProxyState) -> Router {
    Router::new().fallback(proxy).with_state(state)
}

async fn proxy(
    State(state): State<ProxyState>, incoming: axum::extract::Request,
) -> Result<http::Response<Body>, ProxyError> {
    let request = to_origin_request(&state.origin, incoming).await?;

    let response = match state.registration.handle_fetch(request).await? {
        FetchDisposition::Respond(interception) => {
            tracing::debug!(url = %interception.response.url, source = ?interception.source, "served by worker");
            interception.response
        }
        FetchDisposition::Passthrough(request) => state.network.fetch(&request).await?,
    };

    to_http_response(response)
}

/// Rewrite an incoming request onto the origin, keeping method, headers and body.
async fn to_origin_request(origin: &Url, incoming: axum::extract::Request) -> Result<Request, ProxyError> {
    let (parts, body) = incoming.into_parts();
    let path = parts.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let url = resolve(origin, path).map_err(|e| ProxyError::InvalidRequest(e.to_string()))?;

    let headers = parts
        .headers
        .iter()
        .filter(|(name, _)| !is_managed_header(name.as_str()))
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
        .collect();

    let body = to_bytes(body, MAX_REQUEST_BODY_BYTES)
        .await
        .map_err(|e| ProxyError::InvalidRequest(format!("failed to read request body: {e}")))?;

    Ok(Request { method: parts.method.as_str().to_string(), url, headers, body })
}

fn to_http_response(response: Response) -> Result<http::Response<Body>, ProxyError> {
    let status = StatusCode::from_u16(response.status)
        .map_err(|_| ProxyError::Internal(format!("invalid upstream status {}", response.status)))?;

    let mut builder = http::Response::builder().status(status);
    for (name, value) in response.headers.iter().filter(|(name, _)| !is_managed_header(name)) {
        builder = builder.header(name.as_str(), value.as_str());
    }

    builder
        .body(Body::from(response.body))
        .map_err(|e| ProxyError::Internal(format!("failed to build response: {e}")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use axum::http::header::{LOCATION, SET_COOKIE};
    use axum::routing::{get, post};
    use ninja_cache_client::{FetchClient, FetchConfig, OfflineCacheController, WorkerConfig};
    use ninja_cache_core::{CacheDb, Error};

    /// Origin stand-in: canned bodies by path, 404 otherwise, switchable offline.
    struct FakeOrigin {
        online: AtomicBool,
        pages: Mutex<HashMap<String, (u16, String)>>,
    }

    impl FakeOrigin {
        fn new() -> Self {
            Self { online: AtomicBool::new(true), pages: Mutex::new(HashMap::new()) }
        }

        fn page(&self, path: &str, status: u16, body: &str) {
            self.pages.lock().unwrap().insert(path.into(), (status, body.into()));
        }
    }

    #[async_trait::async_trait]
    impl Fetcher for FakeOrigin {
        async fn fetch(&self, request: &Request) -> Result<Response, Error> {
            if !self.online.load(Ordering::SeqCst) {
                return Err(Error::Network("offline".into()));
            }
            let page = self.pages.lock().unwrap().get(request.url.path()).cloned();
            let (status, body) = page.unwrap_or((404, "missing".into()));
            let body = format!("{} {}", request.method, body);
            Ok(Response::new(request.url.as_str(), status, body).with_header("Content-Type", "text/plain"))
        }
    }

    fn origin() -> Url {
        Url::parse("http://127.0.0.1:5000/").unwrap()
    }

    async fn proxy_state(origin_server: &Arc<FakeOrigin>) -> (ProxyState, Arc<Registration>) {
        let db = CacheDb::open_in_memory().await.unwrap();
        let config = Arc::new(WorkerConfig::new(origin()).with_precache(["/"]));
        let registration = Arc::new(Registration::new(config.scope(), db.clone()));
        let worker = OfflineCacheController::new(config, db, origin_server.clone());
        registration.update(Arc::new(worker)).await.unwrap();
        let state = ProxyState::new(registration.clone(), origin_server.clone(), origin());
        (state, registration)
    }

    fn incoming(method: &str, uri: &str, body: &'static str) -> axum::extract::Request {
        http::Request::builder()
            .method(method)
            .uri(uri)
            .header("host", "localhost:8080")
            .header("x-trace", "abc")
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_text(response: http::Response<Body>) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_to_origin_request() {
        let request = to_origin_request(&origin(), incoming("POST", "/todos?done=1", "title=milk"))
            .await
            .unwrap();

        assert_eq!(request.method, "POST");
        assert_eq!(request.url.as_str(), "http://127.0.0.1:5000/todos?done=1");
        assert_eq!(&request.body[..], b"title=milk");
        assert!(request.headers.iter().any(|(k, v)| k == "x-trace" && v == "abc"));
        assert!(request.headers.iter().all(|(k, _)| k != "host"));
    }

    #[test]
    fn test_to_http_response_drops_managed_headers() {
        let response = Response::new("http://127.0.0.1:5000/", 201, "ok")
            .with_header("Content-Type", "text/plain")
            .with_header("Transfer-Encoding", "chunked");

        let http_response = to_http_response(response).unwrap();
        assert_eq!(http_response.status(), StatusCode::CREATED);
        assert_eq!(http_response.headers().get("content-type").unwrap(), "text/plain");
        assert!(http_response.headers().get("transfer-encoding").is_none());
    }

    #[test]
    fn test_to_http_response_invalid_status() {
        let response = Response::new("http://127.0.0.1:5000/", 42, "");
        assert!(matches!(to_http_response(response), Err(ProxyError::Internal(_))));
    }

    #[tokio::test]
    async fn test_proxy_serves_from_cache_when_offline() {
        let origin_server = Arc::new(FakeOrigin::new());
        origin_server.page("/", 200, "home");
        origin_server.page("/page", 200, "page");
        let (state, registration) = proxy_state(&origin_server).await;

        let online = proxy(State(state.clone()), incoming("GET", "/page", "")).await.unwrap();
        assert_eq!(body_text(online).await, "GET page");
        registration.settle().await;

        origin_server.online.store(false, Ordering::SeqCst);
        let offline = proxy(State(state), incoming("GET", "/page", "")).await.unwrap();
        assert_eq!(offline.status(), StatusCode::OK);
        assert_eq!(body_text(offline).await, "GET page");
    }

    #[tokio::test]
    async fn test_proxy_offline_miss_is_bad_gateway() {
        let origin_server = Arc::new(FakeOrigin::new());
        origin_server.page("/", 200, "home");
        let (state, _registration) = proxy_state(&origin_server).await;

        origin_server.online.store(false, Ordering::SeqCst);
        let err = proxy(State(state), incoming("GET", "/unknown", "")).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_proxy_passthrough_api_and_post() {
        let origin_server = Arc::new(FakeOrigin::new());
        origin_server.page("/", 200, "home");
        origin_server.page("/api/todos", 200, "[]");
        let (state, registration) = proxy_state(&origin_server).await;

        let api = proxy(State(state.clone()), incoming("GET", "/api/todos", "")).await.unwrap();
        assert_eq!(body_text(api).await, "GET []");
        let post = proxy(State(state.clone()), incoming("POST", "/", "title=x")).await.unwrap();
        assert_eq!(body_text(post).await, "POST home");
        registration.settle().await;

        origin_server.online.store(false, Ordering::SeqCst);
        let err = proxy(State(state), incoming("GET", "/api/todos", "")).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_proxy_relays_error_status_uncached() {
        let origin_server = Arc::new(FakeOrigin::new());
        origin_server.page("/", 200, "home");
        origin_server.page("/oops", 500, "boom");
        let (state, registration) = proxy_state(&origin_server).await;

        let response = proxy(State(state.clone()), incoming("GET", "/oops", "")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        registration.settle().await;

        origin_server.online.store(false, Ordering::SeqCst);
        assert!(proxy(State(state), incoming("GET", "/oops", "")).await.is_err());
    }

    /// Real HTTP origin on an ephemeral port, answering login and logout with redirects.
    async fn spawn_redirecting_origin() -> Url {
        let app = Router::new()
            .route("/", get(|| async { "home" }))
            .route(
                "/login",
                post(|| async { (StatusCode::FOUND, [(LOCATION, "/"), (SET_COOKIE, "session=abc123; Path=/")]) }),
            )
            .route(
                "/logout",
                get(|| async { (StatusCode::FOUND, [(LOCATION, "/login"), (SET_COOKIE, "session=; Max-Age=0")]) }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });
        Url::parse(&format!("http://{addr}/")).unwrap()
    }

    #[tokio::test]
    async fn test_proxy_relays_redirects_with_cookies_uncached() {
        let origin_url = spawn_redirecting_origin().await;
        let network: Arc<dyn Fetcher> = Arc::new(FetchClient::new(FetchConfig::default()).unwrap());
        let db = CacheDb::open_in_memory().await.unwrap();
        let config = Arc::new(WorkerConfig::new(origin_url.clone()).with_precache(["/"]));
        let registration = Arc::new(Registration::new(config.scope(), db.clone()));
        let worker = OfflineCacheController::new(config, db.clone(), network.clone());
        registration.update(Arc::new(worker)).await.unwrap();
        let state = ProxyState::new(registration.clone(), network, origin_url.clone());

        let login = proxy(State(state.clone()), incoming("POST", "/login", "user=a")).await.unwrap();
        assert_eq!(login.status(), StatusCode::FOUND);
        assert_eq!(login.headers().get(LOCATION).unwrap(), "/");
        assert_eq!(login.headers().get(SET_COOKIE).unwrap(), "session=abc123; Path=/");

        let logout = proxy(State(state), incoming("GET", "/logout", "")).await.unwrap();
        assert_eq!(logout.status(), StatusCode::FOUND);
        assert_eq!(logout.headers().get(LOCATION).unwrap(), "/login");
        assert_eq!(logout.headers().get(SET_COOKIE).unwrap(), "session=; Max-Age=0");
        registration.settle().await;

        let store = db.store("ninja-todo-v1");
        let logout_request = Request::get(origin_url.join("/logout").unwrap());
        assert!(store.match_request(&logout_request).await.unwrap().is_none());
        assert_eq!(store.len().await.unwrap(), 1);
    }
}
