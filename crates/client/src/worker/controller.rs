//! Install, activate and fetch handlers for one worker version.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::try_join_all;
use ninja_cache_core::{CacheDb, Error, Request, Response};
use tokio::sync::Mutex;
use tokio_util::task::TaskTracker;

use super::config::WorkerConfig;
use super::lifecycle::WorkerState;
use crate::fetch::{Fetcher, resolve};

/// Whether the worker handles this request at all: GETs outside the API.
pub fn is_eligible(request: &Request, api_marker: &str) -> bool {
    request.is_get() && !request.url.as_str().contains(api_marker)
}

/// Where an intercepted response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Network,
    Cache,
}

/// A response the worker produced for an intercepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interception {
    pub response: Response,
    pub source: ResponseSource,
}

/// Outcome of dispatching a fetch event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchDisposition {
    /// Not intercepted; the host performs the request as a plain network fetch.
    Passthrough(Request),
    /// The worker answered.
    Respond(Interception),
}

/// One worker version: its config, its lifecycle state and the background
/// cache writes it has started.
pub struct OfflineCacheController {
    config: Arc<WorkerConfig>,
    db: CacheDb,
    network: Arc<dyn Fetcher>,
    state: Mutex<WorkerState>,
    skip_waiting: AtomicBool,
    controlling: AtomicBool,
    writes: TaskTracker,
}

impl OfflineCacheController {
    /// A freshly parsed worker; it intercepts nothing until installed and activated.
    pub fn new(config: Arc<WorkerConfig>, db: CacheDb, network: Arc<dyn Fetcher>) -> Self {
        Self::with_state(config, db, network, WorkerState::Parsed)
    }

    /// A worker that was activated in an earlier run and is still in charge.
    pub fn resume_active(config: Arc<WorkerConfig>, db: CacheDb, network: Arc<dyn Fetcher>) -> Self {
        let worker = Self::with_state(config, db, network, WorkerState::Activated);
        worker.controlling.store(true, Ordering::SeqCst);
        worker
    }

    fn with_state(config: Arc<WorkerConfig>, db: CacheDb, network: Arc<dyn Fetcher>, state: WorkerState) -> Self {
        Self {
            config,
            db,
            network,
            state: Mutex::new(state),
            skip_waiting: AtomicBool::new(false),
            controlling: AtomicBool::new(false),
            writes: TaskTracker::new(),
        }
    }

    /// Cache store name, which doubles as the worker version.
    pub fn version(&self) -> &str {
        &self.config.cache_name
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.lock().await
    }

    /// True once install asked to bypass the waiting phase.
    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    /// True once activate claimed clients.
    pub fn is_controlling(&self) -> bool {
        self.controlling.load(Ordering::SeqCst)
    }

    /// Mark this worker as superseded; it stops intercepting.
    pub async fn retire(&self) {
        *self.state.lock().await = WorkerState::Redundant;
        self.controlling.store(false, Ordering::SeqCst);
    }

    /// Install handler: precache the manifest into the current store.
    ///
    /// Every asset is fetched before anything is written, and the writes
    /// share one transaction, so a failed install stores nothing. Any
    /// network failure or non-OK status fails the install and the worker
    /// becomes redundant.
    pub async fn install(&self) -> Result<(), Error> {
        self.state.lock().await.advance(WorkerState::Parsed, WorkerState::Installing)?;
        tracing::info!(version = self.version(), assets = self.config.precache.len(), "installing worker");

        let result = self.precache().await;

        let mut state = self.state.lock().await;
        match result {
            Ok(()) => {
                *state = WorkerState::Installed;
                if self.config.skip_waiting {
                    self.skip_waiting.store(true, Ordering::SeqCst);
                }
                tracing::info!(version = self.version(), "worker installed");
                Ok(())
            }
            Err(e) => {
                *state = WorkerState::Redundant;
                tracing::error!(version = self.version(), error = %e, "worker install failed");
                Err(e)
            }
        }
    }

    async fn precache(&self) -> Result<(), Error> {
        let mut seen = HashSet::new();
        let mut requests = Vec::with_capacity(self.config.precache.len());
        for path in &self.config.precache {
            let url = resolve(&self.config.origin, path)?;
            if !seen.insert(url.clone()) {
                return Err(Error::InvalidInput(format!("duplicate precache request: {url}")));
            }
            requests.push(Request::get(url));
        }

        let store = self.db.open_store(&self.config.cache_name).await?;

        let entries = try_join_all(requests.into_iter().map(|request| async move {
            let response = self.network.fetch(&request).await?;
            if !response.is_ok() {
                return Err(Error::HttpError(format!("{} returned status {}", request.url, response.status)));
            }
            Ok::<_, Error>((request, response))
        }))
        .await?;

        store.put_all(entries).await?;
        Ok(())
    }

    /// Activate handler: delete every store except the current one, then claim clients.
    ///
    /// Returns the names of the deleted stores.
    pub async fn activate(&self) -> Result<Vec<String>, Error> {
        self.state.lock().await.advance(WorkerState::Installed, WorkerState::Activating)?;

        let result = self.delete_stale_stores().await;

        let mut state = self.state.lock().await;
        match result {
            Ok(deleted) => {
                *state = WorkerState::Activated;
                self.controlling.store(true, Ordering::SeqCst);
                tracing::info!(version = self.version(), deleted = ?deleted, "worker activated and claimed clients");
                Ok(deleted)
            }
            Err(e) => {
                *state = WorkerState::Redundant;
                tracing::error!(version = self.version(), error = %e, "worker activation failed");
                Err(e)
            }
        }
    }

    async fn delete_stale_stores(&self) -> Result<Vec<String>, Error> {
        let stale: Vec<String> = self
            .db
            .store_names()
            .await?
            .into_iter()
            .filter(|name| *name != self.config.cache_name)
            .collect();

        try_join_all(stale.iter().map(|name| self.db.delete_store(name))).await?;
        Ok(stale)
    }

    /// Fetch handler.
    ///
    /// Requests pass through untouched unless this worker is active and in
    /// control and the request is an eligible GET. Eligible requests go to
    /// the network first; OK responses are copied into the store without
    /// delaying the caller, and a network failure is answered from the
    /// store. A miss on that fallback is `Error::CacheMiss`; any other
    /// fetch error is returned as is.
    pub async fn handle_fetch(&self, request: Request) -> Result<FetchDisposition, Error> {
        if !self.is_controlling() || self.state().await != WorkerState::Activated {
            return Ok(FetchDisposition::Passthrough(request));
        }

        if !is_eligible(&request, &self.config.api_marker) {
            tracing::debug!(method = %request.method, url = %request.url, "not intercepted");
            return Ok(FetchDisposition::Passthrough(request));
        }

        match self.network.fetch(&request).await {
            Ok(response) => {
                if response.is_ok() {
                    self.store_in_background(request, response.clone());
                } else {
                    tracing::debug!(url = %request.url, status = response.status, "not caching non-OK response");
                }
                Ok(FetchDisposition::Respond(Interception { response, source: ResponseSource::Network }))
            }
            Err(network_err) if network_err.is_network() => {
                tracing::warn!(url = %request.url, error = %network_err, "network failed, falling back to cache");
                let cached = self.db.store(&self.config.cache_name).match_request(&request).await?;
                match cached {
                    Some(response) => {
                        Ok(FetchDisposition::Respond(Interception { response, source: ResponseSource::Cache }))
                    }
                    None => Err(Error::CacheMiss(request.url.to_string())),
                }
            }
            Err(e) => Err(e),
        }
    }

    fn store_in_background(&self, request: Request, copy: Response) {
        let store = self.db.store(&self.config.cache_name);
        self.writes.spawn(async move {
            match store.put(&request, &copy).await {
                Ok(true) => tracing::debug!(url = %request.url, store = store.name(), "cached response"),
                Ok(false) => {
                    tracing::debug!(url = %request.url, store = store.name(), "cache store gone, write dropped")
                }
                Err(e) => tracing::warn!(url = %request.url, error = %e, "failed to cache response"),
            }
        });
    }

    /// Wait until every background cache write started so far has finished.
    pub async fn settle(&self) {
        self.writes.close();
        self.writes.wait().await;
        self.writes.reopen();
    }
}
