//! Worker registration: sequences the lifecycle and tracks the active worker.

use std::sync::Arc;

use ninja_cache_core::{CacheDb, Error, Request};
use tokio::sync::RwLock;

use super::config::WorkerConfig;
use super::controller::{FetchDisposition, OfflineCacheController};
use crate::fetch::Fetcher;

/// What happened to a worker handed to [`Registration::update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Installed and activated; these stale stores were deleted.
    Activated { deleted: Vec<String> },
    /// Installed, but parked until [`Registration::activate_waiting`] because it did not skip waiting.
    Waiting,
}

/// One registration per origin scope.
pub struct Registration {
    scope: String,
    db: CacheDb,
    active: RwLock<Option<Arc<OfflineCacheController>>>,
    waiting: RwLock<Option<Arc<OfflineCacheController>>>,
}

impl Registration {
    /// An empty registration: no worker controls the scope yet.
    pub fn new(scope: impl Into<String>, db: CacheDb) -> Self {
        Self { scope: scope.into(), db, active: RwLock::new(None), waiting: RwLock::new(None) }
    }

    /// Rebuild the registration from storage.
    ///
    /// If a version was activated in an earlier run, a worker for that
    /// version resumes control, so it keeps serving even if the next update fails.
    pub async fn restore(db: CacheDb, config: &WorkerConfig, network: Arc<dyn Fetcher>) -> Result<Self, Error> {
        let registration = Self::new(config.scope(), db.clone());

        if let Some(record) = db.registration(&registration.scope).await? {
            tracing::info!(
                scope = %record.scope,
                version = %record.active_version,
                "resuming previously active worker"
            );
            let previous = config.clone().with_cache_name(record.active_version);
            let worker = OfflineCacheController::resume_active(Arc::new(previous), db, network);
            *registration.active.write().await = Some(Arc::new(worker));
        }

        Ok(registration)
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Version of the worker currently in control.
    pub async fn active_version(&self) -> Option<String> {
        self.active.read().await.as_ref().map(|w| w.version().to_string())
    }

    /// Install `worker` and, when allowed, activate it.
    ///
    /// A failed install leaves the current active worker in place and
    /// returns the install error. The worker activates immediately if it
    /// asked to skip waiting or if nothing is active yet.
    pub async fn update(&self, worker: Arc<OfflineCacheController>) -> Result<UpdateOutcome, Error> {
        if let Err(e) = worker.install().await {
            match self.active_version().await {
                Some(version) => tracing::warn!(%version, "update failed; previous worker keeps serving"),
                None => tracing::warn!("update failed; requests pass through uncached"),
            }
            return Err(e);
        }

        let has_active = self.active.read().await.is_some();
        if worker.skip_waiting_requested() || !has_active {
            let deleted = self.promote(worker).await?;
            return Ok(UpdateOutcome::Activated { deleted });
        }

        tracing::info!(version = worker.version(), "worker installed and waiting");
        if let Some(previous) = self.waiting.write().await.replace(worker) {
            previous.retire().await;
        }
        Ok(UpdateOutcome::Waiting)
    }

    /// Update as the host starts, before any client is served.
    ///
    /// With no client under control yet, nothing holds the old worker in
    /// place, so a worker that would otherwise wait is activated at once.
    pub async fn start(&self, worker: Arc<OfflineCacheController>) -> Result<UpdateOutcome, Error> {
        match self.update(worker).await? {
            UpdateOutcome::Waiting => {
                let deleted = self.activate_waiting().await?.unwrap_or_default();
                Ok(UpdateOutcome::Activated { deleted })
            }
            activated => Ok(activated),
        }
    }

    /// Activate the waiting worker, if any, as happens once no client uses the old one.
    pub async fn activate_waiting(&self) -> Result<Option<Vec<String>>, Error> {
        let Some(worker) = self.waiting.write().await.take() else {
            return Ok(None);
        };
        self.promote(worker).await.map(Some)
    }

    async fn promote(&self, worker: Arc<OfflineCacheController>) -> Result<Vec<String>, Error> {
        let deleted = worker.activate().await?;
        self.db.set_active_version(&self.scope, worker.version()).await?;

        let previous = self.active.write().await.replace(worker);
        if let Some(previous) = previous {
            previous.settle().await;
            previous.retire().await;
        }
        Ok(deleted)
    }

    /// Dispatch a fetch event to the active worker.
    pub async fn handle_fetch(&self, request: Request) -> Result<FetchDisposition, Error> {
        let active = self.active.read().await.clone();
        match active {
            Some(worker) => worker.handle_fetch(request).await,
            None => Ok(FetchDisposition::Passthrough(request)),
        }
    }

    /// Wait for background cache writes of the active worker.
    pub async fn settle(&self) {
        let active = self.active.read().await.clone();
        if let Some(worker) = active {
            worker.settle().await;
        }
    }
}
