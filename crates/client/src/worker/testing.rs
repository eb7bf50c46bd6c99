//! Scripted network for worker tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use ninja_cache_core::{CacheDb, Error, Request, Response};
use url::Url;

use crate::fetch::Fetcher;

pub(crate) fn origin() -> Url {
    Url::parse("http://127.0.0.1:5000/").unwrap()
}

/// File-backed database holding a store called `name` that SQLite refuses to delete.
pub(crate) async fn db_with_locked_store(dir: &tempfile::TempDir, name: &str) -> CacheDb {
    let path = dir.path().join("cache.sqlite");
    let db = CacheDb::open(&path).await.unwrap();
    db.open_store(name).await.unwrap();

    let trigger = format!(
        "CREATE TRIGGER lock_store BEFORE DELETE ON cache_stores
         WHEN OLD.name = '{name}'
         BEGIN SELECT RAISE(ABORT, 'store is locked'); END;"
    );
    let side = tokio_rusqlite::Connection::open(&path).await.unwrap();
    side.call(move |conn| conn.execute_batch(&trigger)).await.unwrap();
    db
}

/// Serves canned responses by path; unknown paths get a 404. Can be switched offline.
pub(crate) struct ScriptedNetwork {
    online: AtomicBool,
    routes: Mutex<HashMap<String, (u16, &'static str)>>,
    log: Mutex<Vec<String>>,
}

impl ScriptedNetwork {
    pub(crate) fn new() -> Self {
        Self { online: AtomicBool::new(true), routes: Mutex::new(HashMap::new()), log: Mutex::new(Vec::new()) }
    }

    pub(crate) fn route(&self, path: &str, status: u16, body: &'static str) {
        self.routes.lock().unwrap().insert(path.to_string(), (status, body));
    }

    pub(crate) fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// URLs requested while online, in order.
    pub(crate) fn requests(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Fetcher for ScriptedNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("offline: {}", request.url)));
        }
        self.log.lock().unwrap().push(request.url.to_string());

        let route = self.routes.lock().unwrap().get(request.url.path()).copied();
        let (status, body) = route.unwrap_or((404, "not found"));
        Ok(Response::new(request.url.as_str(), status, body).with_header("Content-Type", "text/plain"))
    }
}
