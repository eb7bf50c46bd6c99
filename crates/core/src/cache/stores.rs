//! Named cache store management.
//!
//! A store is created on first open and lives until it is deleted as a whole.

use super::connection::CacheDb;
use crate::Error;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Handle to one named cache store.
///
/// Obtained from [`CacheDb::open_store`]; cloning is cheap and shares the connection.
#[derive(Clone, Debug)]
pub struct CacheStore {
    pub(crate) db: CacheDb,
    pub(crate) name: String,
}

impl CacheStore {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl CacheDb {
    /// Open the store called `name`, creating it if absent.
    pub async fn open_store(&self, name: &str) -> Result<CacheStore, Error> {
        if name.is_empty() {
            return Err(Error::InvalidInput("cache store name cannot be empty".into()));
        }

        let owned = name.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO cache_stores (name, created_at) VALUES (?1, ?2)",
                    params![owned, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        Ok(CacheStore { db: self.clone(), name: name.to_string() })
    }

    /// Handle to a store without creating it.
    ///
    /// Lookups on a missing store miss; writes to a missing store are discarded.
    pub fn store(&self, name: &str) -> CacheStore {
        CacheStore { db: self.clone(), name: name.to_string() }
    }

    /// List every store name in creation order.
    pub async fn store_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM cache_stores ORDER BY rowid")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, rusqlite::Error>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a store and all of its entries.
    ///
    /// Returns false if no store had that name.
    pub async fn delete_store(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM cache_stores WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }
}
