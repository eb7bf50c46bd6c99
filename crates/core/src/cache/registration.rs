//! Persisted worker registration.
//!
//! Records which cache version is active for an origin scope so a restarted
//! host resumes with the previously activated worker.

use super::connection::CacheDb;
use crate::Error;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::OptionalExtension;

/// The active worker version recorded for a scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationRecord {
    pub scope: String,
    pub active_version: String,
    pub activated_at: String,
}

impl CacheDb {
    /// Get the registration for a scope, if a worker was ever activated there.
    pub async fn registration(&self, scope: &str) -> Result<Option<RegistrationRecord>, Error> {
        let scope = scope.to_string();
        self.conn
            .call(move |conn| -> Result<Option<RegistrationRecord>, Error> {
                let record = conn
                    .query_row(
                        "SELECT scope, active_version, activated_at FROM worker_registration WHERE scope = ?1",
                        params![scope],
                        |row| {
                            Ok(RegistrationRecord {
                                scope: row.get(0)?,
                                active_version: row.get(1)?,
                                activated_at: row.get(2)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(record)
            })
            .await
            .map_err(Error::from)
    }

    /// Record `version` as the active worker for a scope.
    pub async fn set_active_version(&self, scope: &str, version: &str) -> Result<(), Error> {
        let scope = scope.to_string();
        let version = version.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO worker_registration (scope, active_version, activated_at)
                    VALUES (?1, ?2, ?3)
                    ON CONFLICT(scope) DO UPDATE SET
                        active_version = excluded.active_version,
                        activated_at = excluded.activated_at",
                    params![scope, version, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_registration() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(db.registration("http://127.0.0.1:5000/").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_and_replace_active_version() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let scope = "http://127.0.0.1:5000/";

        db.set_active_version(scope, "ninja-todo-v0").await.unwrap();
        db.set_active_version(scope, "ninja-todo-v1").await.unwrap();

        let record = db.registration(scope).await.unwrap().unwrap();
        assert_eq!(record.scope, scope);
        assert_eq!(record.active_version, "ninja-todo-v1");
    }

    #[tokio::test]
    async fn test_scopes_are_independent() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.set_active_version("http://a.test/", "a-v1").await.unwrap();
        db.set_active_version("http://b.test/", "b-v3").await.unwrap();

        assert_eq!(db.registration("http://a.test/").await.unwrap().unwrap().active_version, "a-v1");
        assert_eq!(db.registration("http://b.test/").await.unwrap().unwrap().active_version, "b-v3");
    }
}
