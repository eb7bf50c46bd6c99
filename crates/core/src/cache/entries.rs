//! Entry operations on a single cache store.
//!
//! Entries are keyed by request identity (method + URL). Only GET requests
//! may be stored, mirroring the browser cache contract.

use super::hash::compute_request_key;
use super::stores::CacheStore;
use crate::{Error, Request, Response};
use bytes::Bytes;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, OptionalExtension, Row};

/// Columns selected when decoding a stored response, in [`read_response`] order.
pub(crate) const ENTRY_COLUMNS: &str = "e.response_url, e.status, e.status_text, e.headers_json, e.body";

/// Undecoded row; header JSON is parsed outside the rusqlite row callback.
pub(crate) struct RawEntry {
    response_url: String,
    status: u16,
    status_text: String,
    headers_json: String,
    body: Vec<u8>,
}

impl RawEntry {
    pub(crate) fn into_response(self) -> Result<Response, Error> {
        let headers: Vec<(String, String)> = serde_json::from_str(&self.headers_json)?;
        Ok(Response {
            url: self.response_url,
            status: self.status,
            status_text: self.status_text,
            headers,
            body: Bytes::from(self.body),
        })
    }
}

pub(crate) fn read_response(row: &Row<'_>) -> rusqlite::Result<RawEntry> {
    Ok(RawEntry {
        response_url: row.get(0)?,
        status: row.get(1)?,
        status_text: row.get(2)?,
        headers_json: row.get(3)?,
        body: row.get(4)?,
    })
}

/// Encoded form of one (request, response) pair, ready to insert.
struct NewEntry {
    key_hash: String,
    method: String,
    url: String,
    response: Response,
    headers_json: String,
}

impl NewEntry {
    fn encode(request: &Request, response: Response) -> Result<Self, Error> {
        if !request.is_get() {
            return Err(Error::InvalidInput(format!(
                "only GET requests can be cached, got {} {}",
                request.method, request.url
            )));
        }

        let method = request.normalized_method();
        let url = request.identity_url();
        let headers_json = serde_json::to_string(&response.headers)?;
        Ok(Self { key_hash: compute_request_key(&method, &url), method, url, response, headers_json })
    }
}

impl CacheStore {
    /// Store a response for a request, replacing any previous entry for the same identity.
    pub async fn put(&self, request: &Request, response: &Response) -> Result<bool, Error> {
        self.put_all(vec![(request.clone(), response.clone())]).await
    }

    /// Store several entries in one transaction; either all are written or none are.
    ///
    /// Returns false without writing if the store no longer exists, so a
    /// late write can never resurrect a deleted store.
    pub async fn put_all(&self, entries: Vec<(Request, Response)>) -> Result<bool, Error> {
        let rows = entries
            .into_iter()
            .map(|(request, response)| NewEntry::encode(&request, response))
            .collect::<Result<Vec<_>, Error>>()?;
        let name = self.name.clone();
        let now = chrono::Utc::now().to_rfc3339();

        self.db
            .conn
            .call(move |conn| -> Result<bool, Error> {
                let tx = conn.unchecked_transaction()?;
                let exists: bool = tx.query_row(
                    "SELECT EXISTS(SELECT 1 FROM cache_stores WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                if !exists {
                    tracing::debug!(store = %name, "discarding write to deleted cache store");
                    return Ok(false);
                }
                for row in &rows {
                    tx.execute(
                        "INSERT INTO cache_entries (
                            store_name, key_hash, method, url, status, status_text,
                            response_url, headers_json, body, stored_at
                        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                        ON CONFLICT(store_name, key_hash) DO UPDATE SET
                            method = excluded.method,
                            url = excluded.url,
                            status = excluded.status,
                            status_text = excluded.status_text,
                            response_url = excluded.response_url,
                            headers_json = excluded.headers_json,
                            body = excluded.body,
                            stored_at = excluded.stored_at",
                        params![
                            name,
                            row.key_hash,
                            row.method,
                            row.url,
                            row.response.status,
                            row.response.status_text,
                            row.response.url,
                            row.headers_json,
                            &row.response.body[..],
                            now,
                        ],
                    )?;
                }
                tx.commit()?;
                Ok(true)
            })
            .await
            .map_err(Error::from)
    }

    /// Find the stored response for a request.
    ///
    /// Returns None if this store has no entry with the same method and URL.
    pub async fn match_request(&self, request: &Request) -> Result<Option<Response>, Error> {
        let key_hash = compute_request_key(&request.method, &request.identity_url());
        let name = self.name.clone();
        let sql = format!("SELECT {ENTRY_COLUMNS} FROM cache_entries e WHERE e.store_name = ?1 AND e.key_hash = ?2");

        self.db
            .conn
            .call(move |conn| -> Result<Option<Response>, Error> {
                let raw = conn.query_row(&sql, params![name, key_hash], read_response).optional()?;
                raw.map(RawEntry::into_response).transpose()
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries in the store.
    pub async fn len(&self) -> Result<usize, Error> {
        let name = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<usize, Error> {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM cache_entries WHERE store_name = ?1",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(count as usize)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.len().await? == 0)
    }
}
