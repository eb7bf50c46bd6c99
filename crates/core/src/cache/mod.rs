//! SQLite-backed cache storage.
//!
//! Plays the role of the browser's cache storage: many named cache stores in
//! one database, each mapping request identity to a stored response. Access
//! is async via tokio-rusqlite. It supports:
//!
//! - Request identity keys using SHA-256 hashing
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Whole-store deletion (entries are never evicted individually)
//! - Persisted worker registration (which version is active for a scope)

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod registration;
pub mod stores;

pub use crate::Error;

pub use connection::CacheDb;
pub use registration::RegistrationRecord;
pub use stores::CacheStore;
