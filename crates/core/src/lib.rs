//! Core types and shared functionality for ninja-cache.
//!
//! This crate provides:
//! - Cache storage with SQLite backend (named cache stores, entries, worker registration)
//! - Unified error types
//! - Configuration structures
//! - Plain HTTP request/response values shared by the worker and the proxy

pub mod cache;
pub mod config;
pub mod error;
pub mod http;

pub use cache::{CacheDb, CacheStore};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use http::{Request, Response};
