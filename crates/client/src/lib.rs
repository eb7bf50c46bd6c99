//! Client code for ninja-cache.
//!
//! This crate provides the network fetcher and the offline cache worker
//! (install, activate and fetch handlers plus the registration that drives
//! them) shared by the proxy server.

pub mod fetch;
pub mod worker;

pub use fetch::{FetchClient, FetchConfig, Fetcher};
pub use worker::{
    FetchDisposition, Interception, OfflineCacheController, Registration, ResponseSource, UpdateOutcome,
    WorkerConfig, WorkerState, is_eligible,
};
