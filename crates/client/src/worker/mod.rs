//! The offline cache worker.
//!
//! Three handlers share one cache store name and the precache manifest:
//!
//! - **install** precaches the manifest into the current store, all or nothing,
//!   and asks to skip the waiting phase.
//! - **activate** deletes every other store and claims clients.
//! - **fetch** is network-first for eligible GETs: successful responses are
//!   copied into the store in the background, and a network failure falls
//!   back to the stored copy.
//!
//! [`Registration`] plays the browser's part: it sequences the lifecycle,
//! keeps the previous worker serving when an update fails, and persists the
//! active version across restarts.

mod config;
mod controller;
mod lifecycle;
mod registration;

#[cfg(test)]
mod testing;

pub use config::WorkerConfig;
pub use controller::{FetchDisposition, Interception, OfflineCacheController, ResponseSource, is_eligible};
pub use lifecycle::WorkerState;
pub use registration::{Registration, UpdateOutcome};
