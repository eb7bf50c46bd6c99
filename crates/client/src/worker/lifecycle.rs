//! Worker lifecycle states.

use std::fmt;

use ninja_cache_core::Error;

/// Where a worker is in its life.
///
/// `Parsed → Installing → Installed → Activating → Activated`, or
/// `Redundant` after a failed handler or once a newer worker takes over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

impl WorkerState {
    /// Move from `expected` to `next`, or fail if the worker is elsewhere.
    pub(crate) fn advance(&mut self, expected: WorkerState, next: WorkerState) -> Result<(), Error> {
        if *self != expected {
            return Err(Error::InvalidState(format!("cannot go {expected} -> {next}: worker is {self}")));
        }
        *self = next;
        Ok(())
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        };
        f.write_str(name)
    }
}
