//! Reportable violations (spec §4.7, "Violation").
//!
//! Matches the teacher's convention of a plain enum implementing
//! `std::error::Error` (see `examples/tokio-rs-loom/src/rt/execution.rs`'s
//! handling of `InvalidAccess` style checks) rather than pulling in
//! `thiserror`: the set of violations is small, fixed, and each variant's
//! `Display` text is simple enough not to need derive machinery.

use crate::action::{ActionId, Location};
use crate::thread;
use std::fmt;

/// A correctness problem discovered while exploring an execution (spec
/// §4.7). Recorded on the active trace rather than causing an unwind — the
/// checker keeps exploring other schedules after recording one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// Two unordered accesses to the same location, at least one a write.
    DataRace {
        location: Location,
        first: ActionId,
        second: ActionId,
    },
    /// Every live thread is blocked (e.g. mutually waiting on a join).
    Deadlock { threads: Vec<thread::Id> },
    /// A user assertion inside the checked program failed.
    AssertionFailure { thread: thread::Id, message: String },
    /// A read observed a location before any write had reached it.
    UninitializedRead { location: Location, reader: ActionId },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::DataRace { location, first, second } => write!(
                f,
                "data race at {:?} between actions {:?} and {:?}",
                location, first, second
            ),
            Violation::Deadlock { threads } => write!(f, "deadlock among threads {:?}", threads),
            Violation::AssertionFailure { thread, message } => {
                write!(f, "assertion failed on {}: {}", thread, message)
            }
            Violation::UninitializedRead { location, reader } => {
                write!(f, "uninitialized read of {:?} by {:?}", location, reader)
            }
        }
    }
}

impl std::error::Error for Violation {}
