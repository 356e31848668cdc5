//! Thread identity.
//!
//! Threads are identified by a small integer, dense over the live thread set
//! of a single execution. Identity is intentionally cheap to copy: `Id` shows
//! up in almost every hot path (clock vectors, cycle graph nodes, backtrack
//! sets).

use std::fmt;

/// Maximum number of threads a single execution may register.
///
/// Kept small and fixed, as in the teacher crate, since the number of
/// interleavings explored grows combinatorially with thread count.
pub const MAX_THREADS: usize = 16;

/// Identifies a single modeled thread within one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "checkpoint", derive(serde::Serialize, serde::Deserialize))]
pub struct Id(u16);

impl Id {
    pub(crate) const INITIAL: Id = Id(0);

    pub(crate) fn new(index: usize) -> Id {
        assert!(index < MAX_THREADS, "exceeded MAX_THREADS ({MAX_THREADS})");
        Id(index as u16)
    }

    pub(crate) fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Encodes this id as the payload value a `ThreadJoin` action carries to
    /// name its target (spec §6: join actions identify the joined thread
    /// through the action's `value` field rather than a dedicated one).
    pub fn as_value(self) -> i64 {
        self.0 as i64
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Tracks thread parentage (who called `register_thread` for whom).
///
/// `set_backtracking`'s ancestor walk (spec §4.6) needs to find, starting
/// from a given thread, the nearest ancestor thread that was already enabled
/// at a particular node. `Registry` makes that walk meaningful by recording
/// which thread created which.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    parent: Vec<Option<Id>>,
}

impl Registry {
    pub(crate) fn new() -> Registry {
        Registry { parent: Vec::new() }
    }

    /// Registers a new thread created by `creator`, returning its `Id`.
    pub(crate) fn register(&mut self, creator: Option<Id>) -> Id {
        let id = Id::new(self.parent.len());
        self.parent.push(creator);
        id
    }

    pub(crate) fn parent(&self, id: Id) -> Option<Id> {
        self.parent[id.as_usize()]
    }

    pub(crate) fn reset(&mut self) {
        self.parent.clear();
    }
}
