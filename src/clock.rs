//! Vector clocks over the live thread set.
//!
//! A [`ClockVector`] maps each thread id to the highest sequence number of
//! that thread's actions known to have happened before the point the vector
//! was captured at. This is the concrete representation of happens-before
//! (spec §3, "ClockVector").

use crate::thread;
use std::cmp;

/// A vector clock, dense over the threads observed so far.
///
/// Unlike the teacher's `VersionVec` (a fixed `[u16; MAX_THREADS]` array),
/// this grows on demand as new thread ids are observed, per spec §3's
/// "ClockVector ... dense over the live thread set" and §4.2's "size grows
/// on demand to cover new thread ids". A vector never shrinks: once a slot
/// exists it is only ever increased by `merge`/`write`.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
#[cfg_attr(feature = "checkpoint", derive(serde::Serialize, serde::Deserialize))]
pub struct ClockVector {
    entries: Vec<u32>,
}

impl ClockVector {
    /// An empty clock vector (all entries implicitly zero).
    pub fn new() -> ClockVector {
        ClockVector {
            entries: Vec::new(),
        }
    }

    /// Builds a fresh clock vector for `thread`, seeded from `parent`'s
    /// vector and immediately bumped for `thread` itself.
    ///
    /// This is the "construct-from-parent" operation of spec §4.2: "copies
    /// and bumps the acting thread."
    pub fn from_parent(parent: &ClockVector, thread: thread::Id, seq: u32) -> ClockVector {
        let mut cv = parent.clone();
        cv.write(thread, seq);
        cv
    }

    fn ensure_len(&mut self, thread: thread::Id) {
        let idx = thread.as_usize();
        if self.entries.len() <= idx {
            self.entries.resize(idx + 1, 0);
        }
    }

    /// Returns the highest sequence number observed for `thread`.
    pub fn read(&self, thread: thread::Id) -> u32 {
        self.entries.get(thread.as_usize()).copied().unwrap_or(0)
    }

    /// Records that `thread`'s action with sequence number `seq` is now
    /// known to this vector. No-op if the vector already records a sequence
    /// number `>= seq` for `thread` (clocks never move backwards).
    pub fn write(&mut self, thread: thread::Id, seq: u32) {
        self.ensure_len(thread);
        let slot = &mut self.entries[thread.as_usize()];
        *slot = cmp::max(*slot, seq);
    }

    /// Componentwise maximum of `self` and `other`, in place.
    pub fn merge(&mut self, other: &ClockVector) {
        if other.entries.len() > self.entries.len() {
            self.entries.resize(other.entries.len(), 0);
        }
        for (slot, &value) in self.entries.iter_mut().zip(other.entries.iter()) {
            *slot = cmp::max(*slot, value);
        }
    }

    /// Returns `true` if `self` dominates `other`: every entry of `self` is
    /// `>=` the corresponding entry of `other`.
    pub fn dominates(&self, other: &ClockVector) -> bool {
        let len = cmp::max(self.entries.len(), other.entries.len());
        (0..len).all(|i| {
            let a = self.entries.get(i).copied().unwrap_or(0);
            let b = other.entries.get(i).copied().unwrap_or(0);
            a >= b
        })
    }

    /// `true` iff `self.read(thread) >= seq`, the per-action happens-before
    /// test of spec §3's Invariant I4.
    pub fn happens_after(&self, thread: thread::Id, seq: u32) -> bool {
        self.read(thread) >= seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(i: usize) -> thread::Id {
        thread::Id::new(i)
    }

    #[test]
    fn write_then_read() {
        let mut cv = ClockVector::new();
        cv.write(t(0), 5);
        assert_eq!(cv.read(t(0)), 5);
        assert_eq!(cv.read(t(1)), 0);
    }

    #[test]
    fn write_never_regresses() {
        let mut cv = ClockVector::new();
        cv.write(t(0), 5);
        cv.write(t(0), 2);
        assert_eq!(cv.read(t(0)), 5);
    }

    #[test]
    fn merge_is_componentwise_max() {
        let mut a = ClockVector::new();
        a.write(t(0), 3);
        a.write(t(1), 1);

        let mut b = ClockVector::new();
        b.write(t(0), 1);
        b.write(t(2), 7);

        a.merge(&b);
        assert_eq!(a.read(t(0)), 3);
        assert_eq!(a.read(t(1)), 1);
        assert_eq!(a.read(t(2)), 7);
    }

    #[test]
    fn dominates_is_pointwise_ge() {
        let mut a = ClockVector::new();
        a.write(t(0), 3);

        let mut b = ClockVector::new();
        b.write(t(0), 2);

        assert!(a.dominates(&b));
        assert!(!b.dominates(&a));
        assert!(a.dominates(&a));
    }

    #[test]
    fn from_parent_copies_and_bumps() {
        let mut parent = ClockVector::new();
        parent.write(t(1), 9);

        let child = ClockVector::from_parent(&parent, t(0), 4);
        assert_eq!(child.read(t(1)), 9);
        assert_eq!(child.read(t(0)), 4);
    }

    #[test]
    fn happens_after_matches_read() {
        let mut cv = ClockVector::new();
        cv.write(t(0), 5);
        assert!(cv.happens_after(t(0), 5));
        assert!(cv.happens_after(t(0), 3));
        assert!(!cv.happens_after(t(0), 6));
    }
}
