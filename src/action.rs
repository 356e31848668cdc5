//! One atomic event and its derived relations.
//!
//! Mirrors `action.h`'s `ModelAction` (see `examples/original_source/action.h`):
//! a value object carrying identity, ordering, location, and payload, plus
//! the predicates the checker and cycle graph need to classify it.

use crate::clock::ClockVector;
use crate::node_stack::NodeId;
use crate::thread;

use std::sync::atomic::Ordering;

/// Sentinel value for an action with no meaningful payload (thread
/// create/yield/join).
pub const VALUE_NONE: i64 = -1;

/// The kind of atomic event an [`Action`] represents (spec §3, "type").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "checkpoint", derive(serde::Serialize, serde::Deserialize))]
pub enum ActionKind {
    ThreadCreate,
    ThreadYield,
    ThreadJoin,
    AtomicRead,
    AtomicWrite,
    AtomicRmw,
}

/// Opaque identity of a memory location.
///
/// Per spec §3: "equality is the only operation." Locations are allocated by
/// the harness and handed to the checker as an opaque `u64`; the checker
/// never dereferences them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "checkpoint", derive(serde::Serialize, serde::Deserialize))]
pub struct Location(pub u64);

/// Arena index identifying an [`Action`] within a [`crate::checker::Checker`]'s
/// trace.
///
/// The original C++ identifies actions by pointer; this crate instead
/// assigns a dense index at insertion time (spec §9, "model as arena +
/// indices"), which both `CycleGraph` and `NodeStack` key off of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "checkpoint", derive(serde::Serialize, serde::Deserialize))]
pub struct ActionId(pub(crate) u32);

impl ActionId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// One atomic event (spec §3, "Action").
#[derive(Debug, Clone)]
#[cfg_attr(feature = "checkpoint", derive(serde::Serialize, serde::Deserialize))]
pub struct Action {
    kind: ActionKind,
    order: Ordering,
    location: Location,
    tid: thread::Id,
    value: i64,

    /// Assigned exactly once, at enqueue time (spec §4.1).
    seq_number: u32,

    /// Back-reference to the owning `NodeStack` node. `None` until
    /// `set_node` is called, which happens exactly once, before the action
    /// is placed on the trace.
    node: Option<NodeId>,

    /// The write this action reads from, if it is a read or rmw.
    reads_from: Option<ActionId>,

    /// Present only for actions that participate in synchronization: writes
    /// with release semantics or stronger, reads, rmw, thread create/join
    /// (spec §3, "cv").
    cv: Option<ClockVector>,
}

impl Action {
    /// Constructs a new action. Mirrors `ModelAction`'s constructor (spec
    /// §4.1): records `type`, `order`, `location`, `value` and nothing
    /// derived. `seq_number` and `node` are filled in later by the driver.
    pub fn new(kind: ActionKind, order: Ordering, location: Location, tid: thread::Id, value: i64) -> Action {
        Action {
            kind,
            order,
            location,
            tid,
            value,
            seq_number: 0,
            node: None,
            reads_from: None,
            cv: None,
        }
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn order(&self) -> Ordering {
        self.order
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn tid(&self) -> thread::Id {
        self.tid
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    pub fn seq_number(&self) -> u32 {
        self.seq_number
    }

    /// Assigns the sequence number. Called exactly once by the driver at
    /// enqueue time (spec §4.1).
    pub(crate) fn set_seq_number(&mut self, seq: u32) {
        debug_assert_eq!(self.seq_number, 0, "seq_number assigned twice");
        self.seq_number = seq;
    }

    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    /// Attaches the owning node. Called exactly once, before the action is
    /// placed on the trace (spec §4.1).
    pub(crate) fn set_node(&mut self, node: NodeId) {
        debug_assert!(self.node.is_none(), "set_node called twice");
        self.node = Some(node);
    }

    pub fn reads_from(&self) -> Option<ActionId> {
        self.reads_from
    }

    pub fn cv(&self) -> Option<&ClockVector> {
        self.cv.as_ref()
    }

    // -- derived predicates (spec §3) --

    pub fn is_read(&self) -> bool {
        matches!(self.kind, ActionKind::AtomicRead | ActionKind::AtomicRmw)
    }

    pub fn is_write(&self) -> bool {
        matches!(self.kind, ActionKind::AtomicWrite | ActionKind::AtomicRmw)
    }

    pub fn is_rmw(&self) -> bool {
        matches!(self.kind, ActionKind::AtomicRmw)
    }

    /// Acquire-or-stronger on a read/rmw.
    pub fn is_acquire(&self) -> bool {
        self.is_read()
            && matches!(self.order, Ordering::Acquire | Ordering::AcqRel | Ordering::SeqCst)
    }

    /// Release-or-stronger on a write/rmw.
    pub fn is_release(&self) -> bool {
        self.is_write()
            && matches!(self.order, Ordering::Release | Ordering::AcqRel | Ordering::SeqCst)
    }

    pub fn is_seqcst(&self) -> bool {
        self.order == Ordering::SeqCst
    }

    pub fn same_location(&self, other: &Action) -> bool {
        self.location == other.location
    }

    pub fn same_thread(&self, other: &Action) -> bool {
        self.tid == other.tid
    }

    /// Two actions are *dependent* (spec §4.6, `get_last_conflict`) if they
    /// touch the same location and at least one is a write. Thread
    /// create/yield/join are never dependent.
    pub fn is_dependent(&self, other: &Action) -> bool {
        if matches!(
            self.kind,
            ActionKind::ThreadCreate | ActionKind::ThreadYield | ActionKind::ThreadJoin
        ) || matches!(
            other.kind,
            ActionKind::ThreadCreate | ActionKind::ThreadYield | ActionKind::ThreadJoin
        ) {
            return false;
        }
        self.same_location(other) && (self.is_write() || other.is_write())
    }

    /// Records the reads-from link and derives this action's clock vector
    /// from `writer`'s, per spec §4.1:
    ///
    /// > the new clock vector takes the max of the reading thread's prior
    /// > clock and the writer's clock; if the read is acquire, the merge is
    /// > applied, otherwise only the thread bump is recorded.
    pub(crate) fn read_from(&mut self, writer_id: ActionId, writer: &Action, reader_prior: &ClockVector) {
        self.reads_from = Some(writer_id);

        let mut cv = reader_prior.clone();
        cv.write(self.tid, self.seq_number);

        if self.is_acquire() {
            if let Some(writer_cv) = writer.cv() {
                cv.merge(writer_cv);
            }
        }

        self.cv = Some(cv);
    }

    /// Creates this action's clock vector from `parent`'s (the prior action
    /// of the same thread in program order), bumping this thread. Used for
    /// writes, thread-create/join, and as the base before `read_from` is
    /// layered on for reads.
    pub(crate) fn create_cv(&mut self, parent: Option<&ClockVector>) {
        let mut cv = parent.cloned().unwrap_or_default();
        cv.write(self.tid, self.seq_number);
        self.cv = Some(cv);
    }

    /// Merges another clock vector into this action's (used when a
    /// thread-join or thread-create needs to absorb the joined thread's
    /// causality).
    pub(crate) fn merge_cv(&mut self, other: &ClockVector) {
        let cv = self.cv.get_or_insert_with(ClockVector::new);
        cv.merge(other);
    }

    /// `this.cv[other.tid] >= other.seq_number` (spec §4.1).
    pub fn happens_before(&self, other: &Action) -> bool {
        match &self.cv {
            Some(cv) => cv.happens_after(other.tid, other.seq_number),
            None => false,
        }
    }
}
