//! A single choice point in the DPOR backtracking tree (spec §3, "Node";
//! §4.4). Grounded on `examples/original_source/nodestack.h`'s `Node` class.

use crate::action::ActionId;
use crate::node_stack::NodeId;
use crate::thread;

/// One node in the [`crate::node_stack::NodeStack`].
///
/// A node is created the first time a given point in the trace is reached
/// and is then reused across every replay that passes through it. It
/// records which thread choices have already been explored from this point
/// (`explored_children`), which thread choices are still queued
/// (`backtrack`), and — when the associated action is a read — the write
/// actions it could plausibly read from (`may_read_from`).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "checkpoint", derive(serde::Serialize, serde::Deserialize))]
pub struct Node {
    action: Option<ActionId>,
    parent: Option<NodeId>,

    /// `explored_children[tid]` is `true` once a child has been created for
    /// `tid` at this node.
    explored_children: Vec<bool>,

    /// `backtrack[tid]` is `true` if `tid` is a pending alternative to
    /// explore from this node.
    backtrack: Vec<bool>,

    /// Count of `true` entries in `backtrack`, kept incrementally so
    /// `backtrack_empty` and bookkeeping in `explore_child` are O(1).
    num_backtracks: usize,

    /// Threads considered runnable by the scheduler at the moment this node
    /// was created. Enabledness is frozen with the node (spec §4.4).
    enabled: Vec<bool>,

    /// Candidate writes this node's (read) action could observe, in
    /// discovery order.
    may_read_from: Vec<ActionId>,
    next_read_from: usize,
}

impl Node {
    pub(crate) fn new(parent: Option<NodeId>, enabled: Vec<bool>) -> Node {
        Node {
            action: None,
            parent,
            explored_children: Vec::new(),
            backtrack: Vec::new(),
            num_backtracks: 0,
            enabled,
            may_read_from: Vec::new(),
            next_read_from: 0,
        }
    }

    pub fn action(&self) -> Option<ActionId> {
        self.action
    }

    pub(crate) fn set_action(&mut self, action: ActionId) {
        self.action = Some(action);
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    fn ensure_thread_slots(&mut self, tid: thread::Id) {
        let idx = tid.as_usize();
        if self.explored_children.len() <= idx {
            self.explored_children.resize(idx + 1, false);
            self.backtrack.resize(idx + 1, false);
        }
    }

    /// Marks `tid` as explored from this node and clears any pending
    /// backtrack entry for it (spec §4.4).
    pub(crate) fn explore_child(&mut self, tid: thread::Id) {
        self.ensure_thread_slots(tid);
        self.explored_children[tid.as_usize()] = true;

        let idx = tid.as_usize();
        if self.backtrack[idx] {
            self.backtrack[idx] = false;
            self.num_backtracks -= 1;
        }
    }

    /// `true` iff a child has already been explored for `tid`.
    pub fn has_been_explored(&self, tid: thread::Id) -> bool {
        self.explored_children
            .get(tid.as_usize())
            .copied()
            .unwrap_or(false)
    }

    /// Flags `tid` as a pending backtrack point. Returns `false` if it was
    /// already set (spec §4.4).
    pub(crate) fn set_backtrack(&mut self, tid: thread::Id) -> bool {
        self.ensure_thread_slots(tid);
        let idx = tid.as_usize();
        if self.backtrack[idx] {
            return false;
        }
        self.backtrack[idx] = true;
        self.num_backtracks += 1;
        true
    }

    /// Returns some thread id currently flagged in `backtrack`, if any.
    /// Selection is deterministic (lowest thread id), matching the
    /// requirement in spec §4.4 that selection be "deterministic given the
    /// same trace."
    pub(crate) fn next_backtrack(&self) -> Option<thread::Id> {
        self.backtrack
            .iter()
            .position(|&set| set)
            .map(thread::Id::new)
    }

    pub fn backtrack_empty(&self) -> bool {
        self.num_backtracks == 0
    }

    /// `true` iff `thread` was considered runnable when this node was
    /// created.
    pub fn is_enabled(&self, thread: thread::Id) -> bool {
        self.enabled.get(thread.as_usize()).copied().unwrap_or(false)
    }

    pub(crate) fn add_read_from(&mut self, act: ActionId) {
        self.may_read_from.push(act);
    }

    /// Pops the next untried candidate write. Repeated calls iterate the
    /// full candidate set exactly once per node lifetime.
    pub(crate) fn next_read_from(&mut self) -> Option<ActionId> {
        let next = self.may_read_from.get(self.next_read_from).copied();
        if next.is_some() {
            self.next_read_from += 1;
        }
        next
    }

    pub fn may_read_from(&self) -> &[ActionId] {
        &self.may_read_from
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(i: usize) -> thread::Id {
        thread::Id::new(i)
    }

    #[test]
    fn explore_child_clears_backtrack() {
        let mut n = Node::new(None, vec![true, true]);
        n.set_backtrack(t(1));
        assert!(!n.backtrack_empty());

        n.explore_child(t(1));
        assert!(n.backtrack_empty());
        assert!(n.has_been_explored(t(1)));
    }

    #[test]
    fn set_backtrack_is_idempotent() {
        let mut n = Node::new(None, vec![true]);
        assert!(n.set_backtrack(t(0)));
        assert!(!n.set_backtrack(t(0)));
    }

    #[test]
    fn next_backtrack_is_deterministic() {
        let mut n = Node::new(None, vec![true, true, true]);
        n.set_backtrack(t(2));
        n.set_backtrack(t(0));
        assert_eq!(n.next_backtrack(), Some(t(0)));
    }

    #[test]
    fn read_from_candidates_iterate_once() {
        let mut n = Node::new(None, vec![true]);
        n.add_read_from(ActionId(1));
        n.add_read_from(ActionId(2));

        assert_eq!(n.next_read_from(), Some(ActionId(1)));
        assert_eq!(n.next_read_from(), Some(ActionId(2)));
        assert_eq!(n.next_read_from(), None);
    }

    #[test]
    fn enabledness_is_frozen_at_creation() {
        let n = Node::new(None, vec![true, false]);
        assert!(n.is_enabled(t(0)));
        assert!(!n.is_enabled(t(1)));
        assert!(!n.is_enabled(t(2)), "out of range thread treated as disabled");
    }
}
