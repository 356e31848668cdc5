//! Incremental directed graph over store actions, used to decide whether a
//! total modification order can still exist (spec §3/§4.3, "CycleGraph").
//! Grounded on `examples/original_source/cyclegraph.{h,cc}`.

use crate::action::ActionId;
use std::collections::HashMap;

/// Arena index for a [`CycleNode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct NodeIdx(u32);

/// A node within a [`CycleGraph`]; corresponds to exactly one store action.
#[derive(Debug)]
struct CycleNode {
    action: ActionId,
    edges: Vec<NodeIdx>,
    back_edges: Vec<NodeIdx>,
    /// The rmw node that reads from this node, if any (spec §3, "RMW↦").
    rmw: Option<NodeIdx>,
}

impl CycleNode {
    fn new(action: ActionId) -> CycleNode {
        CycleNode {
            action,
            edges: Vec::new(),
            back_edges: Vec::new(),
            rmw: None,
        }
    }
}

/// One rollback-able mutation, recorded during a transactional epoch so
/// `rollback_changes` can undo it in reverse order.
#[derive(Debug)]
enum Change {
    Edge { from: NodeIdx, to: NodeIdx },
    Rmw { from: NodeIdx },
}

/// The modification-order cycle graph (spec §3, "CycleGraph").
///
/// Nodes wrap at most one store [`ActionId`]; edges mean "must-precede in
/// modification order." `has_cycles` is maintained incrementally: every
/// insertion runs a reachability check only if the graph is not already
/// known to be cyclic (spec invariant G2).
#[derive(Debug, Default)]
pub struct CycleGraph {
    nodes: Vec<CycleNode>,
    by_action: HashMap<ActionId, NodeIdx>,
    has_cycles: bool,

    /// Snapshot of `has_cycles` as of the last commit, used to validate and
    /// restore across a transactional epoch.
    old_cycles: bool,

    /// Mutations made since `start_changes`, in application order; undone in
    /// reverse by `rollback_changes`.
    changes: Vec<Change>,

    /// Scratch space for `checkReachable`'s DFS, reused across calls to
    /// avoid reallocating on every insertion.
    visited: Vec<bool>,
}

impl CycleGraph {
    pub fn new() -> CycleGraph {
        CycleGraph::default()
    }

    fn node_idx(&mut self, action: ActionId) -> NodeIdx {
        if let Some(&idx) = self.by_action.get(&action) {
            return idx;
        }
        let idx = NodeIdx(self.nodes.len() as u32);
        self.nodes.push(CycleNode::new(action));
        self.by_action.insert(action, idx);
        idx
    }

    /// `true` iff the graph currently contains a directed cycle (spec
    /// invariant G2).
    pub fn has_cycles(&self) -> bool {
        self.has_cycles
    }

    /// Adds a must-precede-`to` edge from `from`. Returns `true` iff a new
    /// edge was added (spec §4.3).
    ///
    /// If the edge is new and `from` has an RMW chain (spec §3's RMW↦) that
    /// doesn't already pass through `to`, the chain's tail also gets an edge
    /// to `to`, so the whole chain inherits the ordering constraint.
    pub fn add_edge(&mut self, from: ActionId, to: ActionId) -> bool {
        let from_idx = self.node_idx(from);
        let to_idx = self.node_idx(to);
        self.add_node_edge(from_idx, to_idx)
    }

    fn add_node_edge(&mut self, from: NodeIdx, to: NodeIdx) -> bool {
        if !self.link(from, to) {
            return false;
        }

        // Follow `from`'s RMW chain to its tail, stopping early if `to` is
        // encountered, and make the tail precede `to` too.
        let mut rmw = self.nodes[from.0 as usize].rmw;
        while let Some(cur) = rmw {
            if cur == to {
                break;
            }
            let next = self.nodes[cur.0 as usize].rmw;
            if next.is_none() {
                self.link(cur, to);
                break;
            }
            rmw = next;
        }

        true
    }

    /// Adds a single edge `from -> to` if not already present, updates
    /// `has_cycles` (only checking reachability if not already cyclic), and
    /// records the mutation for rollback.
    fn link(&mut self, from: NodeIdx, to: NodeIdx) -> bool {
        if self.nodes[from.0 as usize].edges.contains(&to) {
            return false;
        }

        self.nodes[from.0 as usize].edges.push(to);
        self.nodes[to.0 as usize].back_edges.push(from);
        self.changes.push(Change::Edge { from, to });

        if !self.has_cycles {
            self.has_cycles = self.reachable(to, from);
        }

        true
    }

    /// Adds an edge between a write and the rmw that reads from it (spec
    /// §4.3).
    ///
    /// Precondition: `rmw` has no rmw-predecessor recorded yet (checked by
    /// the caller via `CycleGraph::has_rmw_successor`). If `from` already
    /// has an rmw-successor, two rmws would be reading from the same write,
    /// which is impossible in a valid execution — `has_cycles` is set.
    /// Otherwise every outgoing edge of `from` except the one to `rmw`
    /// transfers onto `rmw` (anything ordered after `from` must also be
    /// ordered after the rmw-write), and then `from -> rmw` is linked —
    /// transfer before link, so the transferred edges can't race the final
    /// cycle check (see `examples/original_source/cyclegraph.cc`).
    pub fn add_rmw_edge(&mut self, from: ActionId, rmw: ActionId) {
        let from_idx = self.node_idx(from);
        let rmw_idx = self.node_idx(rmw);

        if self.nodes[from_idx.0 as usize].rmw.is_some() {
            self.has_cycles = true;
        } else {
            self.nodes[from_idx.0 as usize].rmw = Some(rmw_idx);
            self.changes.push(Change::Rmw { from: from_idx });
        }

        let outgoing: Vec<NodeIdx> = self.nodes[from_idx.0 as usize]
            .edges
            .iter()
            .copied()
            .filter(|&to| to != rmw_idx)
            .collect();
        for to in outgoing {
            self.link(rmw_idx, to);
        }

        self.add_node_edge(from_idx, rmw_idx);
    }

    pub fn has_rmw_successor(&self, action: ActionId) -> bool {
        self.by_action
            .get(&action)
            .map(|&idx| self.nodes[idx.0 as usize].rmw.is_some())
            .unwrap_or(false)
    }

    /// Depth-first search from `from`, following outgoing edges; `true` if
    /// `to` is reachable (spec §4.3).
    pub fn check_reachable(&mut self, from: ActionId, to: ActionId) -> bool {
        let (Some(&from_idx), Some(&to_idx)) = (self.by_action.get(&from), self.by_action.get(&to)) else {
            return false;
        };
        self.reachable(from_idx, to_idx)
    }

    fn reachable(&mut self, from: NodeIdx, to: NodeIdx) -> bool {
        self.visited.clear();
        self.visited.resize(self.nodes.len(), false);

        let mut stack = vec![from];
        self.visited[from.0 as usize] = true;

        while let Some(node) = stack.pop() {
            if node == to {
                return true;
            }
            for &next in &self.nodes[node.0 as usize].edges {
                if !self.visited[next.0 as usize] {
                    self.visited[next.0 as usize] = true;
                    stack.push(next);
                }
            }
        }
        false
    }

    /// Begins a transactional epoch. Asserts the prior epoch was committed
    /// or rolled back cleanly (spec §4.3's single-epoch model, see the Open
    /// Question in spec §9).
    pub fn start_changes(&mut self) {
        assert!(self.changes.is_empty(), "nested cycle-graph epochs are not supported");
        assert_eq!(self.old_cycles, self.has_cycles);
    }

    /// Commits the current epoch: clears the undo log and snapshots
    /// `has_cycles`.
    pub fn commit_changes(&mut self) {
        self.changes.clear();
        self.old_cycles = self.has_cycles;
    }

    /// Undoes every mutation made since `start_changes`, in reverse order,
    /// and restores `has_cycles` (spec §4.3, spec property P4).
    pub fn rollback_changes(&mut self) {
        while let Some(change) = self.changes.pop() {
            match change {
                Change::Edge { from, to } => {
                    let popped = self.nodes[from.0 as usize].edges.pop();
                    debug_assert_eq!(popped, Some(to), "rollback must undo edges in LIFO order");
                    if let Some(pos) = self.nodes[to.0 as usize]
                        .back_edges
                        .iter()
                        .rposition(|&n| n == from)
                    {
                        self.nodes[to.0 as usize].back_edges.remove(pos);
                    }
                }
                Change::Rmw { from } => {
                    self.nodes[from.0 as usize].rmw = None;
                }
            }
        }
        self.has_cycles = self.old_cycles;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a(n: u32) -> ActionId {
        ActionId(n)
    }

    #[test]
    fn acyclic_additions_do_not_set_has_cycles() {
        let mut g = CycleGraph::new();
        assert!(g.add_edge(a(1), a(2)));
        assert!(g.add_edge(a(2), a(3)));
        assert!(!g.has_cycles());
    }

    #[test]
    fn duplicate_edge_is_a_no_op() {
        let mut g = CycleGraph::new();
        assert!(g.add_edge(a(1), a(2)));
        assert!(!g.add_edge(a(1), a(2)));
    }

    #[test]
    fn introducing_a_cycle_sets_has_cycles() {
        let mut g = CycleGraph::new();
        g.add_edge(a(1), a(2));
        g.add_edge(a(2), a(3));
        g.add_edge(a(3), a(1));
        assert!(g.has_cycles());
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let mut g = CycleGraph::new();
        g.add_edge(a(1), a(1));
        assert!(g.has_cycles());
    }

    #[test]
    fn check_reachable_follows_transitive_edges() {
        let mut g = CycleGraph::new();
        g.add_edge(a(1), a(2));
        g.add_edge(a(2), a(3));
        assert!(g.check_reachable(a(1), a(3)));
        assert!(!g.check_reachable(a(3), a(1)));
    }

    #[test]
    fn rmw_edge_transfers_outgoing_edges_to_the_rmw_node() {
        let mut g = CycleGraph::new();
        // a(1) -> a(4): something already ordered after the original write.
        g.add_edge(a(1), a(4));
        // a(2) reads-modifies-writes a(1): a(2) should inherit a(1) -> a(4).
        g.add_rmw_edge(a(1), a(2));
        assert!(g.check_reachable(a(2), a(4)));
        assert!(!g.has_cycles());
    }

    #[test]
    fn two_rmws_reading_the_same_write_is_a_cycle() {
        let mut g = CycleGraph::new();
        g.add_rmw_edge(a(1), a(2));
        g.add_rmw_edge(a(1), a(3));
        assert!(g.has_cycles());
    }

    #[test]
    fn rollback_restores_exact_prior_state() {
        let mut g = CycleGraph::new();
        g.add_edge(a(1), a(2));
        g.commit_changes();

        g.start_changes();
        g.add_edge(a(2), a(1)); // would cycle
        assert!(g.has_cycles());
        g.rollback_changes();

        assert!(!g.has_cycles());
        assert!(g.check_reachable(a(1), a(2)));
        assert!(!g.check_reachable(a(2), a(1)));
    }

    #[test]
    fn rollback_undoes_rmw_link_too() {
        let mut g = CycleGraph::new();
        g.commit_changes();

        g.start_changes();
        g.add_rmw_edge(a(1), a(2));
        assert!(g.has_rmw_successor(a(1)));
        g.rollback_changes();

        assert!(!g.has_rmw_successor(a(1)));
    }

    #[test]
    #[should_panic]
    fn start_changes_rejects_nested_epochs() {
        let mut g = CycleGraph::new();
        g.start_changes();
        g.add_edge(a(1), a(2));
        g.start_changes();
    }
}
