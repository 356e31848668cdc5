//! The exploration driver: ties together [`crate::action`], [`crate::clock`],
//! [`crate::cycle_graph`] and [`crate::node_stack`] into the DPOR loop (spec
//! §4.6, "ModelChecker"). Grounded on `examples/original_source/model.cc`'s
//! `ModelChecker::checkDataRaces`/`initiate_scheduler`/`isfeasible` family,
//! reshaped around the arena-index action/node representation already built
//! in this crate rather than the original's pointer graph.

use crate::action::{Action, ActionId, Location};
use crate::clock::ClockVector;
use crate::cycle_graph::CycleGraph;
use crate::error::Violation;
use crate::node_stack::{NodeId, NodeStack};
use crate::scheduler::Scheduler;
use crate::thread;

use std::collections::HashMap;
use std::sync::atomic::Ordering;

/// A pending alternative exploration, recorded the instant a conflict is
/// found: the conflicting action whose decision point still has another
/// thread to try, and the trace as it stood at that point (spec §3,
/// "Backtrack"). `Checker::next_execution` pops these in LIFO order —
/// the usual depth-first backtracking order, deepest divergence first.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "checkpoint", derive(serde::Serialize, serde::Deserialize))]
pub struct Backtrack {
    pub divergence: ActionId,
    pub trace: Vec<ActionId>,
}

/// Owns every action ever recorded, the backtracking tree, the
/// modification-order graph, and per-thread/per-location bookkeeping needed
/// to resolve new actions as they're submitted.
#[derive(Debug)]
pub struct Checker {
    actions: Vec<Action>,
    /// Ids of actions recorded during the current execution, in commit
    /// order. Cleared by `reset_to_initial_state`.
    trace: Vec<ActionId>,

    node_stack: NodeStack,
    cycle_graph: CycleGraph,
    scheduler: Scheduler,
    registry: thread::Registry,

    /// Pending alternatives discovered but not yet explored, popped in LIFO
    /// order by `next_execution` (spec §3/§4.6).
    backtrack_list: Vec<Backtrack>,

    last_action: Vec<Option<ActionId>>,
    thread_seq: Vec<u32>,
    writes_by_location: HashMap<Location, Vec<ActionId>>,

    violations: Vec<Violation>,
    current_node: NodeId,
    initial_thread: Option<thread::Id>,
    executions: usize,

    /// `joining[a] == b` while `a` is blocked inside a join on `b` that
    /// hasn't exited yet. Used to detect join deadlocks by walking the
    /// wait-for graph this forms back to its start (spec §8, "deadlock via
    /// join"); not modeled in the original, which has no equivalent.
    joining: HashMap<thread::Id, thread::Id>,
}

/// The persisted shape of [`Checker::checkpoint_state`].
#[cfg(feature = "checkpoint")]
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CheckpointState {
    node_stack: NodeStack,
    backtrack_list: Vec<Backtrack>,
    executions: usize,
}

impl Default for Checker {
    fn default() -> Checker {
        Checker::new()
    }
}

impl Checker {
    pub fn new() -> Checker {
        let node_stack = NodeStack::new(Vec::new());
        let root = node_stack.root();
        Checker {
            actions: Vec::new(),
            trace: Vec::new(),
            node_stack,
            cycle_graph: CycleGraph::new(),
            scheduler: Scheduler::new(),
            registry: thread::Registry::new(),
            backtrack_list: Vec::new(),
            last_action: Vec::new(),
            thread_seq: Vec::new(),
            writes_by_location: HashMap::new(),
            violations: Vec::new(),
            current_node: root,
            initial_thread: None,
            executions: 0,
            joining: HashMap::new(),
        }
    }

    fn ensure_thread_slots(&mut self, tid: thread::Id) {
        let idx = tid.as_usize();
        if self.last_action.len() <= idx {
            self.last_action.resize(idx + 1, None);
            self.thread_seq.resize(idx + 1, 0);
        }
    }

    /// Registers a new thread, enabling it in the scheduler (spec §4.8). The
    /// first call establishes the program's initial thread, re-enabled on
    /// every `reset_to_initial_state`.
    pub fn spawn_thread(&mut self, parent: Option<thread::Id>) -> thread::Id {
        let tid = self.registry.register(parent);
        self.ensure_thread_slots(tid);
        self.scheduler.add_thread(tid);
        if self.initial_thread.is_none() {
            self.initial_thread = Some(tid);
        }
        tid
    }

    pub fn exit_thread(&mut self, tid: thread::Id) {
        self.scheduler.remove_thread(tid);
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn executions(&self) -> usize {
        self.executions
    }

    pub fn total_nodes(&self) -> usize {
        self.node_stack.total_nodes()
    }

    fn next_seq(&mut self, tid: thread::Id) -> u32 {
        self.ensure_thread_slots(tid);
        let slot = &mut self.thread_seq[tid.as_usize()];
        *slot += 1;
        *slot
    }

    fn prior_cv(&self, tid: thread::Id) -> Option<ClockVector> {
        self.last_action
            .get(tid.as_usize())
            .copied()
            .flatten()
            .and_then(|id| self.actions[id.index()].cv().cloned())
    }

    /// Records one atomic event and returns its id. This is the single entry
    /// point the harness drives the checked program through (spec §4.1,
    /// §6).
    pub fn record_action(
        &mut self,
        kind: crate::action::ActionKind,
        order: Ordering,
        location: Location,
        tid: thread::Id,
        value: i64,
    ) -> ActionId {
        use crate::action::ActionKind::*;

        let seq = self.next_seq(tid);
        let mut action = Action::new(kind, order, location, tid, value);
        action.set_seq_number(seq);
        action.create_cv(self.prior_cv(tid).as_ref());

        let id = ActionId(self.actions.len() as u32);
        let parent_node = self.current_node;

        let enabled = self.scheduler.enabled_snapshot();
        let node_id = self.node_stack.explore_action(parent_node, enabled);
        action.set_node(node_id);
        self.node_stack.get_mut(node_id).set_action(id);

        match kind {
            AtomicRead => self.resolve_read(&mut action, id, node_id),
            AtomicWrite => self.resolve_write(id, location),
            AtomicRmw => {
                self.resolve_read(&mut action, id, node_id);
                if let Some(writer) = action.reads_from() {
                    self.cycle_graph.add_rmw_edge(writer, id);
                }
                self.writes_by_location.entry(location).or_default().push(id);
            }
            ThreadJoin => {
                let joined = thread::Id::new(value as usize);
                if self.scheduler.is_enabled(joined) {
                    // `joined` hasn't exited yet: this join blocks until it
                    // does. Record the wait-for edge and check whether it
                    // closes a cycle (spec §8, "deadlock via join").
                    self.joining.insert(tid, joined);
                    if let Some(threads) = self.find_join_cycle(tid) {
                        self.violations.push(Violation::Deadlock { threads });
                    }
                } else {
                    self.joining.remove(&tid);
                    if let Some(joined_cv) = self.prior_cv(joined) {
                        action.merge_cv(&joined_cv);
                    }
                }
            }
            ThreadCreate | ThreadYield => {}
        }

        // Conflict/backtrack detection runs against the trace as it stood
        // before this action, and before `tid` is marked explored at
        // `parent_node` — otherwise a backtrack point set here for `tid`
        // would be immediately wiped out by `explore_child` below when the
        // conflict is the action immediately preceding this one (spec §4.6,
        // mirrors `model.cc`'s `set_backtracking(curr)` running before
        // `currentNode->explore_child(curr)`).
        if let Some(conflict) = self.find_conflict(&action) {
            self.set_backtracking(conflict, tid);
        }

        self.node_stack.get_mut(parent_node).explore_child(tid);
        self.current_node = node_id;

        self.actions.push(action);
        self.last_action[tid.as_usize()] = Some(id);
        self.trace.push(id);

        id
    }

    fn resolve_write(&mut self, id: ActionId, location: Location) {
        if let Some(&last) = self.writes_by_location.get(&location).and_then(|w| w.last()) {
            self.cycle_graph.add_edge(last, id);
        }
        self.writes_by_location.entry(location).or_default().push(id);
    }

    /// Resolves a read (or the read half of an rmw) against the writes seen
    /// so far to its location: records every prior write as a candidate on
    /// this action's node (spec §4.6, "reads-from alternatives") and reads
    /// from the most recent one by default. Candidates beyond the default
    /// are surfaced through `may_read_from` for diagnostics; exploring them
    /// is driven by backtracking on the writer's thread, not by re-walking
    /// this list.
    fn resolve_read(&mut self, action: &mut Action, id: ActionId, node_id: NodeId) {
        let candidates = self.writes_by_location.get(&action.location()).cloned().unwrap_or_default();
        let node = self.node_stack.get_mut(node_id);
        for &w in &candidates {
            node.add_read_from(w);
        }

        match candidates.last().copied() {
            Some(writer_id) => {
                let reader_prior = action.cv().cloned().unwrap_or_default();
                let writer = self.actions[writer_id.index()].clone();
                action.read_from(writer_id, &writer, &reader_prior);
            }
            None => self.violations.push(Violation::UninitializedRead {
                location: action.location(),
                reader: id,
            }),
        }
    }

    /// Walks the trace backwards for the most recent recorded action that
    /// conflicts with `id` (same location, one a write) and is not already
    /// ordered by happens-before in either direction (spec §4.6,
    /// `get_last_conflict`). Exposed for analyses/tests that already have an
    /// `ActionId`; `record_action` uses `find_conflict` directly since its
    /// own action isn't in the arena yet when this check runs.
    pub fn get_last_conflict(&self, id: ActionId) -> Option<ActionId> {
        self.find_conflict(&self.actions[id.index()])
    }

    fn find_conflict(&self, action: &Action) -> Option<ActionId> {
        self.trace
            .iter()
            .rev()
            .copied()
            .find(|&other| {
                let other_action = &self.actions[other.index()];
                action.is_dependent(other_action)
                    && !action.happens_before(other_action)
                    && !other_action.happens_before(action)
            })
    }

    /// Records a backtrack point so a future execution interleaves a thread
    /// `tid` before `conflict` instead of after. `conflict`'s own node
    /// records what ran *after* conflict, so the alternative belongs on its
    /// *parent* — the decision point whose children are every thread that
    /// could have run in conflict's place. Enabledness is still checked
    /// against conflict's own node, since that snapshot was taken at the
    /// instant conflict's thread was actually chosen, while the parent's may
    /// predate a thread spawned in between (spec §4.6, supplemented from
    /// `examples/original_source/model.cc`'s `set_backtracking`). If `tid`
    /// isn't enabled there, walks up the thread-creation chain to the
    /// nearest ancestor that is, since scheduling the ancestor earlier is
    /// what would make `tid` exist in time to race differently.
    pub fn set_backtracking(&mut self, conflict: ActionId, tid: thread::Id) {
        let Some(conflict_node) = self.actions[conflict.index()].node() else {
            return;
        };
        let Some(decision_node) = self.node_stack.get(conflict_node).parent() else {
            return;
        };

        let mut candidate = Some(tid);
        while let Some(tid) = candidate {
            if self.node_stack.get(conflict_node).is_enabled(tid) {
                let node = self.node_stack.get(decision_node);
                // Already tried as this node's child in some prior
                // execution: nothing new to explore.
                if !node.has_been_explored(tid) {
                    let newly_set = self.node_stack.get_mut(decision_node).set_backtrack(tid);
                    if newly_set {
                        // Record the `Backtrack` itself (spec §3): the
                        // divergence point plus the trace as it stood the
                        // instant this alternative was discovered, so a
                        // future `next_execution` can pop it and replay up
                        // to `conflict` without re-deriving anything.
                        self.backtrack_list.push(Backtrack {
                            divergence: conflict,
                            trace: self.trace.clone(),
                        });
                    }
                }
                return;
            }
            candidate = self.registry.parent(tid);
        }
    }

    /// The thread named by the most recently discovered pending
    /// [`Backtrack`], if any (spec §4.6, `advance_backtracking_state`).
    pub fn advance_backtracking_state(&self) -> Option<thread::Id> {
        let bt = self.backtrack_list.last()?;
        let node = self.actions[bt.divergence.index()].node()?;
        self.node_stack.get(node).next_backtrack()
    }

    /// The pending backtrack list, in the order they'll be popped.
    pub fn backtrack_list(&self) -> &[Backtrack] {
        &self.backtrack_list
    }

    pub fn current_node(&self) -> NodeId {
        self.current_node
    }

    /// Rewinds execution-local state without discarding the backtracking
    /// tree, so the next execution replays existing nodes and only grows the
    /// arena past where this trace previously reached (spec §4.6).
    pub fn reset_to_initial_state(&mut self) {
        self.node_stack.reset_execution();
        self.current_node = self.node_stack.root();
        self.trace.clear();
        self.writes_by_location.clear();
        self.joining.clear();
        for slot in &mut self.last_action {
            *slot = None;
        }
        for slot in &mut self.thread_seq {
            *slot = 0;
        }

        // Thread ids must be assigned identically on every replay, since
        // nodes key their enabled/backtrack bookkeeping by id: a program
        // that spawns threads in the same order every run gets the same ids
        // back.
        self.registry.reset();

        self.scheduler = Scheduler::new();
        if let Some(initial) = self.initial_thread {
            self.scheduler.add_thread(initial);
        }
    }

    /// `true` iff a [`Backtrack`] remains to explore (spec §4.6,
    /// "Termination: `next_execution` returns false when `backtrack_list`
    /// is empty").
    pub fn has_next_execution(&self) -> bool {
        !self.backtrack_list.is_empty()
    }

    /// Pops the most recently recorded [`Backtrack`] (LIFO) and rewinds
    /// replay state so the driver can re-run the program and reach it.
    /// Returns `false` once `backtrack_list` is exhausted (spec §4.6).
    pub fn next_execution(&mut self) -> bool {
        match self.backtrack_list.pop() {
            Some(_) => {
                self.executions += 1;
                self.reset_to_initial_state();
                true
            }
            None => false,
        }
    }

    /// The thread the scheduler should run at `node` next (spec §4.6,
    /// `get_next_replay_thread`): the alternative recorded there if one is
    /// pending (the divergence point of the `Backtrack` being replayed),
    /// otherwise whichever thread originally ran there, so the rest of a
    /// captured trace replays exactly instead of falling back to the
    /// scheduler's lowest-id default.
    pub fn get_next_replay_thread(&self, node: NodeId) -> Option<thread::Id> {
        let node = self.node_stack.get(node);
        if let Some(alt) = node.next_backtrack() {
            return Some(alt);
        }
        node.action().and_then(|id| self.actions.get(id.index())).map(|a| a.tid())
    }

    pub fn choose_next(&mut self, preferred: Option<thread::Id>) -> Option<thread::Id> {
        self.scheduler.choose_next(preferred)
    }

    pub fn action(&self, id: ActionId) -> &Action {
        &self.actions[id.index()]
    }

    /// The value `id` observed: for a read or rmw, the value of whatever it
    /// read from; for a write, its own recorded value (spec §6,
    /// "`submit_action`... returning the observed value for reads").
    pub fn observed_value(&self, id: ActionId) -> i64 {
        let action = &self.actions[id.index()];
        match action.reads_from() {
            Some(writer) => self.actions[writer.index()].value(),
            None => action.value(),
        }
    }

    /// Logs a one-line summary of the execution just finished (spec §6's
    /// "a per-execution summary to stdout"; mirrors
    /// `examples/original_source/common.cc`'s `print_trace`/
    /// `model_print_summary`, routed through `tracing` rather than stdout
    /// per this crate's ambient logging choice).
    pub fn print_summary(&self) {
        tracing::info!(
            execution = self.executions,
            actions = self.trace.len(),
            nodes = self.node_stack.total_nodes(),
            pending_backtracks = self.backtrack_list.len(),
            violations = self.violations.len(),
            "execution summary",
        );
    }

    pub fn cycle_graph(&self) -> &CycleGraph {
        &self.cycle_graph
    }

    pub fn cycle_graph_mut(&mut self) -> &mut CycleGraph {
        &mut self.cycle_graph
    }

    pub fn record_violation(&mut self, violation: Violation) {
        self.violations.push(violation);
    }

    /// A snapshot of the backtracking frontier suitable for persisting to
    /// disk between runs (spec's ambient "resume a long exhaustive search"
    /// need). Deliberately narrow: it carries the `NodeStack` and pending
    /// `Backtrack`s, not the action arena, cycle graph, or thread registry —
    /// a resumed run re-derives those by replaying forward from the root
    /// exactly as a fresh run would, reusing the restored nodes instead of
    /// creating new ones.
    #[cfg(feature = "checkpoint")]
    pub fn checkpoint_state(&self) -> CheckpointState {
        CheckpointState {
            node_stack: self.node_stack.clone(),
            backtrack_list: self.backtrack_list.clone(),
            executions: self.executions,
        }
    }

    #[cfg(feature = "checkpoint")]
    pub fn restore_checkpoint_state(&mut self, state: CheckpointState) {
        self.node_stack = state.node_stack;
        self.backtrack_list = state.backtrack_list;
        self.executions = state.executions;
        self.current_node = self.node_stack.root();
    }

    /// Walks the `joining` wait-for graph from `start`, returning the cycle
    /// (in wait order) if following it leads back to `start`.
    fn find_join_cycle(&self, start: thread::Id) -> Option<Vec<thread::Id>> {
        let mut path = vec![start];
        let mut current = start;
        loop {
            let next = *self.joining.get(&current)?;
            if next == start {
                return Some(path);
            }
            if path.contains(&next) {
                // Cycle exists but doesn't route through `start`; some other
                // thread in it will discover it when its own join runs.
                return None;
            }
            path.push(next);
            current = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionKind;

    fn loc(n: u64) -> Location {
        Location(n)
    }

    #[test]
    fn independent_writes_do_not_conflict() {
        let mut c = Checker::new();
        let t0 = c.spawn_thread(None);
        let t1 = c.spawn_thread(None);
        c.record_action(ActionKind::AtomicWrite, Ordering::Relaxed, loc(1), t0, 1);
        c.record_action(ActionKind::AtomicWrite, Ordering::Relaxed, loc(2), t1, 2);
        assert!(c.violations().is_empty());
        assert!(!c.cycle_graph().has_cycles());
    }

    #[test]
    fn relaxed_read_observes_the_most_recent_write() {
        let mut c = Checker::new();
        let t0 = c.spawn_thread(None);
        c.record_action(ActionKind::AtomicWrite, Ordering::Relaxed, loc(1), t0, 10);
        c.record_action(ActionKind::AtomicWrite, Ordering::Relaxed, loc(1), t0, 20);
        let r = c.record_action(ActionKind::AtomicRead, Ordering::Relaxed, loc(1), t0, crate::action::VALUE_NONE);
        let read = c.action(r);
        assert_eq!(read.reads_from().map(|w| c.action(w).value()), Some(20));
    }

    #[test]
    fn read_before_any_write_is_uninitialized() {
        let mut c = Checker::new();
        let t0 = c.spawn_thread(None);
        c.record_action(ActionKind::AtomicRead, Ordering::Relaxed, loc(1), t0, crate::action::VALUE_NONE);
        assert_eq!(c.violations().len(), 1);
    }

    #[test]
    fn conflicting_unordered_writes_set_a_backtrack_point() {
        let mut c = Checker::new();
        let t0 = c.spawn_thread(None);
        let t1 = c.spawn_thread(None);
        c.record_action(ActionKind::AtomicWrite, Ordering::Relaxed, loc(1), t0, 1);
        c.record_action(ActionKind::AtomicWrite, Ordering::Relaxed, loc(1), t1, 2);
        assert!(c.has_next_execution());
    }

    #[test]
    fn rmw_chain_orders_after_its_source_write() {
        let mut c = Checker::new();
        let t0 = c.spawn_thread(None);
        let w = c.record_action(ActionKind::AtomicWrite, Ordering::Relaxed, loc(1), t0, 1);
        let rmw = c.record_action(ActionKind::AtomicRmw, Ordering::Relaxed, loc(1), t0, 2);
        assert!(c.cycle_graph.has_rmw_successor(w));
        assert_ne!(w, rmw);
    }

    #[test]
    fn reset_to_initial_state_reenables_only_the_initial_thread() {
        let mut c = Checker::new();
        let t0 = c.spawn_thread(None);
        let t1 = c.spawn_thread(None);
        c.record_action(ActionKind::AtomicWrite, Ordering::Relaxed, loc(1), t0, 1);
        c.reset_to_initial_state();
        assert!(c.scheduler.is_enabled(t0));
        assert!(!c.scheduler.is_enabled(t1));
    }

    #[test]
    fn mutual_joins_are_reported_as_a_deadlock() {
        let mut c = Checker::new();
        let t0 = c.spawn_thread(None);
        let t1 = c.spawn_thread(None);
        c.record_action(ActionKind::ThreadJoin, Ordering::SeqCst, loc(0), t0, t1.as_value());
        assert!(c.violations().is_empty(), "one-sided wait isn't a deadlock yet");
        c.record_action(ActionKind::ThreadJoin, Ordering::SeqCst, loc(0), t1, t0.as_value());
        assert!(c
            .violations()
            .iter()
            .any(|v| matches!(v, Violation::Deadlock { .. })));
    }

    #[test]
    fn join_on_an_exited_thread_never_blocks() {
        let mut c = Checker::new();
        let t0 = c.spawn_thread(None);
        let t1 = c.spawn_thread(None);
        c.exit_thread(t1);
        c.record_action(ActionKind::ThreadJoin, Ordering::SeqCst, loc(0), t0, t1.as_value());
        assert!(c.violations().is_empty());
    }
}
