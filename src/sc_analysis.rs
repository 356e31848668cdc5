//! Sequential-consistency analysis: checks whether a completed trace admits
//! a total order consistent with program order, reads-from, and the
//! modification-order-vs-reads-from closure — not merely the incremental
//! per-pair checks `checker::Checker` runs while recording (spec §4.7).
//! Grounded on `examples/original_source/scanalysis.h`'s `SCAnalysis`:
//! `computeCV`'s clock-vector assignment, `updateConstraints`'s read-from
//! arc closure, `cyclic`/`badrfset`, and `generateSC`'s topological
//! linearization, reshaped from its mutable `HashTable`/`SnapVector`
//! bookkeeping onto a plain successor map built fresh per call.

use crate::action::{Action, ActionId};
use crate::checker::Checker;
use crate::trace_analysis::{AnalysisResult, TraceAnalysis};

use std::cmp::Ordering as CmpOrdering;
use std::collections::{HashMap, HashSet};

/// Stateless: every constraint graph this builds is local to one call to
/// `analyze`, since each trace gets its own independent linearization
/// attempt.
#[derive(Debug, Default)]
pub struct ScAnalysis;

impl TraceAnalysis for ScAnalysis {
    fn analyze(&self, checker: &Checker, trace: &[ActionId]) -> AnalysisResult {
        let mut succ: HashMap<ActionId, HashSet<ActionId>> = trace.iter().map(|&id| (id, HashSet::new())).collect();

        add_program_order_edges(checker, trace, &mut succ);
        add_reads_from_edges(checker, trace, &mut succ);
        let badrfset = add_constraint_edges(checker, trace, &mut succ);

        match topological_linearize(checker, trace, &succ) {
            Some(order) => AnalysisResult::Linearization(order),
            None => AnalysisResult::Cyclic { badrfset },
        }
    }
}

fn add_edge(succ: &mut HashMap<ActionId, HashSet<ActionId>>, from: ActionId, to: ActionId) {
    if from != to {
        succ.entry(from).or_default().insert(to);
    }
}

/// Each thread's own actions are already totally ordered; the linearization
/// must respect that order too.
fn add_program_order_edges(checker: &Checker, trace: &[ActionId], succ: &mut HashMap<ActionId, HashSet<ActionId>>) {
    let mut last_by_thread: HashMap<_, ActionId> = HashMap::new();
    for &id in trace {
        let tid = checker.action(id).tid();
        if let Some(&prev) = last_by_thread.get(&tid) {
            add_edge(succ, prev, id);
        }
        last_by_thread.insert(tid, id);
    }
}

/// A write must precede the read that observed it.
fn add_reads_from_edges(checker: &Checker, trace: &[ActionId], succ: &mut HashMap<ActionId, HashSet<ActionId>>) {
    for &id in trace {
        if let Some(writer) = checker.action(id).reads_from() {
            add_edge(succ, writer, id);
        }
    }
}

/// `updateConstraints`'s read-from arc (spec §4.7): for every read `r`
/// observing write `w`, any other write `w2` to the same location not
/// already separated from `w`/`r` by happens-before must be forced before
/// `w`, so it can never have overwritten `w` between `w` and the read that
/// observed it. Returns the reads this touched, as `badrfset` candidates —
/// meaningful only if the closure turns out cyclic.
fn add_constraint_edges(
    checker: &Checker,
    trace: &[ActionId],
    succ: &mut HashMap<ActionId, HashSet<ActionId>>,
) -> Vec<ActionId> {
    let mut badrfset = Vec::new();

    for &id in trace {
        let read = checker.action(id);
        let Some(writer_id) = read.reads_from() else {
            continue;
        };
        let writer = checker.action(writer_id);

        let mut constrained = false;
        for &other_id in trace {
            if other_id == writer_id || other_id == id {
                continue;
            }
            let other = checker.action(other_id);
            if !other.is_write() || !other.same_location(read) {
                continue;
            }
            // Already ordered before the write, or after the read: no new
            // constraint needed.
            if writer.happens_before(other) || read.happens_before(other) {
                continue;
            }
            add_edge(succ, other_id, writer_id);
            constrained = true;
        }
        if constrained {
            badrfset.push(id);
        }
    }

    badrfset
}

/// Kahn's algorithm over the constraint graph, repeatedly picking the
/// zero-remaining-in-degree action with the minimal clock vector (spec
/// §4.7). Returns `None` if the graph is cyclic.
fn topological_linearize(
    checker: &Checker,
    trace: &[ActionId],
    succ: &HashMap<ActionId, HashSet<ActionId>>,
) -> Option<Vec<ActionId>> {
    let mut in_degree: HashMap<ActionId, usize> = trace.iter().map(|&id| (id, 0)).collect();
    for edges in succ.values() {
        for &to in edges {
            *in_degree.entry(to).or_insert(0) += 1;
        }
    }

    let mut remaining: HashSet<ActionId> = trace.iter().copied().collect();
    let mut order = Vec::with_capacity(trace.len());

    while !remaining.is_empty() {
        let mut ready: Vec<ActionId> = remaining
            .iter()
            .copied()
            .filter(|id| in_degree.get(id).copied().unwrap_or(0) == 0)
            .collect();
        if ready.is_empty() {
            return None;
        }

        ready.sort_by(|&a, &b| cv_order(checker, a, b));
        let next = ready[0];

        remaining.remove(&next);
        if let Some(edges) = succ.get(&next) {
            for &to in edges {
                if let Some(count) = in_degree.get_mut(&to) {
                    *count -= 1;
                }
            }
        }
        order.push(next);
    }

    Some(order)
}

/// Orders two ready actions by "clock vector is minimal": the one whose
/// clock vector the other's dominates sorts first. Ties — including
/// incomparable vectors, which can't happen between two zero-in-degree
/// nodes that aren't otherwise related — break by thread id, then sequence
/// number (spec §4.7).
fn cv_order(checker: &Checker, a: ActionId, b: ActionId) -> CmpOrdering {
    let act_a: &Action = checker.action(a);
    let act_b: &Action = checker.action(b);

    let a_dominates_b = matches!((act_a.cv(), act_b.cv()), (Some(x), Some(y)) if x.dominates(y));
    let b_dominates_a = matches!((act_a.cv(), act_b.cv()), (Some(x), Some(y)) if y.dominates(x));

    match (a_dominates_b, b_dominates_a) {
        (true, false) => CmpOrdering::Greater,
        (false, true) => CmpOrdering::Less,
        _ => act_a
            .tid()
            .as_usize()
            .cmp(&act_b.tid().as_usize())
            .then(act_a.seq_number().cmp(&act_b.seq_number())),
    }
}
