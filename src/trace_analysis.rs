//! Post-execution trace analyses (spec §4's mention of pluggable analyses
//! run once an execution completes). Grounded on
//! `examples/original_source/traceanalysis.h`'s `TraceAnalysis` base class:
//! one hook, invoked with the full trace once `checker::Checker` finishes an
//! execution.

use crate::action::ActionId;
use crate::checker::Checker;

/// Outcome of analyzing a completed trace for sequential consistency (spec
/// §4.7): either a full linearization, or the read(s) whose constraints
/// can't be satisfied by any total order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisResult {
    /// A sequentially consistent total order over the trace's actions.
    Linearization(Vec<ActionId>),
    /// The constraint graph built from program order, reads-from, and
    /// mo-vs-rf closure is cyclic; `badrfset` names the reads whose
    /// reads-from edge participates in the cycle.
    Cyclic { badrfset: Vec<ActionId> },
}

/// Something that inspects a completed execution's trace and reports
/// whether it admits a sequentially consistent total order — a property the
/// incremental checks during recording can't see, since it requires
/// comparing the final global order across every action, not just pairwise
/// dependence.
pub trait TraceAnalysis {
    fn analyze(&self, checker: &Checker, trace: &[ActionId]) -> AnalysisResult;
}
