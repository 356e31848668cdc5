//! Function-level predicate learner, used to bias which backtrack
//! alternative gets explored next toward branches more likely to reveal a
//! bug (spec's note that targeted-fuzzing heuristics are a named but
//! out-of-rigor collaborator). Grounded on
//! `examples/original_source/funcnode.h`'s `FuncNode`, reduced to the one
//! piece this crate's exploration loop can make direct use of: per-location
//! value history, scoped by which atomic action touched it.

use crate::action::{ActionId, Location};
use std::collections::HashMap;

/// Tracks which values have been observed at a location across every
/// execution explored so far, keyed by the action that wrote them.
///
/// The original `FuncNode` maintains a much larger predicate tree (branch
/// history, instruction-to-predicate mapping, inter-function distance for
/// targeted fuzzing); this crate only needs the value-history slice of that
/// to let a future search-order heuristic prefer writes whose value hasn't
/// been read yet, so the rest is left unimplemented.
#[derive(Debug, Default)]
pub struct FuncNode {
    observed: HashMap<Location, Vec<(ActionId, i64)>>,
}

impl FuncNode {
    pub fn new() -> FuncNode {
        FuncNode::default()
    }

    pub fn record(&mut self, location: Location, action: ActionId, value: i64) {
        self.observed.entry(location).or_default().push((action, value));
    }

    pub fn values_at(&self, location: Location) -> &[(ActionId, i64)] {
        self.observed.get(&location).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `true` if `value` has never been recorded at `location` before —
    /// a cheap signal that exploring a branch leading here would cover new
    /// ground.
    pub fn is_novel_value(&self, location: Location, value: i64) -> bool {
        !self
            .values_at(location)
            .iter()
            .any(|&(_, observed)| observed == value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn novel_values_are_flagged_until_recorded() {
        let mut node = FuncNode::new();
        let loc = Location(1);
        assert!(node.is_novel_value(loc, 5));

        node.record(loc, ActionId(0), 5);
        assert!(!node.is_novel_value(loc, 5));
        assert!(node.is_novel_value(loc, 6));
    }
}
