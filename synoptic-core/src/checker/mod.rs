//! FSM invariant checking over a [`crate::partition::PartitionGraph`]: a
//! fast bitset pass decides sat/unsat for every invariant in one sweep,
//! then the tracing pass is invoked only for invariants that failed, to
//! recover a shortest counter-example.

mod automata;
mod fast;
mod tracing;

use crate::invariants::{BinaryInvariant, CounterExamplePath};
use crate::partition::PartitionGraph;

/// Outcome of checking one batch of invariants against one partition graph.
#[derive(Debug, Default)]
pub struct CheckReport {
    pub violations: Vec<CounterExamplePath>,
}

impl CheckReport {
    pub fn is_satisfied(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Runs the fast pass over every invariant in `invariants`, then recovers a
/// witness path for each one found violated.
pub fn check(graph: &mut PartitionGraph, invariants: &[BinaryInvariant]) -> CheckReport {
    let violated_flags = fast::check_all(graph, invariants);
    let mut violations = Vec::new();
    for (invariant, violated) in invariants.iter().zip(violated_flags) {
        if !violated {
            continue;
        }
        if let Some(path) = tracing::find_counterexample(graph, invariant) {
            violations.push(path);
        }
    }
    CheckReport { violations }
}

/// Fast-pass-only yes/no check for a single invariant, used by the
/// bisimulation engine's "apply a candidate merge, check, rewind if it
/// breaks something" loop where a witness path isn't needed yet.
pub fn holds(graph: &mut PartitionGraph, invariants: &[BinaryInvariant]) -> bool {
    fast::check_all(graph, invariants).iter().all(|&v| !v)
}
