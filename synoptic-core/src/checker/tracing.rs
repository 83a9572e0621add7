//! Tracing-mode checking: a breadth-first search over (partition, automaton
//! state) pairs for one invariant, reconstructing the shortest path to a
//! `FAIL` state at an accepting partition. Shares [`super::automata::step`]
//! with the fast pass; the only difference is that each node on the
//! worklist carries an [`Rc`]-linked history instead of a bare state set, so
//! a witness path can be read back off the first `FAIL` node found.
//!
//! The `Rc` sharing matters: merging two paths that reach the same
//! (partition, state) pair keeps whichever history arrived first and
//! discards the other — no path is ever deep-copied, only the new cons cell
//! at the front is allocated.

use super::automata::StateBits;
use crate::event::Relation;
use crate::hash::HashMap;
use crate::invariants::{BinaryInvariant, CounterExamplePath};
use crate::partition::{PartitionGraph, PartitionId};
use crate::time::TimeDelta;
use std::collections::VecDeque;
use std::rc::Rc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum StateKind {
    Neutral,
    SawA,
    Fail,
}

impl StateKind {
    fn bits(self) -> StateBits {
        match self {
            StateKind::Neutral => StateBits {
                neutral: true,
                ..Default::default()
            },
            StateKind::SawA => StateBits {
                saw_a: true,
                ..Default::default()
            },
            StateKind::Fail => StateBits {
                fail: true,
                ..Default::default()
            },
        }
    }

    fn present_in(bits: StateBits) -> Vec<StateKind> {
        let mut out = Vec::with_capacity(3);
        if bits.neutral {
            out.push(StateKind::Neutral);
        }
        if bits.saw_a {
            out.push(StateKind::SawA);
        }
        if bits.fail {
            out.push(StateKind::Fail);
        }
        out
    }
}

struct HistoryNode {
    partition: PartitionId,
    delta: TimeDelta,
    prev: Option<Rc<HistoryNode>>,
}

/// Finds the shortest path along which `invariant` is violated, if any.
/// Intended to be called only for an invariant [`super::fast::check_all`]
/// already reported as violated; returns `None` if this invariant in fact
/// holds (which should not happen given that precondition, but is not
/// assumed here).
pub fn find_counterexample(graph: &mut PartitionGraph, invariant: &BinaryInvariant) -> Option<CounterExamplePath> {
    let relation = &invariant.relation;
    let ids: Vec<PartitionId> = graph.partition_ids().collect();
    let mut adjacency: HashMap<PartitionId, Vec<PartitionId>> = HashMap::default();
    for &id in &ids {
        adjacency.insert(id, graph.successors(id, relation));
    }

    let initial = graph.initial_partition();
    let mut visited: std::collections::HashSet<(PartitionId, StateKind)> = std::collections::HashSet::new();
    let mut worklist: VecDeque<(PartitionId, StateKind, Option<Rc<HistoryNode>>)> = VecDeque::new();

    visited.insert((initial, StateKind::Neutral));
    worklist.push_back((
        initial,
        StateKind::Neutral,
        Some(Rc::new(HistoryNode {
            partition: initial,
            delta: TimeDelta::ZERO_COUNTER,
            prev: None,
        })),
    ));

    while let Some((p, state, history)) = worklist.pop_front() {
        let successors = adjacency.get(&p).cloned().unwrap_or_default();
        for q in successors {
            let q_event = graph.partition(q).event_type.clone();
            let q_accept = graph.partition(q).is_accept();
            let next_bits = super::automata::step(invariant.kind, state.bits(), &q_event, &invariant.a, &invariant.b, q_accept);
            let delta = graph
                .induced_transitions(p, relation)
                .into_iter()
                .find(|t| t.target == q)
                .map(|t| t.delta)
                .unwrap_or(TimeDelta::ZERO_COUNTER);
            let next_history = Rc::new(HistoryNode {
                partition: q,
                delta,
                prev: history.clone(),
            });

            for kind in StateKind::present_in(next_bits) {
                if !visited.insert((q, kind)) {
                    continue;
                }
                if kind == StateKind::Fail && q_accept {
                    return Some(reconstruct(invariant.clone(), next_history));
                }
                worklist.push_back((q, kind, Some(next_history.clone())));
            }
        }
    }

    None
}

fn reconstruct(invariant: BinaryInvariant, tail: Rc<HistoryNode>) -> CounterExamplePath {
    let mut partitions = Vec::new();
    let mut deltas = Vec::new();
    let mut node = Some(tail);
    while let Some(n) = node {
        partitions.push(n.partition);
        deltas.push(n.delta.clone());
        node = n.prev.clone();
    }
    partitions.reverse();
    deltas.reverse();
    CounterExamplePath {
        invariant,
        partitions,
        deltas,
    }
}
