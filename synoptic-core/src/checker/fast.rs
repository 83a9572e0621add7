//! Fast bitset-mode checking: a single forward fixpoint pass evaluates every
//! mined invariant at once over the partition graph, tracking only which
//! automaton states are reachable — no path history. Sound and complete for
//! yes/no violation detection; [`super::tracing`] is consulted afterwards,
//! only for invariants this pass found violated, to recover a witness path.

use super::automata::{step, StateBits};
use crate::event::Relation;
use crate::hash::HashMap;
use crate::invariants::BinaryInvariant;
use crate::partition::{PartitionGraph, PartitionId};
use std::collections::VecDeque;

/// Runs every invariant's automaton together in one worklist pass and
/// returns, for each invariant (in the same order as `invariants`), whether
/// a `FAIL` state is reachable at some accepting partition.
///
/// Invariants mined over different relations induce different successor
/// graphs (`PartitionGraph::successors` takes the relation as a parameter),
/// so invariants are grouped by `.relation` and each group gets its own
/// worklist pass over its own adjacency; the per-invariant results are then
/// merged back into the caller's original order.
pub fn check_all(graph: &mut PartitionGraph, invariants: &[BinaryInvariant]) -> Vec<bool> {
    if invariants.is_empty() {
        return Vec::new();
    }

    let mut groups: HashMap<Relation, Vec<usize>> = HashMap::default();
    for (i, inv) in invariants.iter().enumerate() {
        groups.entry(inv.relation.clone()).or_default().push(i);
    }

    let mut violated = vec![false; invariants.len()];
    for (relation, indices) in groups {
        let group_invariants: Vec<&BinaryInvariant> = indices.iter().map(|&i| &invariants[i]).collect();
        let group_violated = check_all_for_relation(graph, &relation, &group_invariants);
        for (&i, v) in indices.iter().zip(group_violated) {
            violated[i] = v;
        }
    }
    violated
}

fn check_all_for_relation(graph: &mut PartitionGraph, relation: &Relation, invariants: &[&BinaryInvariant]) -> Vec<bool> {
    let ids: Vec<PartitionId> = graph.partition_ids().collect();
    let mut adjacency: HashMap<PartitionId, Vec<PartitionId>> = HashMap::default();
    for &id in &ids {
        adjacency.insert(id, graph.successors(id, relation));
    }

    let initial = graph.initial_partition();
    let n = invariants.len();

    let mut state: HashMap<PartitionId, Vec<StateBits>> = HashMap::default();
    for &id in &ids {
        state.insert(id, vec![StateBits::default(); n]);
    }
    state.get_mut(&initial).unwrap().fill(StateBits::NEUTRAL);

    let mut worklist: VecDeque<PartitionId> = VecDeque::new();
    worklist.push_back(initial);
    let mut queued: std::collections::HashSet<PartitionId> = std::collections::HashSet::new();
    queued.insert(initial);

    while let Some(p) = worklist.pop_front() {
        queued.remove(&p);
        let cur = state.get(&p).unwrap().clone();
        let successors = adjacency.get(&p).cloned().unwrap_or_default();
        for q in successors {
            let q_event = graph.partition(q).event_type.clone();
            let q_accept = graph.partition(q).is_accept();
            let mut changed = false;
            let mut next_for_q = state.get(&q).unwrap().clone();
            for i in 0..n {
                let stepped = step(invariants[i].kind, cur[i], &q_event, &invariants[i].a, &invariants[i].b, q_accept);
                let merged = next_for_q[i].union(stepped);
                if !merged.is_subset_of(&next_for_q[i]) {
                    next_for_q[i] = merged;
                    changed = true;
                }
            }
            if changed {
                state.insert(q, next_for_q);
                if queued.insert(q) {
                    worklist.push_back(q);
                }
            }
        }
    }

    let mut violated = vec![false; n];
    for &id in &ids {
        if !graph.partition(id).is_accept() {
            continue;
        }
        let bits = state.get(&id).unwrap();
        for i in 0..n {
            if bits[i].fail {
                violated[i] = true;
            }
        }
    }
    violated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::event::{EventType, TraceId};
    use crate::input::{ParsedEdge, ParsedEvent, ParsedLog};
    use crate::invariants::InvariantMiner;
    use crate::time::{ITime, TimeType};
    use crate::trace_graph::TraceGraph;
    use std::rc::Rc;

    fn chain(labels: &[&str]) -> Rc<TraceGraph> {
        let events = labels
            .iter()
            .enumerate()
            .map(|(i, l)| ParsedEvent {
                event_type: EventType::label(*l),
                trace_id: TraceId(0),
                line: Some(i as u32),
                time: ITime::Counter(i as u64),
            })
            .collect::<Vec<_>>();
        let edges = (0..labels.len().saturating_sub(1))
            .map(|i| ParsedEdge {
                source: i,
                target: i + 1,
                relation: Relation::temporal(),
            })
            .collect();
        Rc::new(
            TraceGraph::from_parsed_log(ParsedLog {
                events,
                edges,
                time_type: TimeType::Counter,
            })
            .unwrap(),
        )
    }

    #[test]
    fn mined_invariants_all_check_satisfied_on_their_own_source_graph() {
        let g = chain(&["a", "x", "y", "b"]);
        let mined = InvariantMiner::mine(&g, &Config::default());
        let mut pg = PartitionGraph::initial(g);
        let violated = check_all(&mut pg, mined.as_slice());
        assert!(violated.iter().all(|&v| !v), "a graph's own mined invariants must hold on it");
    }

    #[test]
    fn detects_violation_of_a_fabricated_never_followed_by() {
        let g = chain(&["a", "b"]);
        let mut pg = PartitionGraph::initial(g);
        let bogus = BinaryInvariant::never_followed_by(EventType::label("a"), EventType::label("b"), Relation::temporal());
        let violated = check_all(&mut pg, std::slice::from_ref(&bogus));
        assert_eq!(violated, vec![true]);
    }
}
