//! Binary temporal invariants and the miner that extracts them from a trace
//! graph's transitive closure.

use crate::closure::{Strategy, TransitiveClosure};
use crate::config::Config;
use crate::error::ParseError;
use crate::event::{EventType, Relation};
use crate::partition::PartitionId;
use crate::time::TimeDelta;
use crate::trace_graph::TraceGraph;
use std::collections::BTreeSet;

/// The three binary temporal invariant shapes this crate mines and checks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InvariantKind {
    /// "after every A there is eventually a B".
    AlwaysFollowedBy,
    /// "every B is preceded by some A".
    AlwaysPrecedes,
    /// "after any A, B never occurs".
    NeverFollowedBy,
}

/// A mined or checked binary temporal invariant over two event types.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BinaryInvariant {
    pub kind: InvariantKind,
    pub a: EventType,
    pub b: EventType,
    pub relation: Relation,
}

impl BinaryInvariant {
    pub fn always_followed_by(a: EventType, b: EventType, relation: Relation) -> Self {
        BinaryInvariant {
            kind: InvariantKind::AlwaysFollowedBy,
            a,
            b,
            relation,
        }
    }

    pub fn never_followed_by(a: EventType, b: EventType, relation: Relation) -> Self {
        BinaryInvariant {
            kind: InvariantKind::NeverFollowedBy,
            a,
            b,
            relation,
        }
    }

    pub fn always_precedes(a: EventType, b: EventType, relation: Relation) -> Result<Self, ParseError> {
        if a == b {
            return Err(ParseError::ReflexiveAlwaysPrecedes(a));
        }
        Ok(BinaryInvariant {
            kind: InvariantKind::AlwaysPrecedes,
            a,
            b,
            relation,
        })
    }
}

impl std::fmt::Display for BinaryInvariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let op = match self.kind {
            InvariantKind::AlwaysFollowedBy => "AFby",
            InvariantKind::AlwaysPrecedes => "AP",
            InvariantKind::NeverFollowedBy => "NFby",
        };
        write!(f, "{op}({}, {}) [{}]", self.a, self.b, self.relation)
    }
}

/// Per-kind invariant counts, consulted only by callers wanting a summary
/// (the CLI, tests) — never by mining or checking.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InvariantStats {
    pub always_followed_by: usize,
    pub always_precedes: usize,
    pub never_followed_by: usize,
}

/// The set of invariants mined from one trace graph.
#[derive(Clone, Debug, Default)]
pub struct MinedInvariants {
    invariants: Vec<BinaryInvariant>,
}

impl From<Vec<BinaryInvariant>> for MinedInvariants {
    fn from(invariants: Vec<BinaryInvariant>) -> Self {
        MinedInvariants { invariants }
    }
}

impl MinedInvariants {
    pub fn iter(&self) -> impl Iterator<Item = &BinaryInvariant> {
        self.invariants.iter()
    }

    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }

    pub fn as_slice(&self) -> &[BinaryInvariant] {
        &self.invariants
    }

    pub fn stats(&self) -> InvariantStats {
        let mut stats = InvariantStats::default();
        for inv in &self.invariants {
            match inv.kind {
                InvariantKind::AlwaysFollowedBy => stats.always_followed_by += 1,
                InvariantKind::AlwaysPrecedes => stats.always_precedes += 1,
                InvariantKind::NeverFollowedBy => stats.never_followed_by += 1,
            }
        }
        stats
    }
}

/// The output of a failed invariant check: the partition path walked, the
/// event-level transitions used at each step (when available), and the
/// accumulated time delta.
#[derive(Clone, Debug)]
pub struct CounterExamplePath {
    pub invariant: BinaryInvariant,
    pub partitions: Vec<PartitionId>,
    pub deltas: Vec<TimeDelta>,
}

/// Mines binary temporal invariants: for every ordered pair of non-special
/// event types, under every relation present in the graph, test NFby/AFby/AP
/// against the transitive closure; separately
/// reconstruct `INITIAL AFby x` ("x is eventual") by intersecting, across
/// traces, the event types reachable from each trace's first event.
pub struct InvariantMiner;

impl InvariantMiner {
    pub fn mine(graph: &TraceGraph, config: &Config) -> MinedInvariants {
        let strategy = if config.warshall_transitive_closure {
            Strategy::Warshall
        } else {
            Strategy::Recursive
        };

        let mut invariants = Vec::new();

        for relation in graph.relations() {
            let tc = TransitiveClosure::compute(graph, relation, strategy);

            let mut by_type: Vec<(EventType, Vec<_>)> = Vec::new();
            for &id in tc.ids() {
                let node = graph.get(id);
                if node.event_type.is_special() {
                    continue;
                }
                match by_type.iter_mut().find(|(t, _)| *t == node.event_type) {
                    Some((_, ids)) => ids.push(id),
                    None => by_type.push((node.event_type.clone(), vec![id])),
                }
            }

            for (a_type, a_ids) in &by_type {
                for (b_type, b_ids) in &by_type {
                    if a_type == b_type {
                        continue;
                    }

                    let never = a_ids
                        .iter()
                        .all(|&a| b_ids.iter().all(|&b| !tc.is_reachable(a, b)));
                    if never {
                        invariants.push(BinaryInvariant::never_followed_by(
                            a_type.clone(),
                            b_type.clone(),
                            relation.clone(),
                        ));
                    }

                    let always_followed = a_ids
                        .iter()
                        .all(|&a| b_ids.iter().any(|&b| tc.is_reachable(a, b)));
                    if always_followed {
                        invariants.push(BinaryInvariant::always_followed_by(
                            a_type.clone(),
                            b_type.clone(),
                            relation.clone(),
                        ));
                    }

                    let always_precedes = b_ids
                        .iter()
                        .all(|&b| a_ids.iter().any(|&a| tc.is_reachable(a, b)));
                    if always_precedes {
                        if let Ok(inv) = BinaryInvariant::always_precedes(
                            a_type.clone(),
                            b_type.clone(),
                            relation.clone(),
                        ) {
                            invariants.push(inv);
                        }
                    }
                }
            }
        }

        invariants.extend(mine_initial_eventual(graph));

        MinedInvariants { invariants }
    }
}

/// `INITIAL AFby x`: a type `x` is "eventual" when every trace's INITIAL
/// successor set (under the temporal relation) includes a node that
/// eventually reaches an `x`-typed node, for every trace. Computed directly
/// from INITIAL's direct successors and the temporal transitive closure,
/// rather than per-operand pair, since INITIAL/TERMINAL are themselves
/// excluded from the general pairwise pass.
fn mine_initial_eventual(graph: &TraceGraph) -> Vec<BinaryInvariant> {
    let temporal = Relation::temporal();
    let tc = TransitiveClosure::compute(graph, &temporal, Strategy::Warshall);

    let mut per_trace_reachable: Vec<BTreeSet<EventType>> = Vec::new();
    for t in graph.get(graph.initial_id()).outgoing(&temporal) {
        let trace_id = graph.get(t.target).trace_id;
        let mut reachable: BTreeSet<EventType> = BTreeSet::new();
        for &id in tc.ids() {
            let node = graph.get(id);
            if node.trace_id != trace_id || node.event_type.is_special() {
                continue;
            }
            if id == t.target || tc.is_reachable(t.target, id) {
                reachable.insert(node.event_type.clone());
            }
        }
        per_trace_reachable.push(reachable);
    }

    let Some(first) = per_trace_reachable.first().cloned() else {
        return Vec::new();
    };
    let eventual: BTreeSet<EventType> = per_trace_reachable
        .into_iter()
        .fold(first, |mut acc, set| {
            acc.retain(|t| set.contains(t));
            acc
        });

    eventual
        .into_iter()
        .map(|x| BinaryInvariant::always_followed_by(EventType::initial(), x, temporal.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::TraceId;
    use crate::input::{ParsedEdge, ParsedEvent, ParsedLog};
    use crate::time::{ITime, TimeType};

    fn chain_log(labels: &[&str]) -> TraceGraph {
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
        TraceGraph::from_parsed_log(ParsedLog {
            events,
            edges,
            time_type: TimeType::Counter,
        })
        .unwrap()
    }

    #[test]
    fn mines_always_followed_by_when_b_always_follows_a() {
        let g = chain_log(&["a", "x", "y", "b"]);
        let invariants = InvariantMiner::mine(&g, &Config::default());
        assert!(invariants.iter().any(|inv| {
            inv.kind == InvariantKind::AlwaysFollowedBy
                && inv.a == EventType::label("a")
                && inv.b == EventType::label("b")
        }));
    }

    #[test]
    fn does_not_mine_always_followed_by_when_b_is_missing() {
        let g = chain_log(&["a", "x", "y", "z"]);
        let invariants = InvariantMiner::mine(&g, &Config::default());
        assert!(!invariants.iter().any(|inv| {
            inv.kind == InvariantKind::AlwaysFollowedBy
                && inv.a == EventType::label("a")
                && inv.b == EventType::label("b")
        }));
    }

    #[test]
    fn tautological_invariants_are_excluded() {
        let g = chain_log(&["a", "b"]);
        let invariants = InvariantMiner::mine(&g, &Config::default());
        assert!(!invariants
            .iter()
            .any(|inv| inv.a.is_special() && inv.kind != InvariantKind::AlwaysFollowedBy));
        assert!(!invariants.iter().any(|inv| inv.b.is_special()));
    }
}
