//! The bisimulation engine (C6): splits the partition graph until every
//! mined invariant holds (refinement), then merges k-equivalent partitions
//! back together as long as doing so reintroduces no violation
//! (coarsening). This is the choreography that turns the coarse
//! group-by-event-type partition graph into the final inferred model.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::checker;
use crate::config::Config;
use crate::event::{EventId, Relation};
use crate::hash::HashSet;
use crate::invariants::{BinaryInvariant, CounterExamplePath, MinedInvariants};
use crate::partition::{CandidateSplit, Merge, Operation, PartitionGraph, PartitionId};
use crate::rng::DeterministicRng;

/// Summary of one [`BisimulationEngine::run`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BisimulationReport {
    pub splits_applied: usize,
    pub merges_applied: usize,
}

/// Drives refinement and coarsening over a [`PartitionGraph`]. Owns the
/// deterministic RNG used solely to shuffle counter-example processing
/// order (`spec.md` §5's reproducibility requirement); mines no
/// invariants and performs no I/O of its own.
pub struct BisimulationEngine {
    config: Config,
    rng: DeterministicRng,
}

impl BisimulationEngine {
    pub fn new(config: Config) -> Self {
        let rng = DeterministicRng::new(config.random_seed);
        BisimulationEngine { config, rng }
    }

    /// Runs refinement then coarsening (each skippable via `Config`),
    /// checking `cancel` between iterations of both loops.
    pub fn run(
        &mut self,
        graph: &mut PartitionGraph,
        invariants: &MinedInvariants,
        cancel: &AtomicBool,
    ) -> crate::error::Result<BisimulationReport> {
        let splits_applied = if self.config.no_refinement {
            0
        } else {
            self.refine(graph, invariants, cancel)?
        };
        let merges_applied = if self.config.no_coarsening {
            0
        } else {
            self.coarsen(graph, invariants, cancel)?
        };
        if self.config.perform_extra_checks {
            graph.check_sanity()?;
        }
        Ok(BisimulationReport {
            splits_applied,
            merges_applied,
        })
    }

    /// Splits partitions until the checker reports every invariant
    /// satisfied. Returns the number of (multi-)splits applied.
    ///
    /// Each iteration: collect every counter-example, shuffle their
    /// processing order (`spec.md` §5), and for each one look for a
    /// candidate split of its pivot partition that would, on its own,
    /// globally eliminate that counter-example. Splits found this way are
    /// combined per-partition (via `CandidateSplit::incorporate`) and
    /// applied together; if none were found, one arbitrary candidate is
    /// applied to force progress. If no candidate exists at all, the
    /// invariant cannot be satisfied by splitting — a hard error.
    pub fn refine(
        &mut self,
        graph: &mut PartitionGraph,
        invariants: &MinedInvariants,
        cancel: &AtomicBool,
    ) -> crate::error::Result<usize> {
        let mut applied = 0;
        loop {
            if cancel.load(Ordering::Relaxed) {
                return Err(crate::error::SynopticError::Cancelled);
            }

            let report = checker::check(graph, invariants.as_slice());
            if report.is_satisfied() {
                return Ok(applied);
            }

            let mut violations = report.violations;
            self.rng.shuffle(&mut violations);

            let mut satisfying: Vec<(PartitionId, CandidateSplit)> = Vec::new();
            let mut fallback: Option<CandidateSplit> = None;
            let mut any_candidate = false;

            for cep in &violations {
                let candidates = self.candidate_splits(graph, cep);
                if candidates.is_empty() {
                    continue;
                }
                any_candidate = true;
                if fallback.is_none() {
                    fallback = Some(candidates[0].clone());
                }

                for candidate in &candidates {
                    if self.globally_satisfies(graph, candidate, &cep.invariant)? {
                        satisfying.push((candidate.partition, candidate.clone()));
                        break;
                    }
                }
            }

            if !any_candidate {
                let invariant = violations
                    .first()
                    .map(|v| v.invariant.clone())
                    .expect("report.is_satisfied() returned false, so violations is non-empty");
                return Err(crate::error::SynopticError::InvariantsUnsatisfiable { invariant });
            }

            if satisfying.is_empty() {
                let candidate = fallback.expect("any_candidate is true");
                self.apply_split(graph, candidate)?;
                applied += 1;
            } else {
                applied += self.apply_combined_splits(graph, satisfying)?;
            }

            if self.config.perform_extra_checks {
                graph.check_sanity()?;
            }
        }
    }

    /// Merges k-equivalent partitions until a full pass makes no progress.
    /// Returns the number of merges kept.
    ///
    /// For every ordered pair not already blacklisted: if the pair is
    /// k-equivalent, tentatively merge, re-check every invariant, and
    /// either keep the merge (restarting the pass, since the graph
    /// mutated) or rewind it and blacklist the pair. Rejections are
    /// routine and never surfaced as errors.
    pub fn coarsen(
        &mut self,
        graph: &mut PartitionGraph,
        invariants: &MinedInvariants,
        cancel: &AtomicBool,
    ) -> crate::error::Result<usize> {
        let mut applied = 0;
        let mut blacklist: HashSet<(PartitionId, PartitionId)> = HashSet::default();

        loop {
            if cancel.load(Ordering::Relaxed) {
                return Err(crate::error::SynopticError::Cancelled);
            }

            let ids: Vec<PartitionId> = graph.partition_ids().collect();
            let mut merged_this_pass = false;

            'pairs: for &p in &ids {
                if !graph.contains_partition(p) {
                    continue;
                }
                for &q in &ids {
                    if p == q || !graph.contains_partition(q) {
                        continue;
                    }
                    if blacklist.contains(&(p, q)) || blacklist.contains(&(q, p)) {
                        continue;
                    }
                    if graph.partition(p).event_type != graph.partition(q).event_type {
                        continue;
                    }
                    if !graph.k_equals(p, q, self.config.k_tails_k) {
                        continue;
                    }

                    let op = Box::new(Merge { into: p, other: q });
                    let inverse = op.apply(graph)?;
                    let report = checker::check(graph, invariants.as_slice());
                    if report.is_satisfied() {
                        applied += 1;
                        merged_this_pass = true;
                        break 'pairs;
                    } else {
                        inverse.apply(graph)?;
                        blacklist.insert((p, q));
                    }
                }
            }

            if !merged_this_pass {
                return Ok(applied);
            }
            if self.config.perform_extra_checks {
                graph.check_sanity()?;
            }
        }
    }

    /// Tests whether applying `candidate` on its own eliminates every
    /// counter-example for `invariant`: apply, re-check that one invariant,
    /// rewind unconditionally.
    fn globally_satisfies(
        &self,
        graph: &mut PartitionGraph,
        candidate: &CandidateSplit,
        invariant: &BinaryInvariant,
    ) -> crate::error::Result<bool> {
        let op = Box::new(candidate.to_multi_split());
        let inverse = op.apply(graph)?;
        let report = checker::check(graph, std::slice::from_ref(invariant));
        let ok = report.is_satisfied();
        inverse.apply(graph)?;
        Ok(ok)
    }

    fn apply_split(&self, graph: &mut PartitionGraph, candidate: CandidateSplit) -> crate::error::Result<()> {
        let op: Box<dyn Operation> = Box::new(candidate.to_multi_split());
        op.apply(graph)?;
        Ok(())
    }

    /// Combines every satisfying candidate targeting the same partition
    /// into one `MultiSplit` (via `incorporate`), then applies one
    /// `MultiSplit` per distinct partition.
    fn apply_combined_splits(
        &self,
        graph: &mut PartitionGraph,
        candidates: Vec<(PartitionId, CandidateSplit)>,
    ) -> crate::error::Result<usize> {
        let mut by_partition: Vec<(PartitionId, crate::partition::MultiSplit)> = Vec::new();
        for (partition, candidate) in candidates {
            match by_partition.iter_mut().find(|(p, _)| *p == partition) {
                Some((_, existing)) => existing.incorporate(&candidate),
                None => by_partition.push((partition, candidate.to_multi_split())),
            }
        }
        let count = by_partition.len();
        for (_, multi_split) in by_partition {
            let op: Box<dyn Operation> = Box::new(multi_split);
            op.apply(graph)?;
        }
        Ok(count)
    }

    /// Finds every candidate split of the pivot partition for one
    /// counter-example, per `spec.md` §4.5: walk the counter-example's
    /// partition path, in lockstep with the set of trace-graph events
    /// consistent with that prefix, until the walk cannot continue. The
    /// partition where it stalls is the pivot.
    fn candidate_splits(&self, graph: &PartitionGraph, cep: &CounterExamplePath) -> Vec<CandidateSplit> {
        let relation = &cep.invariant.relation;
        let path = &cep.partitions;
        if path.len() < 2 {
            return Vec::new();
        }

        let mut live: Vec<EventId> = vec![graph.trace_graph().initial_id()];
        for i in 1..path.len() {
            let next_partition = path[i];
            let mut next_live = Vec::new();
            for &e in &live {
                for t in graph.trace_graph().get(e).outgoing(relation) {
                    if graph.partition_of(t.target) == next_partition {
                        next_live.push(t.target);
                    }
                }
            }
            if next_live.is_empty() {
                let prev = if i >= 2 { Some(path[i - 2]) } else { None };
                return self.splits_for_pivot(graph, relation, prev, path[i - 1], next_partition);
            }
            live = next_live;
        }
        Vec::new()
    }

    /// Produces the outgoing-based split of `pivot` against `next`
    /// (events with an r-transition into `next` versus those without),
    /// plus, when `Config::incoming_transition_split` is set and `prev`
    /// exists, the incoming-based split against `prev`. Either can be
    /// empty if the pivot's events don't actually divide that way.
    fn splits_for_pivot(
        &self,
        graph: &PartitionGraph,
        relation: &Relation,
        prev: Option<PartitionId>,
        pivot: PartitionId,
        next: PartitionId,
    ) -> Vec<CandidateSplit> {
        let mut out = Vec::new();

        let mut has_edge = crate::hash::IndexSet::default();
        let mut no_edge = crate::hash::IndexSet::default();
        for &e in graph.partition(pivot).events() {
            let goes = graph
                .trace_graph()
                .get(e)
                .outgoing(relation)
                .iter()
                .any(|t| graph.partition_of(t.target) == next);
            if goes {
                has_edge.insert(e);
            } else {
                no_edge.insert(e);
            }
        }
        if !has_edge.is_empty() && !no_edge.is_empty() {
            out.push(CandidateSplit {
                partition: pivot,
                groups: vec![no_edge, has_edge],
            });
        }

        if self.config.incoming_transition_split {
            if let Some(prev) = prev {
                let mut reached = crate::hash::IndexSet::default();
                let mut not_reached = crate::hash::IndexSet::default();
                for &e in graph.partition(pivot).events() {
                    let came_from_prev = graph
                        .trace_graph()
                        .get(e)
                        .incoming(relation)
                        .iter()
                        .any(|t| graph.partition_of(t.source) == prev);
                    if came_from_prev {
                        reached.insert(e);
                    } else {
                        not_reached.insert(e);
                    }
                }
                if !reached.is_empty() && !not_reached.is_empty() {
                    out.push(CandidateSplit {
                        partition: pivot,
                        groups: vec![not_reached, reached],
                    });
                }
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventType, TraceId};
    use crate::input::{ParsedEdge, ParsedEvent, ParsedLog};
    use crate::invariants::InvariantMiner;
    use crate::partition::PartitionGraph;
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

    /// Three traces whose group-by-type partitioning conflates an
    /// unrelated `x` into the partition that's actually on the a-to-b
    /// path: `a0 -> x0 -> b0`, `a1 -> x1 -> b1`, and a third trace
    /// `p2 -> x2 -> c2` whose `x2` shares a type with `x0`/`x1` but leads
    /// somewhere else entirely. No real trace ever reaches `c` from `a`,
    /// so `NeverFollowedBy(a, c)` genuinely holds — but the coarse
    /// partition graph induces a spurious `a -> x -> c` path purely from
    /// conflating `x0`/`x1` with `x2`, and the checker reports a violation
    /// that only refinement (splitting the `x` partition) can remove.
    fn crossover_graph() -> Rc<TraceGraph> {
        let labels = [
            ("a", 0u32),
            ("x", 0),
            ("b", 0),
            ("a", 1),
            ("x", 1),
            ("b", 1),
            ("p", 2),
            ("x", 2),
            ("c", 2),
        ];
        let events = labels
            .iter()
            .enumerate()
            .map(|(i, (label, trace))| ParsedEvent {
                event_type: EventType::label(*label),
                trace_id: TraceId(*trace),
                line: Some(i as u32),
                time: ITime::Counter(i as u64),
            })
            .collect::<Vec<_>>();
        let edges = [(0, 1), (1, 2), (3, 4), (4, 5), (6, 7), (7, 8)]
            .into_iter()
            .map(|(source, target)| ParsedEdge {
                source,
                target,
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
    fn refine_is_a_no_op_when_invariants_already_hold() {
        let g = chain(&["a", "x", "y", "b"]);
        let mined = InvariantMiner::mine(&g, &Config::default());
        let mut pg = PartitionGraph::initial(g);
        let mut engine = BisimulationEngine::new(Config::default());
        let cancel = AtomicBool::new(false);
        let applied = engine.refine(&mut pg, &mined, &cancel).unwrap();
        assert_eq!(applied, 0);
        pg.check_sanity().unwrap();
    }

    #[test]
    fn refine_splits_a_conflated_partition_to_satisfy_a_genuine_invariant() {
        let g = crossover_graph();
        let nfby_a_c =
            BinaryInvariant::never_followed_by(EventType::label("a"), EventType::label("c"), Relation::temporal());
        let mut pg = PartitionGraph::initial(g);
        // The coarse partition graph violates this invariant before refinement.
        assert!(!checker::check(&mut pg, std::slice::from_ref(&nfby_a_c)).is_satisfied());

        let mut engine = BisimulationEngine::new(Config::default());
        let cancel = AtomicBool::new(false);
        let invariants = MinedInvariants::from(vec![nfby_a_c.clone()]);
        let applied = engine.refine(&mut pg, &invariants, &cancel).unwrap();
        assert!(applied > 0);

        let report = checker::check(&mut pg, std::slice::from_ref(&nfby_a_c));
        assert!(report.is_satisfied());
        pg.check_sanity().unwrap();
    }

    #[test]
    fn run_end_to_end_leaves_every_mined_invariant_satisfied() {
        let g = crossover_graph();
        let mined = InvariantMiner::mine(&g, &Config::default());
        let mut pg = PartitionGraph::initial(g);
        let mut engine = BisimulationEngine::new(Config::default());
        let cancel = AtomicBool::new(false);
        engine.run(&mut pg, &mined, &cancel).unwrap();
        let report = checker::check(&mut pg, mined.as_slice());
        assert!(report.is_satisfied());
        pg.check_sanity().unwrap();
    }

    #[test]
    fn coarsen_does_not_reintroduce_a_counterexample() {
        let g = chain(&["a", "x", "y", "b"]);
        let mined = InvariantMiner::mine(&g, &Config::default());
        let mut pg = PartitionGraph::initial(g);
        let mut engine = BisimulationEngine::new(Config::default());
        let cancel = AtomicBool::new(false);
        engine.coarsen(&mut pg, &mined, &cancel).unwrap();
        let report = checker::check(&mut pg, mined.as_slice());
        assert!(report.is_satisfied());
        pg.check_sanity().unwrap();
    }

    #[test]
    fn cancellation_is_observed_before_doing_any_work() {
        let g = crossover_graph();
        let mut pg = PartitionGraph::initial(g);
        let nfby_a_c =
            BinaryInvariant::never_followed_by(EventType::label("a"), EventType::label("c"), Relation::temporal());
        let invariants = MinedInvariants::from(vec![nfby_a_c]);
        let mut engine = BisimulationEngine::new(Config::default());
        let cancel = AtomicBool::new(true);
        let err = engine.refine(&mut pg, &invariants, &cancel).unwrap_err();
        assert!(matches!(err, crate::error::SynopticError::Cancelled));
    }
}
