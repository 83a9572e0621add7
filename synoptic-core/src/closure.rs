//! The transitive-closure computer: a per-relation boolean reachability
//! matrix, computed once per mining run and discarded.

use crate::event::{EventId, Relation};
use crate::hash::HashMap;
use crate::trace_graph::TraceGraph;
use fixedbitset::FixedBitSet;

/// Selects the closure algorithm. Both produce the same matrix; they differ
/// only in how they get there.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// Repeated relaxation: `reach(u,w) && reach(w,v) => reach(u,v)` until a
    /// pass makes no change.
    Warshall,
    /// Depth-first reachability marking from each node.
    Recursive,
}

/// `reach(u, v)` for one relation, answerable in O(1) once built.
pub struct TransitiveClosure {
    index: HashMap<EventId, usize>,
    ids: Vec<EventId>,
    reach: FixedBitSet,
    n: usize,
}

impl TransitiveClosure {
    pub fn compute(graph: &TraceGraph, relation: &Relation, strategy: Strategy) -> Self {
        let ids: Vec<EventId> = graph.iter().map(|(id, _)| id).collect();
        let n = ids.len();
        let mut index = HashMap::default();
        index.reserve(n);
        for (i, id) in ids.iter().enumerate() {
            index.insert(*id, i);
        }

        let mut reach = FixedBitSet::with_capacity(n * n);
        for (i, id) in ids.iter().enumerate() {
            for t in graph.get(*id).outgoing(relation) {
                if let Some(&j) = index.get(&t.target) {
                    reach.insert(i * n + j);
                }
            }
        }

        match strategy {
            Strategy::Warshall => warshall(&mut reach, n),
            Strategy::Recursive => recursive(&mut reach, &ids, &index, graph, relation, n),
        }

        TransitiveClosure { index, ids, reach, n }
    }

    pub fn is_reachable(&self, u: EventId, v: EventId) -> bool {
        let (Some(&i), Some(&j)) = (self.index.get(&u), self.index.get(&v)) else {
            return false;
        };
        self.reach.contains(i * self.n + j)
    }

    /// All event ids considered by this closure, in the order used
    /// internally. Exposed for callers (the invariant miner) that want to
    /// iterate events without re-walking the trace graph.
    pub fn ids(&self) -> &[EventId] {
        &self.ids
    }
}

fn warshall(reach: &mut FixedBitSet, n: usize) {
    for k in 0..n {
        // Collect once: rows don't change shape, only content, across this k.
        let k_preds: Vec<usize> = (0..n).filter(|&i| reach.contains(i * n + k)).collect();
        if k_preds.is_empty() {
            continue;
        }
        let k_succs: Vec<usize> = (0..n).filter(|&j| reach.contains(k * n + j)).collect();
        for &i in &k_preds {
            for &j in &k_succs {
                reach.insert(i * n + j);
            }
        }
    }
}

fn recursive(
    reach: &mut FixedBitSet,
    ids: &[EventId],
    index: &HashMap<EventId, usize>,
    graph: &TraceGraph,
    relation: &Relation,
    n: usize,
) {
    for start in 0..n {
        let mut visited = vec![false; n];
        let mut stack = vec![start];
        while let Some(u) = stack.pop() {
            for t in graph.get(ids[u]).outgoing(relation) {
                let Some(&v) = index.get(&t.target) else {
                    continue;
                };
                if !visited[v] {
                    visited[v] = true;
                    reach.insert(start * n + v);
                    stack.push(v);
                }
            }
        }
    }
}
