//! The trace graph: an immutable container of [`EventNode`]s, built
//! once by [`TraceGraph::from_parsed_log`] and read-only thereafter.

use crate::error::ParseError;
use crate::event::{EventId, EventNode, EventType, Relation, TraceId, Transition};
use crate::hash::{HashMap, HashSet};
use crate::input::ParsedLog;
use crate::time::TimeDelta;
use slotmap::SlotMap;

/// Whether every trace is totally ordered (`Chain`) or admits concurrent
/// branches (`Dag`). Informational only — every algorithm in this crate
/// works identically on either shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraceShape {
    Chain,
    Dag,
}

/// Immutable container of [`EventNode`]s plus the dummy INITIAL/TERMINAL
/// nodes every log is given.
#[derive(Debug)]
pub struct TraceGraph {
    events: SlotMap<EventId, EventNode>,
    initial: EventId,
    terminal: EventId,
    shape: TraceShape,
    relations: Vec<Relation>,
}

impl TraceGraph {
    pub fn from_parsed_log(log: ParsedLog) -> Result<Self, ParseError> {
        if log.events.is_empty() {
            return Err(ParseError::EmptyLog);
        }
        for (index, parsed) in log.events.iter().enumerate() {
            let actual = parsed.time.time_type();
            if actual != log.time_type {
                return Err(ParseError::TimeTypeMismatch {
                    index,
                    expected: log.time_type,
                    actual,
                });
            }
        }

        let mut events: SlotMap<EventId, EventNode> = SlotMap::with_key();
        let mut index_to_id: Vec<EventId> = Vec::with_capacity(log.events.len());
        for parsed in &log.events {
            let id = events.insert(EventNode::new(
                parsed.event_type.clone(),
                parsed.trace_id,
                parsed.line,
                parsed.time.clone(),
            ));
            index_to_id.push(id);
        }

        let initial = events.insert(EventNode::new(
            EventType::initial(),
            TraceId::DUMMY,
            None,
            log.events[0].time.clone(),
        ));
        let terminal = events.insert(EventNode::new(
            EventType::terminal(),
            TraceId::DUMMY,
            None,
            log.events[0].time.clone(),
        ));

        let mut relations: Vec<Relation> = Vec::new();
        let mut seen_relations = HashSet::default();

        for edge in &log.edges {
            let len = log.events.len();
            if edge.source >= len {
                return Err(ParseError::DanglingEdge {
                    index: edge.source,
                    len,
                });
            }
            if edge.target >= len {
                return Err(ParseError::DanglingEdge {
                    index: edge.target,
                    len,
                });
            }
            let source = index_to_id[edge.source];
            let target = index_to_id[edge.target];
            let delta = events[source].time.delta_to(&events[target].time);
            add_edge(&mut events, source, target, edge.relation.clone(), delta);
            if seen_relations.insert(edge.relation.clone()) {
                relations.push(edge.relation.clone());
            }
        }
        if seen_relations.insert(Relation::temporal()) {
            relations.push(Relation::temporal());
        }

        let temporal = Relation::temporal();
        let mut has_incoming_t: HashSet<EventId> = HashSet::default();
        let mut has_outgoing_t: HashSet<EventId> = HashSet::default();
        for edge in &log.edges {
            if edge.relation == temporal {
                has_outgoing_t.insert(index_to_id[edge.source]);
                has_incoming_t.insert(index_to_id[edge.target]);
            }
        }

        let mut by_trace: HashMap<TraceId, Vec<EventId>> = HashMap::default();
        for (idx, parsed) in log.events.iter().enumerate() {
            by_trace.entry(parsed.trace_id).or_default().push(index_to_id[idx]);
        }

        let mut is_dag = false;
        for ids in by_trace.values() {
            let firsts: Vec<EventId> = ids
                .iter()
                .copied()
                .filter(|id| !has_incoming_t.contains(id))
                .collect();
            let lasts: Vec<EventId> = ids
                .iter()
                .copied()
                .filter(|id| !has_outgoing_t.contains(id))
                .collect();
            if firsts.len() > 1 || lasts.len() > 1 {
                is_dag = true;
            }
            for first in firsts {
                let delta = TimeDelta::ZERO_COUNTER;
                add_edge(&mut events, initial, first, temporal.clone(), delta);
            }
            for last in lasts {
                let delta = TimeDelta::ZERO_COUNTER;
                add_edge(&mut events, last, terminal, temporal.clone(), delta);
            }
            if ids.len() > 1 {
                let mut out_degree_gt1 = false;
                for id in ids {
                    if events[*id].outgoing(&temporal).len() > 1 {
                        out_degree_gt1 = true;
                    }
                }
                if out_degree_gt1 {
                    is_dag = true;
                }
            }
        }

        Ok(TraceGraph {
            events,
            initial,
            terminal,
            shape: if is_dag { TraceShape::Dag } else { TraceShape::Chain },
            relations,
        })
    }

    pub fn get(&self, id: EventId) -> &EventNode {
        &self.events[id]
    }

    pub fn contains(&self, id: EventId) -> bool {
        self.events.contains_key(id)
    }

    pub fn initial_id(&self) -> EventId {
        self.initial
    }

    pub fn terminal_id(&self) -> EventId {
        self.terminal
    }

    pub fn shape(&self) -> TraceShape {
        self.shape
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn iter(&self) -> impl Iterator<Item = (EventId, &EventNode)> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

fn add_edge(
    events: &mut SlotMap<EventId, EventNode>,
    source: EventId,
    target: EventId,
    relation: Relation,
    delta: TimeDelta,
) {
    let forward = Transition::new(source, target, relation.clone(), delta.clone());
    events[source].add_outgoing(forward);
    let backward = Transition::new(source, target, relation, delta);
    events[target].add_incoming(backward);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::TraceId;
    use crate::input::{ParsedEdge, ParsedEvent};
    use crate::time::{ITime, TimeType};

    fn label_log(labels: &[&str]) -> ParsedLog {
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
        ParsedLog {
            events,
            edges,
            time_type: TimeType::Counter,
        }
    }

    #[test]
    fn chain_gets_initial_and_terminal_edges() {
        let g = TraceGraph::from_parsed_log(label_log(&["a", "x", "y", "b"])).unwrap();
        assert_eq!(g.shape(), TraceShape::Chain);
        let first = g
            .iter()
            .find(|(_, n)| n.event_type == EventType::label("a"))
            .unwrap()
            .0;
        assert_eq!(g.get(g.initial_id()).outgoing(&Relation::temporal()).len(), 1);
        assert_eq!(
            g.get(g.initial_id()).outgoing(&Relation::temporal())[0].target,
            first
        );
    }

    #[test]
    fn dangling_edge_is_rejected() {
        let mut log = label_log(&["a", "b"]);
        log.edges.push(ParsedEdge {
            source: 5,
            target: 0,
            relation: Relation::temporal(),
        });
        let err = TraceGraph::from_parsed_log(log).unwrap_err();
        assert_eq!(err, ParseError::DanglingEdge { index: 5, len: 2 });
    }

    #[test]
    fn empty_log_is_rejected() {
        let log = ParsedLog {
            events: vec![],
            edges: vec![],
            time_type: TimeType::Counter,
        };
        assert_eq!(TraceGraph::from_parsed_log(log).unwrap_err(), ParseError::EmptyLog);
    }
}
