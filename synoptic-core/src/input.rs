//! The shape of a parsed log as handed to the core by the (out-of-scope)
//! parser collaborator.

use crate::event::{EventType, Relation, TraceId};
use crate::time::{ITime, TimeType};

/// One observed event, prior to arena insertion.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ParsedEvent {
    pub event_type: EventType,
    pub trace_id: TraceId,
    pub line: Option<u32>,
    pub time: ITime,
}

/// A direct temporal edge between two events, given as indices into the
/// owning [`ParsedLog::events`] vector.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ParsedEdge {
    pub source: usize,
    pub target: usize,
    pub relation: Relation,
}

/// A complete parsed log: events plus the direct edges between them.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ParsedLog {
    pub events: Vec<ParsedEvent>,
    pub edges: Vec<ParsedEdge>,
    pub time_type: TimeType,
}
