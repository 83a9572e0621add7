//! Event types, relations, and the observed-event arena.

use crate::hash::IndexMap;
use crate::time::{ITime, TimeDelta};
use smallvec::SmallVec;
use std::fmt;

slotmap::new_key_type! {
    /// Arena key for an [`EventNode`]. Cheap to copy, stable for the
    /// lifetime of the [`crate::trace_graph::TraceGraph`] that owns it.
    pub struct EventId;
}

/// Identifies the trace a node was observed in. `u32::MAX` is reserved for
/// the dummy INITIAL/TERMINAL nodes, which belong to no single trace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TraceId(pub u32);

impl TraceId {
    pub const DUMMY: TraceId = TraceId(u32::MAX);
}

/// A kind of event: a plain label, or a distributed `(label, process)` pair.
///
/// `INITIAL` and `TERMINAL` are plain labels reserved for the two dummy
/// nodes every [`crate::trace_graph::TraceGraph`] carries.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum EventType {
    Label(Box<str>),
    Distributed { label: Box<str>, process: Box<str> },
}

impl EventType {
    pub const INITIAL_LABEL: &'static str = "INITIAL";
    pub const TERMINAL_LABEL: &'static str = "TERMINAL";

    pub fn label(label: impl Into<Box<str>>) -> Self {
        EventType::Label(label.into())
    }

    pub fn distributed(label: impl Into<Box<str>>, process: impl Into<Box<str>>) -> Self {
        EventType::Distributed {
            label: label.into(),
            process: process.into(),
        }
    }

    pub fn initial() -> Self {
        EventType::label(Self::INITIAL_LABEL)
    }

    pub fn terminal() -> Self {
        EventType::label(Self::TERMINAL_LABEL)
    }

    pub fn name(&self) -> &str {
        match self {
            EventType::Label(l) => l,
            EventType::Distributed { label, .. } => label,
        }
    }

    pub fn is_initial(&self) -> bool {
        matches!(self, EventType::Label(l) if &**l == Self::INITIAL_LABEL)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, EventType::Label(l) if &**l == Self::TERMINAL_LABEL)
    }

    /// True for either of the two distinguished dummy types. The invariant
    /// miner filters tautological pairs by testing this.
    pub fn is_special(&self) -> bool {
        self.is_initial() || self.is_terminal()
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::Label(l) => write!(f, "{l}"),
            EventType::Distributed { label, process } => write!(f, "{label}@{process}"),
        }
    }
}

/// A relation name. Stored inline for the near-universal default relation
/// `"t"` so the common case never allocates.
#[derive(Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Relation(SmallVec<[u8; 8]>);

impl Relation {
    pub const TEMPORAL_NAME: &'static str = "t";

    pub fn new(name: &str) -> Self {
        Relation(SmallVec::from_slice(name.as_bytes()))
    }

    pub fn temporal() -> Self {
        Self::new(Self::TEMPORAL_NAME)
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).expect("Relation is always constructed from valid UTF-8")
    }
}

impl Default for Relation {
    fn default() -> Self {
        Self::temporal()
    }
}

impl fmt::Debug for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Relation({:?})", self.as_str())
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Serialized as its string form; `SmallVec` isn't built with its own
/// `serde` feature here; carrying a whole extra dependency feature to
/// derive this for an 8-byte-inline newtype isn't worth it.
#[cfg(feature = "serialize")]
impl serde::Serialize for Relation {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(feature = "serialize")]
impl<'de> serde::Deserialize<'de> for Relation {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <std::borrow::Cow<'de, str> as serde::Deserialize>::deserialize(deserializer)?;
        Ok(Relation::new(&s))
    }
}

/// A directed edge `source -> target` labelled by a relation, carrying one
/// delta-time value and (for edges produced by a merge) the series of
/// deltas that were folded into it.
#[derive(Clone, Debug)]
pub struct Transition<N> {
    pub source: N,
    pub target: N,
    pub relation: Relation,
    pub delta: TimeDelta,
    pub deltas: SmallVec<[TimeDelta; 1]>,
}

impl<N: Copy> Transition<N> {
    pub fn new(source: N, target: N, relation: Relation, delta: TimeDelta) -> Self {
        let deltas = SmallVec::from_elem(delta.clone(), 1);
        Transition {
            source,
            target,
            relation,
            delta,
            deltas,
        }
    }

    /// Folds `other`'s delta series into this transition, as happens when a
    /// [`crate::partition::Merge`] collapses two parallel event-level edges
    /// into one induced partition-level edge.
    pub fn absorb(&mut self, other: &Transition<N>) {
        self.deltas.extend(other.deltas.iter().cloned());
    }
}

/// A single observed event occurrence.
#[derive(Clone, Debug)]
pub struct EventNode {
    pub event_type: EventType,
    pub trace_id: TraceId,
    pub line: Option<u32>,
    pub time: ITime,
    pub(crate) outgoing: IndexMap<Relation, SmallVec<[Transition<EventId>; 2]>>,
    pub(crate) incoming: IndexMap<Relation, SmallVec<[Transition<EventId>; 2]>>,
}

impl EventNode {
    pub fn new(event_type: EventType, trace_id: TraceId, line: Option<u32>, time: ITime) -> Self {
        EventNode {
            event_type,
            trace_id,
            line,
            time,
            outgoing: IndexMap::default(),
            incoming: IndexMap::default(),
        }
    }

    pub fn outgoing(&self, relation: &Relation) -> &[Transition<EventId>] {
        self.outgoing
            .get(relation)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn incoming(&self, relation: &Relation) -> &[Transition<EventId>] {
        self.incoming
            .get(relation)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn relations(&self) -> impl Iterator<Item = &Relation> {
        self.outgoing.keys()
    }

    pub(crate) fn add_outgoing(&mut self, t: Transition<EventId>) {
        self.outgoing.entry(t.relation.clone()).or_default().push(t);
    }

    pub(crate) fn add_incoming(&mut self, t: Transition<EventId>) {
        self.incoming.entry(t.relation.clone()).or_default().push(t);
    }
}
