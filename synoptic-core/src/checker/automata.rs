//! The three-state automaton shared by both checker modes. One instance
//! tracks one [`BinaryInvariant`] along one path through the partition
//! graph; [`StateBits`] is a small lattice of which of the three states
//! (`NEUTRAL`, `SAW_A`, `FAIL`) are reachable along *some* path to a given
//! partition, merged by union as paths converge.

use crate::event::EventType;
use crate::invariants::InvariantKind;

/// Which of the automaton's three states are currently reachable. A
/// partition can have more than one bit set: two different incoming paths
/// can leave it in different states.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StateBits {
    pub neutral: bool,
    pub saw_a: bool,
    pub fail: bool,
}

impl StateBits {
    pub const NEUTRAL: StateBits = StateBits {
        neutral: true,
        saw_a: false,
        fail: false,
    };

    pub fn is_empty(&self) -> bool {
        !self.neutral && !self.saw_a && !self.fail
    }

    pub fn union(self, other: StateBits) -> StateBits {
        StateBits {
            neutral: self.neutral || other.neutral,
            saw_a: self.saw_a || other.saw_a,
            fail: self.fail || other.fail,
        }
    }

    pub fn is_subset_of(&self, other: &StateBits) -> bool {
        (!self.neutral || other.neutral) && (!self.saw_a || other.saw_a) && (!self.fail || other.fail)
    }
}

/// Advances `cur` across one event of type `event_type`, arriving at a
/// partition flagged `is_accept` iff it holds a trace-final event.
///
/// `FAIL` is absorbing in every kind: once reachable it stays reachable
/// along that path no matter what follows. `AlwaysFollowedBy` additionally
/// fails a still-pending `SAW_A` path the moment it reaches an accepting
/// partition — the only kind where arrival at accept itself can fail a
/// path, since "eventually" has run out of events to wait for.
pub fn step(kind: InvariantKind, cur: StateBits, event_type: &EventType, a: &EventType, b: &EventType, is_accept: bool) -> StateBits {
    let is_a = event_type == a;
    let is_b = event_type == b;

    let mut next = StateBits::default();
    if cur.fail {
        next.fail = true;
    }
    if cur.neutral {
        next = next.union(step_from_neutral(kind, is_a, is_b));
    }
    if cur.saw_a {
        next = next.union(step_from_saw_a(kind, is_a, is_b));
    }

    if kind == InvariantKind::AlwaysFollowedBy && is_accept && next.saw_a {
        next.fail = true;
    }
    next
}

fn step_from_neutral(kind: InvariantKind, is_a: bool, is_b: bool) -> StateBits {
    match kind {
        InvariantKind::AlwaysFollowedBy | InvariantKind::NeverFollowedBy => {
            if is_a {
                StateBits {
                    saw_a: true,
                    ..Default::default()
                }
            } else {
                StateBits::NEUTRAL
            }
        }
        InvariantKind::AlwaysPrecedes => {
            if is_b {
                StateBits {
                    fail: true,
                    ..Default::default()
                }
            } else if is_a {
                StateBits {
                    saw_a: true,
                    ..Default::default()
                }
            } else {
                StateBits::NEUTRAL
            }
        }
    }
}

fn step_from_saw_a(kind: InvariantKind, is_a: bool, is_b: bool) -> StateBits {
    match kind {
        InvariantKind::AlwaysFollowedBy => {
            if is_b {
                StateBits::NEUTRAL
            } else {
                StateBits {
                    saw_a: true,
                    ..Default::default()
                }
            }
        }
        InvariantKind::NeverFollowedBy => {
            if is_b {
                StateBits {
                    fail: true,
                    ..Default::default()
                }
            } else {
                StateBits {
                    saw_a: true,
                    ..Default::default()
                }
            }
        }
        InvariantKind::AlwaysPrecedes => {
            let _ = (is_a, is_b);
            StateBits {
                saw_a: true,
                ..Default::default()
            }
        }
    }
}
