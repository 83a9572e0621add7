//! Error kinds produced at the core's boundary and by its internal
//! consistency checks.

use crate::invariants::BinaryInvariant;
use crate::partition::Operation;
use crate::time::TimeType;

/// Rejected malformed input at the parser/core boundary. The core never
/// raises this once a [`crate::trace_graph::TraceGraph`] has been built
/// successfully.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("edge references event index {index} but the log only has {len} events")]
    DanglingEdge { index: usize, len: usize },
    #[error("always-precedes invariant requires distinct operands, got {0:?} twice")]
    ReflexiveAlwaysPrecedes(crate::event::EventType),
    #[error("log contains no events")]
    EmptyLog,
    #[error("event {index} has timestamp type {actual:?}, but the log declares {expected:?}")]
    TimeTypeMismatch {
        index: usize,
        expected: TimeType,
        actual: TimeType,
    },
}

/// Errors surfaced by the checking and bisimulation engines.
///
/// `InvariantsUnsatisfiable` and `InternalInconsistency` are fatal: the
/// caller should stop and report. `Cancelled` carries no payload beyond the
/// fact that a cooperative cancel flag was observed; the caller already
/// holds the partial [`crate::partition::PartitionGraph`] it was mutating.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum SynopticError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("refinement exhausted candidate splits with {invariant:?} still violated")]
    InvariantsUnsatisfiable { invariant: BinaryInvariant },

    /// `pending_op` is the operation that was being applied when the
    /// inconsistency was detected; `inverse_op` is its inverse, if one had
    /// already been computed at the point of failure. Carrying both
    /// structurally (rather than folding them into `detail`) lets a caller
    /// attempt to reproduce or roll back the failure.
    #[error("internal consistency check failed: {detail}")]
    InternalInconsistency {
        detail: String,
        pending_op: Option<Box<dyn Operation>>,
        inverse_op: Option<Box<dyn Operation>>,
    },

    #[error("cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, SynopticError>;
