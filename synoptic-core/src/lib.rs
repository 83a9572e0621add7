//! Infers a concise finite-state model of a system from a collection of
//! execution traces.
//!
//! The pipeline, corresponding to `spec.md`'s component table:
//!
//! 1. [`trace_graph::TraceGraph`] (C1) — an immutable DAG/chain of observed
//!    events, built once from a [`input::ParsedLog`] and read-only after.
//! 2. [`closure::TransitiveClosure`] (C2) — a per-relation reachability
//!    matrix, computed once per mining run.
//! 3. [`invariants::InvariantMiner`] (C3) — mines `AlwaysFollowedBy` /
//!    `AlwaysPrecedes` / `NeverFollowedBy` invariants from the closure.
//! 4. [`partition::PartitionGraph`] (C4) — a mutable coarsening of the
//!    trace graph, starting from one partition per event type.
//! 5. [`checker`] (C5) — a two-mode FSM model checker: a fast bitset
//!    fixpoint pass decides sat/unsat, a tracing pass recovers the
//!    shortest counter-example for whatever failed.
//! 6. [`bisimulation::BisimulationEngine`] (C6) — alternates refinement
//!    (splitting partitions to eliminate counter-examples) and coarsening
//!    (merging k-equivalent partitions) until the graph satisfies every
//!    mined invariant while being as small as possible.
//!
//! Parsing log lines, exporting dot/PNG, and command-line option plumbing
//! are all out of scope — this crate starts from an already-parsed
//! [`input::ParsedLog`] and ends at an inferred [`partition::PartitionGraph`].

pub mod bisimulation;
pub mod checker;
pub mod closure;
pub mod config;
pub mod error;
pub mod event;
mod hash;
pub mod input;
pub mod invariants;
pub mod ktails;
pub mod partition;
mod rng;
pub mod time;
pub mod trace_graph;

pub use bisimulation::{BisimulationEngine, BisimulationReport};
pub use config::Config;
pub use error::{ParseError, SynopticError};
pub use invariants::{BinaryInvariant, InvariantMiner, MinedInvariants};
pub use partition::PartitionGraph;
pub use trace_graph::TraceGraph;
