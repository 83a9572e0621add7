//! Run configuration. A plain struct; no flag parser lives here — command
//! line option plumbing is left to whatever CLI wraps this crate.

/// Options recognised by the mining/checking/bisimulation pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Enable the bit-set/tracing FSM checker. When `false`, the caller is
    /// expected to route invariant checking through an external LTL
    /// checker; this crate only implements the `true` path.
    pub use_fsm_checker: bool,
    /// Skip the refinement (splitting) phase. Diagnostic only.
    pub no_refinement: bool,
    /// Skip the coarsening (merging) phase. Diagnostic only.
    pub no_coarsening: bool,
    /// Run `PartitionGraph::check_sanity` after every applied operation.
    pub perform_extra_checks: bool,
    /// Seed for the deterministic counter-example shuffle.
    pub random_seed: u64,
    /// Emit incoming-based candidate splits during refinement, in addition
    /// to outgoing-based ones.
    pub incoming_transition_split: bool,
    /// Depth of the k-Tails equivalence used during coarsening.
    pub k_tails_k: u32,
    /// Use the iterative (Warshall) transitive-closure algorithm instead of
    /// the recursive depth-first one.
    pub warshall_transitive_closure: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            use_fsm_checker: true,
            no_refinement: false,
            no_coarsening: false,
            perform_extra_checks: false,
            random_seed: 0xC0FFEE,
            incoming_transition_split: false,
            k_tails_k: 1,
            warshall_transitive_closure: true,
        }
    }
}
