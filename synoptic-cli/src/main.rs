//! Demonstration entry point for the `synoptic-core` pipeline. Reads one
//! fixture file shaped like the (out-of-scope) parser collaborator's
//! output, runs mining -> refinement -> coarsening, and prints the
//! resulting invariant set and partition graph summary.
//!
//! This is deliberately not the "command-line option plumbing" `spec.md`
//! excludes from the core: there's exactly one positional argument (a
//! fixture path, defaulting to the bundled demo trace), no flags, no
//! subcommands. Exit codes follow `spec.md` §6: 0 success, 1 parse
//! failure, 2 internal consistency error.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;
use std::sync::atomic::AtomicBool;

use synoptic_core::input::ParsedLog;
use synoptic_core::{BisimulationEngine, Config, InvariantMiner, PartitionGraph, SynopticError, TraceGraph};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let fixture = std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(default_fixture);

    match run(&fixture) {
        Ok(()) => ExitCode::SUCCESS,
        Err(Outcome::ParseFailure(detail)) => {
            tracing::error!(%detail, "parse failure");
            ExitCode::from(1)
        }
        Err(Outcome::InternalError(detail)) => {
            tracing::error!(%detail, "internal consistency error");
            ExitCode::from(2)
        }
    }
}

enum Outcome {
    ParseFailure(String),
    InternalError(String),
}

fn default_fixture() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/demo_trace.json")
}

fn run(fixture: &Path) -> Result<(), Outcome> {
    let raw = std::fs::read_to_string(fixture).map_err(|e| Outcome::ParseFailure(e.to_string()))?;
    let log: ParsedLog = serde_json::from_str(&raw).map_err(|e| Outcome::ParseFailure(e.to_string()))?;

    let mine_span = tracing::info_span!("mine", events = log.events.len(), edges = log.edges.len());
    let graph = {
        let _enter = mine_span.enter();
        TraceGraph::from_parsed_log(log).map_err(|e| Outcome::ParseFailure(e.to_string()))?
    };

    let config = Config::default();
    let mined = InvariantMiner::mine(&graph, &config);
    tracing::info!(count = mined.len(), stats = ?mined.stats(), "mined invariants");

    let mut pg = PartitionGraph::initial(Rc::new(graph));
    let mut engine = BisimulationEngine::new(config);
    let cancel = AtomicBool::new(false);

    let report_span = tracing::info_span!("bisimulation");
    let bisim_report = {
        let _enter = report_span.enter();
        engine.run(&mut pg, &mined, &cancel).map_err(as_outcome)?
    };
    tracing::info!(
        splits = bisim_report.splits_applied,
        merges = bisim_report.merges_applied,
        "refinement and coarsening complete"
    );

    let final_check = synoptic_core::checker::check(&mut pg, mined.as_slice());

    println!("partitions: {}", pg.len());
    println!("mined invariants: {}", mined.len());
    println!(
        "splits applied: {}, merges applied: {}",
        bisim_report.splits_applied, bisim_report.merges_applied
    );
    println!("violations remaining: {}", final_check.violations.len());
    for invariant in mined.iter() {
        println!("  {invariant}");
    }

    Ok(())
}

fn as_outcome(err: SynopticError) -> Outcome {
    match err {
        SynopticError::Parse(parse_err) => Outcome::ParseFailure(parse_err.to_string()),
        other => Outcome::InternalError(other.to_string()),
    }
}
