//! Courier Flow dispatcher maintenance tool.
//!
//! Replays one position-resolution pass against a captured state snapshot
//! and reports what moved. Live table attachment and reload triggering
//! belong to the configuration component; this tool works on snapshots.
//!
//! Usage:
//!     courier-dispatch --snapshot state.json [--write]

use clap::Parser;
use courier_dispatch::resolver::{resolve_positions, ReclaimPolicy};
use courier_dispatch::snapshot::StateSnapshot;
use courier_logging::LogConfig;
use courier_protocol::TuningConfig;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "courier-dispatch", about = "Dispatcher state maintenance for Courier Flow")]
struct Args {
    /// State snapshot to resolve (JSON)
    #[arg(long)]
    snapshot: PathBuf,

    /// Tuning config file (JSON); COURIER_* environment variables override
    #[arg(long)]
    tuning: Option<PathBuf>,

    /// Write the corrected snapshot back in place
    #[arg(long)]
    write: bool,

    /// Keep a matching placeholder instead of reinitializing it
    #[arg(long)]
    reuse_placeholder: bool,

    /// Mirror the full log stream to the console
    #[arg(long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    courier_logging::init_logging(LogConfig {
        process_name: "courier-dispatch",
        verbose: args.verbose,
    })?;

    let tuning = match &args.tuning {
        Some(path) => TuningConfig::load(path)?.apply_env(),
        None => TuningConfig::from_env(),
    };
    let policy = if args.reuse_placeholder {
        ReclaimPolicy::ReusePlaceholder
    } else {
        ReclaimPolicy::Reinitialize
    };

    tracing::info!("Resolving cached positions");
    tracing::info!("  Snapshot: {}", args.snapshot.display());
    tracing::info!("  Policy: {:?}", policy);

    let mut snapshot = StateSnapshot::load(&args.snapshot)?;
    let report = resolve_positions(
        &mut snapshot.hosts,
        &mut snapshot.dirs,
        &mut snapshot.connections,
        &tuning,
        policy,
    )?;

    tracing::info!(
        connections = report.connections_seen,
        hosts_repositioned = report.hosts_repositioned,
        host_fallbacks = report.host_fallbacks,
        dirs_repositioned = report.dirs_repositioned,
        dir_fallbacks = report.dir_fallbacks,
        "Resolution pass complete"
    );

    if args.write {
        snapshot.save(&args.snapshot)?;
    }
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
