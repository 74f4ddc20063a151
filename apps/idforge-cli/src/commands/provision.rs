//! Provision command: converge the tenant on a topology

use std::path::PathBuf;

use clap::Args;
use idforge_provisioning::{Orchestrator, RunReport};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::commands::{load_topology, DirectoryArgs};
use crate::error::{CliError, CliResult};
use crate::output::print_report;

/// Arguments for the provision command
#[derive(Debug, Args)]
pub struct ProvisionArgs {
    /// Path to the topology YAML file
    #[arg(short = 'f', long = "file", default_value = "topology.yaml")]
    pub file: PathBuf,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,

    /// Write the full run report (including credentials) to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print minted credentials in the human-readable output
    #[arg(long)]
    pub show_secrets: bool,

    #[command(flatten)]
    pub directory: DirectoryArgs,
}

/// Execute the provision command
pub async fn execute(args: ProvisionArgs) -> CliResult<()> {
    let topology = load_topology(&args.file)?;
    let directory = args.directory.connect()?;

    let cancel = CancellationToken::new();
    let watcher = tokio::spawn(cancel_on_interrupt(cancel.clone()));

    let result = Orchestrator::for_topology(directory, &topology)
        .run(&topology, &cancel)
        .await;
    watcher.abort();
    let report = result?;

    if let Some(path) = &args.output {
        write_report(path, &report)?;
        info!(path = %path.display(), "Run report written");
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, args.show_secrets);
    }

    exit_status(&report)
}

async fn cancel_on_interrupt(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        warn!("Interrupt received, finishing the current step");
        cancel.cancel();
    }
}

fn write_report(path: &std::path::Path, report: &RunReport) -> CliResult<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)
        .map_err(|e| CliError::Io(format!("failed to write {}: {e}", path.display())))
}

fn exit_status(report: &RunReport) -> CliResult<()> {
    if report.cancelled {
        return Err(CliError::Interrupted);
    }
    if !report.errors.is_empty() {
        return Err(CliError::PartialFailure(report.errors.len()));
    }
    Ok(())
}
