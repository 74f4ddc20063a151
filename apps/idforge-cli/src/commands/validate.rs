//! Validate command: check a topology file without contacting the directory

use std::path::PathBuf;

use clap::Args;
use idforge_provisioning::Topology;

use crate::commands::load_topology;
use crate::error::CliResult;

/// Arguments for the validate command
#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Path to the topology YAML file
    #[arg(short = 'f', long = "file", default_value = "topology.yaml")]
    pub file: PathBuf,
}

/// Execute the validate command
pub fn execute(args: ValidateArgs) -> CliResult<()> {
    let topology = load_topology(&args.file)?;
    println!("{}", summarize(&topology));
    Ok(())
}

fn summarize(topology: &Topology) -> String {
    let elevated = topology
        .applications
        .iter()
        .filter(|spec| spec.admin_authorization)
        .count();
    format!(
        "✓ Topology is valid: {} application(s), {} enterprise object(s), {} permission edge(s), {} requesting admin authorization.",
        topology.applications.len(),
        topology.enterprise.len(),
        topology.permission_edges.len(),
        elevated
    )
}
