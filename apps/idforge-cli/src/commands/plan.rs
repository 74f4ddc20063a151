//! Plan command: show what a provisioning run would do

use std::path::PathBuf;

use clap::Args;
use idforge_provisioning::Orchestrator;

use crate::commands::{load_topology, DirectoryArgs};
use crate::error::CliResult;
use crate::output::print_plan;

/// Arguments for the plan command
#[derive(Debug, Args)]
pub struct PlanArgs {
    /// Path to the topology YAML file
    #[arg(short = 'f', long = "file", default_value = "topology.yaml")]
    pub file: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub directory: DirectoryArgs,
}

/// Execute the plan command
pub async fn execute(args: PlanArgs) -> CliResult<()> {
    let topology = load_topology(&args.file)?;
    let directory = args.directory.connect()?;

    let plan = Orchestrator::for_topology(directory, &topology)
        .plan(&topology)
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        print_plan(&plan);
    }
    Ok(())
}
