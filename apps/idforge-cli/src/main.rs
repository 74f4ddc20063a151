//! idforge CLI - Provision application identities into a directory tenant
//!
//! This CLI enables operators to:
//! - Validate a topology file offline
//! - Preview which resources a run would create or adopt
//! - Converge a tenant on a topology and capture the run report

use clap::{Parser, Subcommand};

mod commands;
mod error;
mod logging;
mod output;

use error::CliResult;

/// idforge - Identity resource provisioning
#[derive(Parser)]
#[command(name = "idforge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a topology file without contacting the directory
    Validate(commands::validate::ValidateArgs),

    /// Show what a provisioning run would create or adopt
    Plan(commands::plan::PlanArgs),

    /// Provision the topology into the tenant
    Provision(commands::provision::ProvisionArgs),
}

#[tokio::main]
async fn main() {
    // A missing .env file is not an error.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let result = match logging::init_logging(logging::default_filter(cli.verbose), cli.log_json) {
        Ok(()) => run(cli).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            e.print();
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    match cli.command {
        Commands::Validate(args) => commands::validate::execute(args),
        Commands::Plan(args) => commands::plan::execute(args).await,
        Commands::Provision(args) => commands::provision::execute(args).await,
    }
}
