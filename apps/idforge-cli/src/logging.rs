//! tracing subscriber setup.
//!
//! Human-readable output on stderr by default, JSON lines with `--log-json`.
//! `RUST_LOG` overrides the filter derived from the flags.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{CliError, CliResult};

/// Filter used when `RUST_LOG` is not set.
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "info,idforge=debug,idforge_directory=debug,idforge_provisioning=debug"
    } else {
        "warn,idforge_provisioning=info"
    }
}

/// Initialize the tracing subscriber.
///
/// # Errors
///
/// Fails when the filter cannot be parsed or a subscriber is already set.
pub fn init_logging(filter: &str, json: bool) -> CliResult<()> {
    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .map_err(|e| CliError::Config(format!("invalid log filter: {e}")))?;

    let registry = tracing_subscriber::registry().with(filter_layer);
    let result = if json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .flatten_event(true),
            )
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .try_init()
    };

    result.map_err(|e| CliError::Config(format!("failed to initialize logging: {e}")))?;
    tracing::debug!(filter = %filter, json, "Logging initialized");
    Ok(())
}
