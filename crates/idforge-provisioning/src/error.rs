//! Error types for the provisioning orchestrator.

use idforge_directory::DirectoryError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using `ProvisioningError`.
pub type ProvisioningResult<T> = Result<T, ProvisioningError>;

/// Failures that stop a run (or prevent it from starting).
///
/// Per-resource failures never surface here; they are recorded in the
/// [`RunReport`](crate::RunReport).
#[derive(Debug, Error)]
pub enum ProvisioningError {
    /// The directory rejected the run's credentials.
    #[error("cannot authenticate to the directory: {0}")]
    Precondition(#[source] DirectoryError),

    /// The topology file is structurally valid YAML but semantically wrong.
    #[error("invalid topology: {0}")]
    InvalidTopology(String),

    /// Reading the topology file failed.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The topology file is not valid YAML for the expected shape.
    #[error("failed to parse topology: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Fatal failure for a single resource. Rendered into the run's error list.
#[derive(Debug, Error)]
#[error("{display_name}: failed to {stage}: {source}")]
pub struct ProvisionFailure {
    pub display_name: String,
    pub stage: &'static str,
    #[source]
    pub source: DirectoryError,
}

impl ProvisionFailure {
    pub(crate) fn new(display_name: &str, stage: &'static str, source: DirectoryError) -> Self {
        Self {
            display_name: display_name.to_string(),
            stage,
            source,
        }
    }
}
