//! CLI error types and exit codes

use idforge_directory::DirectoryError;
use idforge_provisioning::ProvisioningError;
use thiserror::Error;

/// Exit codes for the CLI
/// - 0: Success
/// - 1: General error
/// - 2: Authentication failed
/// - 4: Validation error (topology or arguments)
/// - 6: Run finished with per-resource errors
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Run interrupted")]
    Interrupted,

    #[error("{0} resource(s) failed to provision")]
    PartialFailure(usize),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::AuthenticationFailed(_) => 2,
            CliError::Validation(_) | CliError::Config(_) => 4,
            CliError::PartialFailure(_) => 6,
            CliError::Io(_) => 1,
            CliError::Interrupted => 130,
        }
    }

    /// Print the error with a suggestion when one applies
    pub fn print(&self) {
        eprintln!("Error: {self}");
        if let Some(suggestion) = self.suggestion() {
            eprintln!("\nSuggestion: {suggestion}");
        }
    }

    fn suggestion(&self) -> Option<&'static str> {
        match self {
            CliError::AuthenticationFailed(_) => Some(
                "Check IDFORGE_TENANT_ID, IDFORGE_CLIENT_ID and IDFORGE_CLIENT_SECRET, and that the secret has not expired.",
            ),
            CliError::PartialFailure(_) => {
                Some("Fix the reported errors and run again; existing resources will be adopted.")
            }
            _ => None,
        }
    }
}

impl From<ProvisioningError> for CliError {
    fn from(err: ProvisioningError) -> Self {
        match err {
            ProvisioningError::Precondition(source) => {
                CliError::AuthenticationFailed(source.to_string())
            }
            ProvisioningError::InvalidTopology(_) | ProvisioningError::Yaml(_) => {
                CliError::Validation(err.to_string())
            }
            ProvisioningError::Io { .. } => CliError::Io(err.to_string()),
        }
    }
}

impl From<DirectoryError> for CliError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::Config(message) => CliError::Config(message),
            DirectoryError::Auth(message) => CliError::AuthenticationFailed(message),
            other => CliError::Io(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::Io(format!("failed to encode output: {err}"))
    }
}
