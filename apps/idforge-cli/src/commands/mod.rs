//! CLI command implementations

pub mod plan;
pub mod provision;
pub mod validate;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use idforge_directory::{CloudEnvironment, DirectoryConfig, DirectoryCredentials, GraphDirectory};
use idforge_provisioning::Topology;
use secrecy::SecretString;
use tracing::debug;

use crate::error::{CliError, CliResult};

/// Connection settings for the directory tenant
#[derive(Args)]
pub struct DirectoryArgs {
    /// Directory tenant id
    #[arg(long, env = "IDFORGE_TENANT_ID")]
    pub tenant_id: String,

    /// Client id of the provisioning application
    #[arg(long, env = "IDFORGE_CLIENT_ID")]
    pub client_id: String,

    /// Client secret of the provisioning application
    #[arg(long, env = "IDFORGE_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: String,

    /// National cloud (commercial, us_government, china)
    #[arg(long, env = "IDFORGE_CLOUD", default_value = "commercial")]
    pub cloud: CloudEnvironment,

    /// Per-request timeout in seconds
    #[arg(long, env = "IDFORGE_REQUEST_TIMEOUT", default_value_t = 30)]
    pub request_timeout: u64,

    /// Override the Graph endpoint (testing against a local mock)
    #[arg(long, env = "IDFORGE_GRAPH_ENDPOINT", hide = true)]
    pub graph_endpoint: Option<String>,

    /// Override the token endpoint root
    #[arg(long, env = "IDFORGE_LOGIN_ENDPOINT", hide = true)]
    pub login_endpoint: Option<String>,
}

impl std::fmt::Debug for DirectoryArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryArgs")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("cloud", &self.cloud)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl DirectoryArgs {
    /// Build the Graph-backed directory client
    pub fn connect(&self) -> CliResult<Arc<GraphDirectory>> {
        let mut builder = DirectoryConfig::builder()
            .tenant_id(&self.tenant_id)
            .cloud_environment(self.cloud)
            .request_timeout(Duration::from_secs(self.request_timeout));
        if let Some(endpoint) = &self.graph_endpoint {
            builder = builder.graph_endpoint(endpoint);
        }
        if let Some(endpoint) = &self.login_endpoint {
            builder = builder.login_endpoint(endpoint);
        }
        let config = builder.build()?;

        if self.client_id.trim().is_empty() {
            return Err(CliError::Config("client id must not be empty".to_string()));
        }
        let credentials = DirectoryCredentials {
            client_id: self.client_id.clone(),
            client_secret: SecretString::from(self.client_secret.clone()),
        };

        debug!(
            tenant_id = %config.tenant_id,
            cloud = ?config.cloud_environment,
            "Connecting to directory"
        );
        Ok(Arc::new(GraphDirectory::new(&config, credentials)?))
    }
}

/// Load and validate a topology file
pub fn load_topology(path: &Path) -> CliResult<Topology> {
    if !path.exists() {
        return Err(CliError::Validation(format!(
            "File not found: {}",
            path.display()
        )));
    }
    Ok(Topology::from_path(path)?)
}
