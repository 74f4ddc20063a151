//! Directory client configuration.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::{DirectoryError, DirectoryResult};

/// Upper bound for [`DirectoryConfig::max_transient_retries`].
pub const MAX_TRANSIENT_RETRIES: u32 = 10;

/// National cloud hosting the directory tenant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloudEnvironment {
    /// Global Azure cloud.
    #[default]
    Commercial,
    /// Azure US Government.
    UsGovernment,
    /// Azure operated by 21Vianet.
    China,
}

impl CloudEnvironment {
    /// Microsoft Graph root for this cloud.
    #[must_use]
    pub fn graph_endpoint(&self) -> &'static str {
        match self {
            Self::Commercial => "https://graph.microsoft.com",
            Self::UsGovernment => "https://graph.microsoft.us",
            Self::China => "https://microsoftgraph.chinacloudapi.cn",
        }
    }

    /// Token issuer root for this cloud.
    #[must_use]
    pub fn login_endpoint(&self) -> &'static str {
        match self {
            Self::Commercial => "https://login.microsoftonline.com",
            Self::UsGovernment => "https://login.microsoftonline.us",
            Self::China => "https://login.chinacloudapi.cn",
        }
    }
}

impl FromStr for CloudEnvironment {
    type Err = DirectoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "commercial" | "global" | "public" => Ok(Self::Commercial),
            "us_government" | "usgov" | "gcc-high" => Ok(Self::UsGovernment),
            "china" => Ok(Self::China),
            other => Err(DirectoryError::Config(format!(
                "unknown cloud environment '{other}'"
            ))),
        }
    }
}

/// Application credentials used for the client-credentials grant.
#[derive(Debug, Clone)]
pub struct DirectoryCredentials {
    pub client_id: String,
    pub client_secret: SecretString,
}

/// Connection settings for the directory.
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub tenant_id: String,
    pub cloud_environment: CloudEnvironment,
    pub api_version: String,
    /// Per-call timeout. A timed out call is reported as transient.
    pub request_timeout: Duration,
    /// Retries for 429 and gateway errors inside a single call.
    pub max_transient_retries: u32,
    /// Initial backoff between transient retries, doubled each time.
    pub transient_backoff: Duration,
    /// Replaces the cloud's Graph root (used against local mocks).
    pub graph_endpoint_override: Option<String>,
    /// Replaces the cloud's token issuer root.
    pub login_endpoint_override: Option<String>,
}

impl DirectoryConfig {
    /// Starts a builder.
    #[must_use]
    pub fn builder() -> DirectoryConfigBuilder {
        DirectoryConfigBuilder::default()
    }

    /// Graph root actually used for requests.
    #[must_use]
    pub fn graph_endpoint(&self) -> &str {
        self.graph_endpoint_override
            .as_deref()
            .unwrap_or_else(|| self.cloud_environment.graph_endpoint())
    }

    /// Token issuer root actually used for authentication.
    #[must_use]
    pub fn login_endpoint(&self) -> &str {
        self.login_endpoint_override
            .as_deref()
            .unwrap_or_else(|| self.cloud_environment.login_endpoint())
    }

    /// OAuth scope requested for Graph tokens. Always the real Graph
    /// resource of the cloud, even when the endpoint is overridden.
    #[must_use]
    pub fn token_scope(&self) -> String {
        format!("{}/.default", self.cloud_environment.graph_endpoint())
    }
}

/// Builder for [`DirectoryConfig`].
#[derive(Debug, Default)]
pub struct DirectoryConfigBuilder {
    tenant_id: Option<String>,
    cloud_environment: CloudEnvironment,
    api_version: Option<String>,
    request_timeout: Option<Duration>,
    max_transient_retries: Option<u32>,
    transient_backoff: Option<Duration>,
    graph_endpoint_override: Option<String>,
    login_endpoint_override: Option<String>,
}

impl DirectoryConfigBuilder {
    #[must_use]
    pub fn tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    #[must_use]
    pub fn cloud_environment(mut self, cloud: CloudEnvironment) -> Self {
        self.cloud_environment = cloud;
        self
    }

    #[must_use]
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn max_transient_retries(mut self, retries: u32) -> Self {
        self.max_transient_retries = Some(retries);
        self
    }

    #[must_use]
    pub fn transient_backoff(mut self, backoff: Duration) -> Self {
        self.transient_backoff = Some(backoff);
        self
    }

    #[must_use]
    pub fn graph_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.graph_endpoint_override = Some(endpoint.into().trim_end_matches('/').to_string());
        self
    }

    #[must_use]
    pub fn login_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.login_endpoint_override = Some(endpoint.into().trim_end_matches('/').to_string());
        self
    }

    /// Validates and builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::Config`] when the tenant id is missing, a
    /// duration is zero or the transient retry count exceeds
    /// [`MAX_TRANSIENT_RETRIES`].
    pub fn build(self) -> DirectoryResult<DirectoryConfig> {
        let tenant_id = self
            .tenant_id
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| DirectoryError::Config("tenant_id is required".to_string()))?;

        let request_timeout = self.request_timeout.unwrap_or(Duration::from_secs(30));
        if request_timeout.is_zero() {
            return Err(DirectoryError::Config(
                "request_timeout must be greater than zero".to_string(),
            ));
        }

        let max_transient_retries = self.max_transient_retries.unwrap_or(3);
        if max_transient_retries > MAX_TRANSIENT_RETRIES {
            return Err(DirectoryError::Config(format!(
                "max_transient_retries must be at most {MAX_TRANSIENT_RETRIES}"
            )));
        }

        Ok(DirectoryConfig {
            tenant_id,
            cloud_environment: self.cloud_environment,
            api_version: self.api_version.unwrap_or_else(|| "v1.0".to_string()),
            request_timeout,
            max_transient_retries,
            transient_backoff: self.transient_backoff.unwrap_or(Duration::from_secs(1)),
            graph_endpoint_override: self.graph_endpoint_override,
            login_endpoint_override: self.login_endpoint_override,
        })
    }
}
