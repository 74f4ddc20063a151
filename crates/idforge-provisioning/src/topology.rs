//! Declarative description of the resources one run provisions.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use url::Url;

use idforge_directory::models::{AccessType, RequiredResourceAccess};

use crate::config::ProvisionerConfig;
use crate::{ProvisioningError, ProvisioningResult};

/// Kind of resource an [`ApplicationSpec`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApplicationKind {
    /// Confidential web application with ID-token issuance.
    Web,
    /// Browser single-page application.
    SinglePage,
    /// Enterprise object with federated (SAML) sign-on.
    EnterpriseSaml,
    /// Enterprise object published through the application proxy.
    EnterpriseProxy,
}

impl ApplicationKind {
    #[must_use]
    pub fn is_enterprise(&self) -> bool {
        matches!(self, Self::EnterpriseSaml | Self::EnterpriseProxy)
    }
}

impl std::fmt::Display for ApplicationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Web => "web",
            Self::SinglePage => "single-page",
            Self::EnterpriseSaml => "enterprise-saml",
            Self::EnterpriseProxy => "enterprise-proxy",
        })
    }
}

/// Delegated permission scope an application exposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeSpec {
    /// Scope value, e.g. `api.access`.
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Only administrators may consent.
    #[serde(default)]
    pub admin_only: bool,
}

impl ScopeSpec {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            admin_only: false,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Input descriptor for one application or enterprise object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationSpec {
    /// Natural key used to find an existing object.
    pub display_name: String,
    pub kind: ApplicationKind,
    #[serde(default)]
    pub exposed_scopes: Vec<ScopeSpec>,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    /// Set the identifier URI to `api://{appId}` once created.
    #[serde(default)]
    pub api_provider: bool,
    #[serde(default = "default_true")]
    pub mint_credential: bool,
    /// Attempt admin authorization of role-type permissions.
    #[serde(default)]
    pub admin_authorization: bool,
    /// Permissions declared at creation time.
    #[serde(default)]
    pub required_permissions: Vec<RequiredResourceAccess>,
    /// Externally facing address of an enterprise object.
    #[serde(default)]
    pub external_url: Option<String>,
}

impl ApplicationSpec {
    #[must_use]
    pub fn new(display_name: impl Into<String>, kind: ApplicationKind) -> Self {
        Self {
            display_name: display_name.into(),
            kind,
            exposed_scopes: Vec::new(),
            redirect_uris: Vec::new(),
            api_provider: false,
            mint_credential: true,
            admin_authorization: false,
            required_permissions: Vec::new(),
            external_url: None,
        }
    }

    #[must_use]
    pub fn with_scope(mut self, name: impl Into<String>) -> Self {
        self.exposed_scopes.push(ScopeSpec::new(name));
        self
    }

    #[must_use]
    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uris.push(uri.into());
        self
    }

    #[must_use]
    pub fn with_external_url(mut self, url: impl Into<String>) -> Self {
        self.external_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_required_permissions(mut self, access: RequiredResourceAccess) -> Self {
        self.required_permissions.push(access);
        self
    }

    #[must_use]
    pub fn api_provider(mut self, enabled: bool) -> Self {
        self.api_provider = enabled;
        self
    }

    #[must_use]
    pub fn mint_credential(mut self, enabled: bool) -> Self {
        self.mint_credential = enabled;
        self
    }

    #[must_use]
    pub fn admin_authorization(mut self, enabled: bool) -> Self {
        self.admin_authorization = enabled;
        self
    }

    /// True if any declared permission is role-type.
    #[must_use]
    pub fn requests_elevated_permissions(&self) -> bool {
        self.required_permissions
            .iter()
            .any(|rra| rra.role_ids().next().is_some())
    }
}

/// Kind of permission a [`PermissionEdge`] declares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionType {
    /// Delegated scope exposed by the target.
    #[default]
    Scope,
    /// Application role exposed by the target.
    Role,
}

impl std::fmt::Display for PermissionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scope => f.write_str("scope"),
            Self::Role => f.write_str("role"),
        }
    }
}

impl From<PermissionType> for AccessType {
    fn from(value: PermissionType) -> Self {
        match value {
            PermissionType::Scope => AccessType::Scope,
            PermissionType::Role => AccessType::Role,
        }
    }
}

/// Directed permission declaration: `source` requests `scope` on `target`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionEdge {
    pub source: String,
    pub target: String,
    pub scope: String,
    #[serde(default)]
    pub permission_type: PermissionType,
}

impl PermissionEdge {
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            scope: scope.into(),
            permission_type: PermissionType::Scope,
        }
    }
}

impl std::fmt::Display for PermissionEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {} ({})", self.source, self.target, self.scope)
    }
}

/// Everything one run provisions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    #[serde(default)]
    pub applications: Vec<ApplicationSpec>,
    #[serde(default)]
    pub enterprise: Vec<ApplicationSpec>,
    #[serde(default)]
    pub permission_edges: Vec<PermissionEdge>,
    #[serde(default)]
    pub settings: ProvisionerConfig,
}

impl Topology {
    /// Parses and validates a topology document.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisioningError::Yaml`] for malformed documents and
    /// [`ProvisioningError::InvalidTopology`] when validation fails.
    pub fn from_yaml_str(yaml: &str) -> ProvisioningResult<Self> {
        let topology: Self = serde_yaml::from_str(yaml)?;
        topology.validate()?;
        Ok(topology)
    }

    /// Reads, parses and validates a topology file.
    ///
    /// # Errors
    ///
    /// See [`Topology::from_yaml_str`]; also fails if the file is unreadable.
    pub fn from_path(path: &Path) -> ProvisioningResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ProvisioningError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    /// Checks cross-references and per-kind requirements.
    ///
    /// # Errors
    ///
    /// Returns the first problem found as [`ProvisioningError::InvalidTopology`].
    pub fn validate(&self) -> ProvisioningResult<()> {
        self.settings.validate()?;
        let mut names = HashSet::new();

        for spec in &self.applications {
            if spec.kind.is_enterprise() {
                return Err(invalid(format!(
                    "'{}' is an {} object and belongs under `enterprise`",
                    spec.display_name, spec.kind
                )));
            }
            validate_spec(spec, &mut names)?;
        }

        for spec in &self.enterprise {
            if !spec.kind.is_enterprise() {
                return Err(invalid(format!(
                    "'{}' has kind {} and belongs under `applications`",
                    spec.display_name, spec.kind
                )));
            }
            validate_spec(spec, &mut names)?;
            let external = spec.external_url.as_deref().ok_or_else(|| {
                invalid(format!("'{}' requires an external_url", spec.display_name))
            })?;
            Url::parse(external).map_err(|e| {
                invalid(format!(
                    "'{}' has an invalid external_url '{external}': {e}",
                    spec.display_name
                ))
            })?;
        }

        for edge in &self.permission_edges {
            for endpoint in [&edge.source, &edge.target] {
                if !names.contains(endpoint.as_str()) {
                    return Err(invalid(format!(
                        "permission edge {edge} references unknown resource '{endpoint}'"
                    )));
                }
            }
            if edge.scope.trim().is_empty() {
                return Err(invalid(format!("permission edge {edge} has an empty scope")));
            }
        }

        Ok(())
    }

    /// All specs in provisioning order: applications first, then enterprise
    /// objects.
    pub fn specs(&self) -> impl Iterator<Item = &ApplicationSpec> {
        self.applications.iter().chain(self.enterprise.iter())
    }
}

fn validate_spec<'a>(
    spec: &'a ApplicationSpec,
    names: &mut HashSet<&'a str>,
) -> ProvisioningResult<()> {
    if spec.display_name.trim().is_empty() {
        return Err(invalid("display_name must not be empty".to_string()));
    }
    if !names.insert(spec.display_name.as_str()) {
        return Err(invalid(format!(
            "display name '{}' is declared more than once",
            spec.display_name
        )));
    }
    let mut scopes = HashSet::new();
    for scope in &spec.exposed_scopes {
        if !scopes.insert(scope.name.as_str()) {
            return Err(invalid(format!(
                "'{}' exposes scope '{}' twice",
                spec.display_name, scope.name
            )));
        }
    }
    if spec.admin_authorization && !spec.requests_elevated_permissions() {
        tracing::warn!(
            display_name = %spec.display_name,
            "admin_authorization requested without role-type permissions; nothing to authorize"
        );
    }
    Ok(())
}

fn invalid(message: String) -> ProvisioningError {
    ProvisioningError::InvalidTopology(message)
}
