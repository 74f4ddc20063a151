//! Per-resource provisioning results.

use serde::{Deserialize, Serialize};

use idforge_directory::models::{Application, Principal, RequiredResourceAccess, SsoMode};

use crate::topology::ApplicationKind;

/// Placeholder recorded when credential minting is disabled.
pub const CREDENTIAL_NOT_REQUESTED: &str = "<credential not requested>";
/// Placeholder recorded when minting was attempted and failed.
pub const CREDENTIAL_UNAVAILABLE: &str = "<credential creation failed; mint one manually>";
/// Placeholder recorded when the directory answered without a secret.
pub const CREDENTIAL_NOT_RETURNED: &str = "<credential created but no secret returned>";

/// Directory handles of one provisioned resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceIdentity {
    /// Application object id.
    pub object_id: String,
    /// Application (client) id.
    pub app_id: String,
    /// Linked principal, when one exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal_id: Option<String>,
}

impl ResourceIdentity {
    #[must_use]
    pub fn new(application: &Application, principal: Option<&Principal>) -> Self {
        Self {
            object_id: application.id.clone(),
            app_id: application.app_id.clone(),
            principal_id: principal.map(|p| p.id.clone()),
        }
    }
}

/// Whether the run created the resource or found it in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    Created,
    Adopted,
}

impl std::fmt::Display for Disposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => f.write_str("created"),
            Self::Adopted => f.write_str("adopted"),
        }
    }
}

/// Final result for one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionOutcome {
    pub display_name: String,
    pub kind: ApplicationKind,
    pub identity: ResourceIdentity,
    pub disposition: Disposition,
    /// Minted secret or a placeholder explaining why none is available.
    pub credential: String,
    pub authorization_granted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sso_mode: Option<SsoMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ProvisionOutcome {
    #[must_use]
    pub fn is_created(&self) -> bool {
        self.disposition == Disposition::Created
    }
}

/// Outcome under construction. Authorization runs after permission wiring,
/// so the orchestrator holds drafts until every edge has been applied.
#[derive(Debug, Clone)]
pub(crate) struct ProvisionDraft {
    pub display_name: String,
    pub kind: ApplicationKind,
    pub identity: ResourceIdentity,
    pub disposition: Disposition,
    pub credential: String,
    pub sso_mode: Option<SsoMode>,
    pub identifier_uri: Option<String>,
    pub tags: Vec<String>,
    pub warnings: Vec<String>,
    /// Permissions declared at creation time.
    pub declared: Vec<RequiredResourceAccess>,
    /// Admin authorization was requested for a created application.
    pub wants_authorization: bool,
}

impl ProvisionDraft {
    pub fn finish(self, authorization_granted: bool) -> ProvisionOutcome {
        ProvisionOutcome {
            display_name: self.display_name,
            kind: self.kind,
            identity: self.identity,
            disposition: self.disposition,
            credential: self.credential,
            authorization_granted,
            sso_mode: self.sso_mode,
            identifier_uri: self.identifier_uri,
            tags: self.tags,
            warnings: self.warnings,
        }
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}
