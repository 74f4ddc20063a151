//! Typed shapes of the directory objects read and written by the provisioner.
//!
//! Fields Graph may omit or return as `null` are `Option` or defaulted
//! collections; nothing is accessed through untyped JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audience restricted to accounts of the owning organization.
pub const SIGN_IN_AUDIENCE_MY_ORG: &str = "AzureADMyOrg";

/// Whether a declared permission is delegated (scope) or elevated (role).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessType {
    /// Delegated permission, exercised on behalf of a signed-in user.
    Scope,
    /// Application permission, requires admin authorization.
    Role,
}

/// One permission within a [`RequiredResourceAccess`] entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceAccess {
    pub id: String,
    #[serde(rename = "type")]
    pub access_type: AccessType,
}

/// Permissions an application declares against one resource application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequiredResourceAccess {
    pub resource_app_id: String,
    #[serde(default)]
    pub resource_access: Vec<ResourceAccess>,
}

impl RequiredResourceAccess {
    /// Role-type permission ids in this entry.
    pub fn role_ids(&self) -> impl Iterator<Item = &str> {
        self.resource_access
            .iter()
            .filter(|a| a.access_type == AccessType::Role)
            .map(|a| a.id.as_str())
    }
}

/// Delegated permission scope exposed by an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionScope {
    pub id: String,
    pub value: String,
    #[serde(rename = "type", default = "default_scope_consent")]
    pub consent_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_consent_display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_consent_description: Option<String>,
    #[serde(default = "default_enabled")]
    pub is_enabled: bool,
}

fn default_scope_consent() -> String {
    "User".to_string()
}

fn default_enabled() -> bool {
    true
}

/// Application role exposed by an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppRole {
    pub id: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub allowed_member_types: Vec<String>,
    #[serde(default = "default_enabled")]
    pub is_enabled: bool,
}

/// `api` facet of an application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSettings {
    #[serde(default)]
    pub oauth2_permission_scopes: Vec<PermissionScope>,
}

/// Implicit grant flags of the `web` facet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImplicitGrantSettings {
    #[serde(default)]
    pub enable_id_token_issuance: bool,
    #[serde(default)]
    pub enable_access_token_issuance: bool,
}

/// `web` facet of an application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebSettings {
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implicit_grant_settings: Option<ImplicitGrantSettings>,
}

/// `spa` facet of an application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaSettings {
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

/// Application registration as returned by the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    /// Object id (stable, used in URLs).
    pub id: String,
    /// Application (client) id.
    pub app_id: String,
    pub display_name: String,
    #[serde(default)]
    pub sign_in_audience: Option<String>,
    #[serde(default)]
    pub identifier_uris: Vec<String>,
    #[serde(default)]
    pub web: Option<WebSettings>,
    #[serde(default)]
    pub spa: Option<SpaSettings>,
    #[serde(default)]
    pub api: Option<ApiSettings>,
    #[serde(default)]
    pub app_roles: Vec<AppRole>,
    #[serde(default)]
    pub required_resource_access: Vec<RequiredResourceAccess>,
}

impl Application {
    /// Id of the exposed delegated scope with the given value.
    #[must_use]
    pub fn scope_id(&self, value: &str) -> Option<&str> {
        self.api
            .as_ref()?
            .oauth2_permission_scopes
            .iter()
            .find(|s| s.value == value)
            .map(|s| s.id.as_str())
    }

    /// Id of the exposed application role with the given value.
    #[must_use]
    pub fn role_id(&self, value: &str) -> Option<&str> {
        self.app_roles
            .iter()
            .find(|r| r.value.as_deref() == Some(value))
            .map(|r| r.id.as_str())
    }
}

/// Single-sign-on mode preferred by a principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SsoMode {
    /// Federated SAML sign-on.
    Saml,
    /// Integrated (delegated) sign-on through the application proxy.
    Integrated,
    Oidc,
    Password,
    NotSupported,
    /// A mode this client does not know about.
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for SsoMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Saml => "saml",
            Self::Integrated => "integrated",
            Self::Oidc => "oidc",
            Self::Password => "password",
            Self::NotSupported => "notSupported",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Service principal linked to an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: String,
    pub app_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub preferred_single_sign_on_mode: Option<SsoMode>,
}

/// Body of an application create call.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewApplication {
    pub display_name: String,
    pub sign_in_audience: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub identifier_uris: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web: Option<WebSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spa: Option<SpaSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api: Option<ApiSettings>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required_resource_access: Vec<RequiredResourceAccess>,
}

/// Partial update of an application. Unset fields are left untouched.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier_uris: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_resource_access: Option<Vec<RequiredResourceAccess>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web: Option<WebSettings>,
}

/// Body of a principal create call.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPrincipal {
    pub app_id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_single_sign_on_mode: Option<SsoMode>,
}

/// Password credential returned by `addPassword`. The secret is only
/// present in the create response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordCredential {
    #[serde(default)]
    pub key_id: Option<String>,
    #[serde(default)]
    pub secret_text: Option<String>,
    #[serde(default)]
    pub end_date_time: Option<DateTime<Utc>>,
}

/// Role assignment linking a principal to an application role.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppRoleAssignment {
    #[serde(default)]
    pub id: Option<String>,
    pub principal_id: String,
    pub resource_id: String,
    pub app_role_id: String,
}
