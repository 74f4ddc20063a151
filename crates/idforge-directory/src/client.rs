//! The directory contract consumed by the provisioning orchestrator.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    AppRoleAssignment, Application, ApplicationPatch, NewApplication, NewPrincipal,
    PasswordCredential, Principal,
};
use crate::DirectoryResult;

/// Typed operations against the remote directory.
///
/// Implementations must not retry create calls that the directory may have
/// applied; the orchestrator owns retry policy for those.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    /// Verifies that credentials are accepted. Called once per run.
    async fn authenticate(&self) -> DirectoryResult<()>;

    /// Applications whose display name matches exactly, in directory order.
    async fn find_applications_by_name(&self, display_name: &str)
        -> DirectoryResult<Vec<Application>>;

    /// Reads one application by object id.
    async fn get_application(&self, object_id: &str) -> DirectoryResult<Application>;

    /// Principal linked to the given application id, if any.
    async fn find_principal_by_app_id(&self, app_id: &str) -> DirectoryResult<Option<Principal>>;

    async fn create_application(&self, request: &NewApplication) -> DirectoryResult<Application>;

    async fn update_application(
        &self,
        object_id: &str,
        patch: &ApplicationPatch,
    ) -> DirectoryResult<()>;

    async fn create_principal(&self, request: &NewPrincipal) -> DirectoryResult<Principal>;

    /// Adds a password credential to the application.
    async fn create_credential(
        &self,
        object_id: &str,
        description: &str,
        expires_at: DateTime<Utc>,
    ) -> DirectoryResult<PasswordCredential>;

    /// Grants `role_id` exposed by the `resource_id` principal to `principal_id`.
    async fn create_role_assignment(
        &self,
        principal_id: &str,
        resource_id: &str,
        role_id: &str,
    ) -> DirectoryResult<AppRoleAssignment>;
}
