//! Best-effort admin authorization of role-type permissions.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use idforge_directory::models::RequiredResourceAccess;
use idforge_directory::{DirectoryClient, DirectoryError};

use crate::config::ProvisionerConfig;
use crate::retry::{retry, RetryOutcome};

/// Result of one authorization pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationOutcome {
    /// At least one permission was granted or was already granted.
    pub granted: bool,
    pub granted_count: usize,
    pub attempted: usize,
    pub warnings: Vec<String>,
}

/// Grants role-type permissions to a principal by creating role assignments
/// against each resource application's principal.
pub struct AdminAuthorizer {
    directory: Arc<dyn DirectoryClient>,
    config: Arc<ProvisionerConfig>,
    /// Resource application id to its principal id, for the run.
    resource_principals: RwLock<HashMap<String, Option<String>>>,
}

impl std::fmt::Debug for AdminAuthorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminAuthorizer").finish_non_exhaustive()
    }
}

impl AdminAuthorizer {
    #[must_use]
    pub fn new(directory: Arc<dyn DirectoryClient>, config: Arc<ProvisionerConfig>) -> Self {
        Self {
            directory,
            config,
            resource_principals: RwLock::new(HashMap::new()),
        }
    }

    /// Attempts every role-type permission in `declared` for `principal_id`.
    ///
    /// Never fails: conflicts count as granted, everything else becomes a
    /// warning on the returned outcome.
    #[instrument(skip(self, declared))]
    pub async fn authorize(
        &self,
        principal_id: &str,
        declared: &[RequiredResourceAccess],
    ) -> AuthorizationOutcome {
        let mut outcome = AuthorizationOutcome::default();

        let grants: Vec<(&str, &str)> = declared
            .iter()
            .flat_map(|rra| rra.role_ids().map(move |role| (rra.resource_app_id.as_str(), role)))
            .collect();
        if grants.is_empty() {
            debug!("No role-type permissions declared");
            return outcome;
        }

        let initial = self.config.authorization_initial_delay();
        if !initial.is_zero() {
            debug!(?initial, "Waiting for the principal to become assignable");
            tokio::time::sleep(initial).await;
        }

        let policy = self.config.authorization_retry.policy();
        let pause = self.config.authorization_inter_grant_delay();

        for (index, (resource_app_id, role_id)) in grants.into_iter().enumerate() {
            if index > 0 && !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }
            outcome.attempted += 1;

            let resource_id = match self.resource_principal(resource_app_id).await {
                Ok(Some(id)) => id,
                Ok(None) => {
                    outcome.warnings.push(format!(
                        "resource application {resource_app_id} has no principal in this tenant; role {role_id} not granted"
                    ));
                    continue;
                }
                Err(e) => {
                    outcome.warnings.push(format!(
                        "could not look up principal of {resource_app_id}: {e}"
                    ));
                    continue;
                }
            };

            let result = retry(&policy, DirectoryError::is_transient, |_| {
                self.directory
                    .create_role_assignment(principal_id, &resource_id, role_id)
            })
            .await;

            match result {
                RetryOutcome::Succeeded { attempts, .. } => {
                    info!(role_id, resource_app_id, attempts, "Role granted");
                    outcome.granted_count += 1;
                }
                RetryOutcome::Rejected { error, .. } if error.is_conflict() => {
                    debug!(role_id, resource_app_id, "Role already granted");
                    outcome.granted_count += 1;
                }
                RetryOutcome::Exhausted { error, attempts } => {
                    warn!(role_id, attempts, error = %error, "Role grant kept failing");
                    outcome.warnings.push(format!(
                        "role {role_id} on {resource_app_id} not granted after {attempts} attempts: {error}"
                    ));
                }
                RetryOutcome::Rejected { error, .. } => {
                    warn!(role_id, error = %error, "Role grant rejected");
                    outcome.warnings.push(format!(
                        "role {role_id} on {resource_app_id} not granted: {error}"
                    ));
                }
            }
        }

        outcome.granted = outcome.granted_count > 0;
        outcome
    }

    async fn resource_principal(
        &self,
        resource_app_id: &str,
    ) -> Result<Option<String>, DirectoryError> {
        if let Some(cached) = self.resource_principals.read().await.get(resource_app_id) {
            return Ok(cached.clone());
        }
        let principal_id = self
            .directory
            .find_principal_by_app_id(resource_app_id)
            .await?
            .map(|p| p.id);
        self.resource_principals
            .write()
            .await
            .insert(resource_app_id.to_string(), principal_id.clone());
        Ok(principal_id)
    }
}
