//! Steps shared by the application and enterprise provisioners.

use chrono::Utc;
use tracing::{debug, info, warn};

use idforge_directory::models::{Application, NewPrincipal, Principal, SsoMode};
use idforge_directory::{DirectoryClient, DirectoryError, DirectoryResult};

use crate::config::ProvisionerConfig;
use crate::outcome::{
    Disposition, ProvisionDraft, ResourceIdentity, CREDENTIAL_NOT_REQUESTED,
    CREDENTIAL_NOT_RETURNED, CREDENTIAL_UNAVAILABLE,
};
use crate::resolver::{Resolution, ResourceResolver};
use crate::retry::{retry, RetryOutcome};
use crate::topology::ApplicationSpec;
use crate::ProvisionFailure;

/// Flags set on a principal when it is created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct PrincipalProfile {
    pub tags: Vec<String>,
    pub sso_mode: Option<SsoMode>,
}

impl PrincipalProfile {
    pub fn request(&self, app_id: &str) -> NewPrincipal {
        NewPrincipal {
            app_id: app_id.to_string(),
            tags: self.tags.clone(),
            preferred_single_sign_on_mode: self.sso_mode,
        }
    }
}

/// Mints a password credential, returning the secret or a placeholder.
/// Failures are degraded to a warning on `warnings`.
pub(crate) async fn mint_credential(
    directory: &dyn DirectoryClient,
    config: &ProvisionerConfig,
    spec: &ApplicationSpec,
    application: &Application,
    warnings: &mut Vec<String>,
) -> String {
    if !spec.mint_credential {
        return CREDENTIAL_NOT_REQUESTED.to_string();
    }

    let Some(expires_at) = config
        .credential_lifetime()
        .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
    else {
        warn!(
            display_name = %spec.display_name,
            days = config.credential_lifetime_days,
            "Credential lifetime out of range"
        );
        warnings.push(format!(
            "{}: credential not minted, lifetime of {} days is out of range",
            spec.display_name, config.credential_lifetime_days
        ));
        return CREDENTIAL_UNAVAILABLE.to_string();
    };
    match directory
        .create_credential(&application.id, &config.credential_description, expires_at)
        .await
    {
        Ok(credential) => match credential.secret_text {
            Some(secret) => {
                debug!(display_name = %spec.display_name, %expires_at, "Credential minted");
                secret
            }
            None => {
                warnings.push(format!(
                    "{}: credential created but the directory returned no secret",
                    spec.display_name
                ));
                CREDENTIAL_NOT_RETURNED.to_string()
            }
        },
        Err(e) => {
            warn!(display_name = %spec.display_name, error = %e, "Credential minting failed");
            warnings.push(format!("{}: failed to mint credential: {e}", spec.display_name));
            CREDENTIAL_UNAVAILABLE.to_string()
        }
    }
}

/// Creates the principal for `app_id`, retrying while the application is not
/// yet visible to the principal endpoint. A conflict means the principal
/// already exists, and it is read back instead.
pub(crate) async fn create_principal(
    directory: &dyn DirectoryClient,
    config: &ProvisionerConfig,
    app_id: &str,
    profile: &PrincipalProfile,
) -> DirectoryResult<Principal> {
    let request = profile.request(app_id);
    let policy = config.principal_retry.policy();

    let outcome = retry(
        &policy,
        |e: &DirectoryError| e.is_not_yet_replicated() || e.is_transient(),
        |attempt| {
            if attempt > 1 {
                debug!(app_id, attempt, "Retrying principal creation");
            }
            directory.create_principal(&request)
        },
    )
    .await;

    match outcome {
        RetryOutcome::Succeeded { value, .. } => Ok(value),
        RetryOutcome::Rejected { error, .. } if error.is_conflict() => {
            debug!(app_id, "Principal already exists, reading it back");
            directory
                .find_principal_by_app_id(app_id)
                .await?
                .ok_or(error)
        }
        RetryOutcome::Exhausted { error, attempts } => {
            warn!(app_id, attempts, error = %error, "Principal creation exhausted its retries");
            Err(error)
        }
        RetryOutcome::Rejected { error, .. } => Err(error),
    }
}

/// Adopts an existing object. Configuration is left untouched; a missing
/// principal is created with `profile`.
pub(crate) async fn adopt(
    directory: &dyn DirectoryClient,
    resolver: &ResourceResolver,
    config: &ProvisionerConfig,
    spec: &ApplicationSpec,
    resolution: Resolution,
    profile: &PrincipalProfile,
) -> Result<ProvisionDraft, ProvisionFailure> {
    let name = spec.display_name.as_str();
    let mut warnings = Vec::new();

    if resolution.duplicates > 0 {
        warnings.push(format!(
            "{name}: {} other objects share this display name; adopted {}",
            resolution.duplicates, resolution.application.id
        ));
    }

    let Resolution {
        application,
        principal,
        ..
    } = resolution;

    let principal = match principal {
        Some(principal) => principal,
        None => {
            let principal = create_principal(directory, config, &application.app_id, profile)
                .await
                .map_err(|e| ProvisionFailure::new(name, "repair missing principal", e))?;
            info!(
                display_name = name,
                principal_id = %principal.id,
                "Created missing principal for adopted application"
            );
            warnings.push(format!(
                "{name}: existing application had no principal; created {}",
                principal.id
            ));
            resolver
                .record(name, application.clone(), Some(principal.clone()))
                .await;
            principal
        }
    };

    let credential = mint_credential(directory, config, spec, &application, &mut warnings).await;

    info!(display_name = name, object_id = %application.id, "Adopted existing application");

    Ok(ProvisionDraft {
        display_name: spec.display_name.clone(),
        kind: spec.kind,
        identity: ResourceIdentity::new(&application, Some(&principal)),
        disposition: Disposition::Adopted,
        credential,
        sso_mode: principal.preferred_single_sign_on_mode,
        identifier_uri: application.identifier_uris.first().cloned(),
        tags: principal.tags,
        warnings,
        declared: application.required_resource_access,
        wants_authorization: false,
    })
}
