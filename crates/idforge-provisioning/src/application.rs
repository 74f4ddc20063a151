//! Create-or-adopt provisioning of web and single-page applications.

use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use idforge_directory::models::{
    ApiSettings, ApplicationPatch, ImplicitGrantSettings, NewApplication, PermissionScope,
    SpaSettings, WebSettings,
};
use idforge_directory::{DirectoryClient, DirectoryError};

use crate::authorization::AdminAuthorizer;
use crate::config::ProvisionerConfig;
use crate::outcome::{Disposition, ProvisionDraft, ProvisionOutcome, ResourceIdentity};
use crate::resolver::ResourceResolver;
use crate::steps::{self, PrincipalProfile};
use crate::topology::{ApplicationKind, ApplicationSpec, ScopeSpec};
use crate::ProvisionFailure;

/// Provisions one application identity and its principal.
pub struct ApplicationProvisioner {
    directory: Arc<dyn DirectoryClient>,
    resolver: Arc<ResourceResolver>,
    config: Arc<ProvisionerConfig>,
    authorizer: Arc<AdminAuthorizer>,
}

impl std::fmt::Debug for ApplicationProvisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplicationProvisioner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ApplicationProvisioner {
    #[must_use]
    pub fn new(
        directory: Arc<dyn DirectoryClient>,
        resolver: Arc<ResourceResolver>,
        config: Arc<ProvisionerConfig>,
        authorizer: Arc<AdminAuthorizer>,
    ) -> Self {
        Self {
            directory,
            resolver,
            config,
            authorizer,
        }
    }

    /// Creates or adopts the application described by `spec`, including admin
    /// authorization of its declared role-type permissions when requested.
    ///
    /// # Errors
    ///
    /// Returns a [`ProvisionFailure`] when the application or its principal
    /// cannot be created. Degraded steps are reported as outcome warnings.
    pub async fn provision(
        &self,
        spec: &ApplicationSpec,
    ) -> Result<ProvisionOutcome, ProvisionFailure> {
        let mut draft = self.provision_resource(spec).await?;
        let granted = match (draft.wants_authorization, draft.identity.principal_id.clone()) {
            (true, Some(principal_id)) => {
                let result = self.authorizer.authorize(&principal_id, &draft.declared).await;
                draft.warnings.extend(
                    result
                        .warnings
                        .into_iter()
                        .map(|w| format!("{}: {w}", spec.display_name)),
                );
                result.granted
            }
            _ => false,
        };
        Ok(draft.finish(granted))
    }

    /// Everything except admin authorization, which the orchestrator defers
    /// until permission wiring has run.
    #[instrument(skip(self, spec), fields(display_name = %spec.display_name, kind = %spec.kind))]
    pub(crate) async fn provision_resource(
        &self,
        spec: &ApplicationSpec,
    ) -> Result<ProvisionDraft, ProvisionFailure> {
        let name = spec.display_name.as_str();
        let profile = PrincipalProfile::default();

        let resolution = self
            .resolver
            .resolve(name)
            .await
            .map_err(|e| ProvisionFailure::new(name, "look up existing application", e))?;

        if let Some(resolution) = resolution {
            return steps::adopt(
                self.directory.as_ref(),
                &self.resolver,
                &self.config,
                spec,
                resolution,
                &profile,
            )
            .await;
        }

        let request = self.creation_request(spec)?;
        let application = self
            .directory
            .create_application(&request)
            .await
            .map_err(|e| ProvisionFailure::new(name, "create application", e))?;
        info!(object_id = %application.id, app_id = %application.app_id, "Application created");
        self.resolver.record(name, application.clone(), None).await;

        let mut warnings = Vec::new();

        let identifier_uri = if spec.api_provider {
            let uri = format!("api://{}", application.app_id);
            let patch = ApplicationPatch {
                identifier_uris: Some(vec![uri.clone()]),
                ..Default::default()
            };
            match self.directory.update_application(&application.id, &patch).await {
                Ok(()) => Some(uri),
                Err(e) => {
                    warn!(error = %e, "Failed to set identifier URI");
                    warnings.push(format!("{name}: failed to set identifier URI {uri}: {e}"));
                    None
                }
            }
        } else {
            None
        };

        let credential = steps::mint_credential(
            self.directory.as_ref(),
            &self.config,
            spec,
            &application,
            &mut warnings,
        )
        .await;

        let principal = steps::create_principal(
            self.directory.as_ref(),
            &self.config,
            &application.app_id,
            &profile,
        )
        .await
        .map_err(|e| ProvisionFailure::new(name, "create principal", e))?;
        info!(principal_id = %principal.id, "Principal created");
        self.resolver
            .record(name, application.clone(), Some(principal.clone()))
            .await;

        Ok(ProvisionDraft {
            display_name: spec.display_name.clone(),
            kind: spec.kind,
            identity: ResourceIdentity::new(&application, Some(&principal)),
            disposition: Disposition::Created,
            credential,
            sso_mode: principal.preferred_single_sign_on_mode,
            identifier_uri,
            tags: principal.tags,
            warnings,
            declared: application.required_resource_access,
            wants_authorization: spec.admin_authorization,
        })
    }

    fn creation_request(&self, spec: &ApplicationSpec) -> Result<NewApplication, ProvisionFailure> {
        let mut request = NewApplication {
            display_name: spec.display_name.clone(),
            sign_in_audience: self.config.sign_in_audience.clone(),
            required_resource_access: spec.required_permissions.clone(),
            ..Default::default()
        };

        if !spec.exposed_scopes.is_empty() {
            request.api = Some(ApiSettings {
                oauth2_permission_scopes: spec
                    .exposed_scopes
                    .iter()
                    .map(|scope| permission_scope(&spec.display_name, scope))
                    .collect(),
            });
        }

        match spec.kind {
            ApplicationKind::Web => {
                request.web = Some(WebSettings {
                    redirect_uris: spec.redirect_uris.clone(),
                    implicit_grant_settings: Some(ImplicitGrantSettings {
                        enable_id_token_issuance: true,
                        enable_access_token_issuance: false,
                    }),
                });
            }
            ApplicationKind::SinglePage => {
                request.spa = Some(SpaSettings {
                    redirect_uris: spec.redirect_uris.clone(),
                });
            }
            ApplicationKind::EnterpriseSaml | ApplicationKind::EnterpriseProxy => {
                return Err(ProvisionFailure::new(
                    &spec.display_name,
                    "build application",
                    DirectoryError::Config(format!(
                        "{} objects are provisioned by the enterprise provisioner",
                        spec.kind
                    )),
                ));
            }
        }

        Ok(request)
    }
}

/// Delegated scope with a freshly generated id.
fn permission_scope(display_name: &str, scope: &ScopeSpec) -> PermissionScope {
    let description = scope
        .description
        .clone()
        .unwrap_or_else(|| format!("Allows access to {display_name} as the signed-in user"));
    PermissionScope {
        id: Uuid::new_v4().to_string(),
        value: scope.name.clone(),
        consent_type: if scope.admin_only { "Admin" } else { "User" }.to_string(),
        admin_consent_display_name: Some(scope.name.clone()),
        admin_consent_description: Some(description),
        is_enabled: true,
    }
}
