//! Create-or-adopt provisioning of enterprise single-sign-on objects.
//!
//! Two profiles are supported. The federated profile registers the external
//! address as identifier and reply URL and marks the principal for SAML
//! sign-on. The proxy profile registers the proxy auth callbacks under the
//! external address and marks the principal for integrated sign-on.

use std::sync::Arc;
use tracing::{info, instrument, warn};

use idforge_directory::models::{ApplicationPatch, NewApplication, SsoMode, WebSettings};
use idforge_directory::{DirectoryClient, DirectoryError};

use crate::config::ProvisionerConfig;
use crate::outcome::{Disposition, ProvisionDraft, ProvisionOutcome, ResourceIdentity};
use crate::resolver::ResourceResolver;
use crate::steps::{self, PrincipalProfile};
use crate::topology::{ApplicationKind, ApplicationSpec};
use crate::ProvisionFailure;

/// Marks a principal as an enterprise (gallery-style) application.
pub const TAG_ENTERPRISE: &str = "WindowsAzureActiveDirectoryIntegratedApp";
/// Category tag for custom federated sign-on.
pub const TAG_CUSTOM_SSO: &str = "WindowsAzureActiveDirectoryCustomSingleSignOnApplication";
/// Category tag for on-premises applications published through the proxy.
pub const TAG_ON_PREM_PROXY: &str = "WindowsAzureActiveDirectoryOnPremApp";

/// Profile-specific settings derived from a spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnterpriseProfile {
    /// Principal tags.
    pub tags: Vec<String>,
    pub sso_mode: SsoMode,
    pub identifier_uri: Option<String>,
    pub redirect_uris: Vec<String>,
}

impl EnterpriseProfile {
    /// Derives the profile for `spec`.
    ///
    /// # Errors
    ///
    /// Fails when `spec` is not an enterprise kind or has no external URL.
    pub fn for_spec(
        spec: &ApplicationSpec,
        config: &ProvisionerConfig,
    ) -> Result<Self, DirectoryError> {
        let external = spec
            .external_url
            .as_deref()
            .ok_or_else(|| DirectoryError::Config("external_url is required".to_string()))?
            .trim_end_matches('/');

        match spec.kind {
            ApplicationKind::EnterpriseSaml => {
                let mut redirect_uris = vec![external.to_string()];
                redirect_uris.extend(spec.redirect_uris.iter().cloned());
                Ok(Self {
                    tags: vec![TAG_ENTERPRISE.to_string(), TAG_CUSTOM_SSO.to_string()],
                    sso_mode: SsoMode::Saml,
                    identifier_uri: Some(external.to_string()),
                    redirect_uris,
                })
            }
            ApplicationKind::EnterpriseProxy => {
                let mut redirect_uris: Vec<String> = config
                    .proxy_callback_paths
                    .iter()
                    .map(|path| format!("{external}/{}", path.trim_start_matches('/')))
                    .collect();
                redirect_uris.extend(spec.redirect_uris.iter().cloned());
                Ok(Self {
                    tags: vec![TAG_ENTERPRISE.to_string(), TAG_ON_PREM_PROXY.to_string()],
                    sso_mode: SsoMode::Integrated,
                    identifier_uri: None,
                    redirect_uris,
                })
            }
            ApplicationKind::Web | ApplicationKind::SinglePage => Err(DirectoryError::Config(
                format!("{} is not an enterprise kind", spec.kind),
            )),
        }
    }

    fn principal_profile(&self) -> PrincipalProfile {
        PrincipalProfile {
            tags: self.tags.clone(),
            sso_mode: Some(self.sso_mode),
        }
    }
}

/// Provisions enterprise application/principal pairs.
pub struct EnterpriseProvisioner {
    directory: Arc<dyn DirectoryClient>,
    resolver: Arc<ResourceResolver>,
    config: Arc<ProvisionerConfig>,
}

impl std::fmt::Debug for EnterpriseProvisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnterpriseProvisioner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl EnterpriseProvisioner {
    #[must_use]
    pub fn new(
        directory: Arc<dyn DirectoryClient>,
        resolver: Arc<ResourceResolver>,
        config: Arc<ProvisionerConfig>,
    ) -> Self {
        Self {
            directory,
            resolver,
            config,
        }
    }

    /// Creates or adopts the enterprise object described by `spec`.
    ///
    /// # Errors
    ///
    /// Returns a [`ProvisionFailure`] when the application or its principal
    /// cannot be created.
    pub async fn provision(
        &self,
        spec: &ApplicationSpec,
    ) -> Result<ProvisionOutcome, ProvisionFailure> {
        self.provision_resource(spec)
            .await
            .map(|draft| draft.finish(false))
    }

    #[instrument(skip(self, spec), fields(display_name = %spec.display_name, kind = %spec.kind))]
    pub(crate) async fn provision_resource(
        &self,
        spec: &ApplicationSpec,
    ) -> Result<ProvisionDraft, ProvisionFailure> {
        let name = spec.display_name.as_str();
        let profile = EnterpriseProfile::for_spec(spec, &self.config)
            .map_err(|e| ProvisionFailure::new(name, "build enterprise profile", e))?;
        let principal_profile = profile.principal_profile();

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
                &principal_profile,
            )
            .await;
        }

        let request = NewApplication {
            display_name: spec.display_name.clone(),
            sign_in_audience: self.config.sign_in_audience.clone(),
            web: Some(WebSettings {
                redirect_uris: profile.redirect_uris.clone(),
                implicit_grant_settings: None,
            }),
            required_resource_access: spec.required_permissions.clone(),
            ..Default::default()
        };
        let application = self
            .directory
            .create_application(&request)
            .await
            .map_err(|e| ProvisionFailure::new(name, "create application", e))?;
        info!(
            object_id = %application.id,
            app_id = %application.app_id,
            "Enterprise application created"
        );
        self.resolver.record(name, application.clone(), None).await;

        let principal = steps::create_principal(
            self.directory.as_ref(),
            &self.config,
            &application.app_id,
            &principal_profile,
        )
        .await
        .map_err(|e| ProvisionFailure::new(name, "create principal", e))?;
        info!(
            principal_id = %principal.id,
            sso_mode = %profile.sso_mode,
            "Enterprise principal created"
        );
        self.resolver
            .record(name, application.clone(), Some(principal.clone()))
            .await;

        let mut warnings = Vec::new();

        // Identifier URIs outside verified domains are only accepted on update.
        let identifier_uri = match profile.identifier_uri {
            Some(uri) => {
                let patch = ApplicationPatch {
                    identifier_uris: Some(vec![uri.clone()]),
                    ..Default::default()
                };
                match self.directory.update_application(&application.id, &patch).await {
                    Ok(()) => Some(uri),
                    Err(e) => {
                        warn!(error = %e, "Failed to set SAML identifier");
                        warnings.push(format!("{name}: failed to set SAML identifier {uri}: {e}"));
                        None
                    }
                }
            }
            None => None,
        };

        let credential = steps::mint_credential(
            self.directory.as_ref(),
            &self.config,
            spec,
            &application,
            &mut warnings,
        )
        .await;

        Ok(ProvisionDraft {
            display_name: spec.display_name.clone(),
            kind: spec.kind,
            identity: ResourceIdentity::new(&application, Some(&principal)),
            disposition: Disposition::Created,
            credential,
            sso_mode: principal
                .preferred_single_sign_on_mode
                .or(Some(profile.sso_mode)),
            identifier_uri,
            tags: if principal.tags.is_empty() {
                profile.tags
            } else {
                principal.tags
            },
            warnings,
            declared: application.required_resource_access,
            wants_authorization: false,
        })
    }
}
