//! Sequential provisioning run over a [`Topology`].

use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use idforge_directory::DirectoryClient;

use crate::application::ApplicationProvisioner;
use crate::authorization::AdminAuthorizer;
use crate::config::ProvisionerConfig;
use crate::enterprise::EnterpriseProvisioner;
use crate::outcome::{ProvisionDraft, ResourceIdentity};
use crate::plan::{PlannedResource, RunPlan};
use crate::report::{RunReport, RunReportBuilder};
use crate::resolver::ResourceResolver;
use crate::topology::{ApplicationSpec, Topology};
use crate::wiring::PermissionWiring;
use crate::{ProvisioningError, ProvisioningResult};

/// Drives a run: authenticate, provision applications, provision enterprise
/// objects, wire permission edges, then authorize created applications.
pub struct Orchestrator {
    directory: Arc<dyn DirectoryClient>,
    config: Arc<ProvisionerConfig>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    #[must_use]
    pub fn new(directory: Arc<dyn DirectoryClient>, config: ProvisionerConfig) -> Self {
        Self {
            directory,
            config: Arc::new(config),
        }
    }

    /// Orchestrator using the settings embedded in `topology`.
    #[must_use]
    pub fn for_topology(directory: Arc<dyn DirectoryClient>, topology: &Topology) -> Self {
        Self::new(directory, topology.settings.clone())
    }

    #[must_use]
    pub fn config(&self) -> &ProvisionerConfig {
        &self.config
    }

    /// Provisions `topology`.
    ///
    /// Per-resource failures are collected in the returned report. Cancelling
    /// `cancel` stops the run before the next resource, edge or authorization.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisioningError::Precondition`] when the directory rejects
    /// the run's credentials. Nothing is attempted in that case.
    #[instrument(
        skip_all,
        fields(
            applications = topology.applications.len(),
            enterprise = topology.enterprise.len(),
            edges = topology.permission_edges.len(),
        )
    )]
    pub async fn run(
        &self,
        topology: &Topology,
        cancel: &CancellationToken,
    ) -> ProvisioningResult<RunReport> {
        self.directory
            .authenticate()
            .await
            .map_err(ProvisioningError::Precondition)?;

        let mut report = RunReportBuilder::new();
        info!(run_id = %report.run_id(), "Provisioning run started");

        let resolver = Arc::new(ResourceResolver::new(self.directory.clone()));
        let authorizer = Arc::new(AdminAuthorizer::new(
            self.directory.clone(),
            self.config.clone(),
        ));
        let applications = ApplicationProvisioner::new(
            self.directory.clone(),
            resolver.clone(),
            self.config.clone(),
            authorizer.clone(),
        );
        let enterprise = EnterpriseProvisioner::new(
            self.directory.clone(),
            resolver.clone(),
            self.config.clone(),
        );

        let mut provisioned: HashMap<String, ResourceIdentity> = HashMap::new();
        let mut drafts: Vec<ProvisionDraft> = Vec::new();

        for spec in &topology.applications {
            if skip_if_cancelled(cancel, spec, &mut report) {
                continue;
            }
            match applications.provision_resource(spec).await {
                Ok(draft) => {
                    provisioned.insert(draft.display_name.clone(), draft.identity.clone());
                    drafts.push(draft);
                }
                Err(failure) => {
                    error!(error = %failure, "Application provisioning failed");
                    report.error(failure.to_string());
                }
            }
        }

        for spec in &topology.enterprise {
            if skip_if_cancelled(cancel, spec, &mut report) {
                continue;
            }
            match enterprise.provision_resource(spec).await {
                Ok(draft) => {
                    provisioned.insert(draft.display_name.clone(), draft.identity.clone());
                    report.enterprise(draft.finish(false));
                }
                Err(failure) => {
                    error!(error = %failure, "Enterprise provisioning failed");
                    report.error(failure.to_string());
                }
            }
        }

        let wiring = PermissionWiring::new(self.directory.clone());
        report.wiring(
            wiring
                .wire(&provisioned, &topology.permission_edges, cancel)
                .await,
        );

        for mut draft in drafts {
            let granted = if draft.wants_authorization {
                self.authorize_draft(&authorizer, &mut draft, cancel, &mut report)
                    .await
            } else {
                false
            };
            report.application(draft.finish(granted));
        }

        let report = report.finish();
        info!(
            run_id = %report.run_id,
            cancelled = report.cancelled,
            errors = report.errors.len(),
            warnings = report.warnings.len(),
            "Provisioning run finished"
        );
        Ok(report)
    }

    /// Resolves every spec without writing anything.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisioningError::Precondition`] when authentication fails.
    #[instrument(skip_all)]
    pub async fn plan(&self, topology: &Topology) -> ProvisioningResult<RunPlan> {
        self.directory
            .authenticate()
            .await
            .map_err(ProvisioningError::Precondition)?;

        let resolver = ResourceResolver::new(self.directory.clone());
        let mut plan = RunPlan {
            permission_edges: topology.permission_edges.clone(),
            ..Default::default()
        };

        for spec in topology.specs() {
            match resolver.resolve(&spec.display_name).await {
                Ok(resolution) => plan
                    .resources
                    .push(PlannedResource::from_resolution(spec, resolution.as_ref())),
                Err(e) => {
                    warn!(
                        display_name = %spec.display_name,
                        error = %e,
                        "Lookup failed while planning"
                    );
                    plan.errors
                        .push(format!(
                            "{}: failed to look up existing application: {e}",
                            spec.display_name
                        ));
                }
            }
        }

        Ok(plan)
    }

    /// Runs admin authorization for a created application against the
    /// declared permissions as persisted after wiring.
    async fn authorize_draft(
        &self,
        authorizer: &AdminAuthorizer,
        draft: &mut ProvisionDraft,
        cancel: &CancellationToken,
        report: &mut RunReportBuilder,
    ) -> bool {
        if cancel.is_cancelled() {
            report.cancelled();
            report.warning(format!(
                "{}: admin authorization skipped, run cancelled",
                draft.display_name
            ));
            return false;
        }
        let Some(principal_id) = draft.identity.principal_id.clone() else {
            return false;
        };

        let declared = match self.directory.get_application(&draft.identity.object_id).await {
            Ok(application) => application.required_resource_access,
            Err(e) => {
                warn!(
                    display_name = %draft.display_name,
                    error = %e,
                    "Re-reading declared permissions failed"
                );
                draft.warn(format!(
                    "{}: could not re-read declared permissions, using those set at creation: {e}",
                    draft.display_name
                ));
                draft.declared.clone()
            }
        };

        let result = authorizer.authorize(&principal_id, &declared).await;
        let name = draft.display_name.clone();
        for warning in result.warnings {
            draft.warn(format!("{name}: {warning}"));
        }
        result.granted
    }
}

fn skip_if_cancelled(
    cancel: &CancellationToken,
    spec: &ApplicationSpec,
    report: &mut RunReportBuilder,
) -> bool {
    if !cancel.is_cancelled() {
        return false;
    }
    if !report.is_cancelled() {
        warn!("Run cancelled, skipping remaining resources");
    }
    report.cancelled();
    report.warning(format!("{}: skipped, run cancelled", spec.display_name));
    true
}
