//! Cross-application permission declarations.
//!
//! Each [`PermissionEdge`] adds one `(target appId, permission id)` entry to
//! the source application's required resource access. Entries already
//! present are left alone, so applying an edge list twice changes nothing.

use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use idforge_directory::models::{
    AccessType, ApplicationPatch, RequiredResourceAccess, ResourceAccess,
};
use idforge_directory::DirectoryClient;

use crate::outcome::ResourceIdentity;
use crate::topology::{PermissionEdge, PermissionType};

/// What happened to one edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeResult {
    /// The declaration was added and persisted.
    Applied,
    /// The source already declared the permission.
    AlreadySatisfied,
    /// The edge could not be applied; carries the warning text.
    Skipped(String),
}

/// Totals for one wiring pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WiringReport {
    pub applied: usize,
    pub already_satisfied: usize,
    pub warnings: Vec<String>,
    /// Edges not attempted because the run was cancelled.
    pub cancelled: usize,
}

/// Applies permission edges between provisioned applications.
pub struct PermissionWiring {
    directory: Arc<dyn DirectoryClient>,
}

impl std::fmt::Debug for PermissionWiring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionWiring").finish_non_exhaustive()
    }
}

impl PermissionWiring {
    #[must_use]
    pub fn new(directory: Arc<dyn DirectoryClient>) -> Self {
        Self { directory }
    }

    /// Applies every edge in order. `provisioned` maps display names to the
    /// identities produced by this run; edges naming anything else are skipped.
    pub async fn wire(
        &self,
        provisioned: &HashMap<String, ResourceIdentity>,
        edges: &[PermissionEdge],
        cancel: &CancellationToken,
    ) -> WiringReport {
        let mut report = WiringReport::default();

        for (index, edge) in edges.iter().enumerate() {
            if cancel.is_cancelled() {
                report.cancelled = edges.len() - index;
                warn!(
                    remaining = report.cancelled,
                    "Run cancelled, skipping remaining permission edges"
                );
                for skipped in &edges[index..] {
                    report
                        .warnings
                        .push(format!("permission edge {skipped} skipped: run cancelled"));
                }
                break;
            }

            match self.wire_edge(provisioned, edge).await {
                EdgeResult::Applied => report.applied += 1,
                EdgeResult::AlreadySatisfied => report.already_satisfied += 1,
                EdgeResult::Skipped(warning) => report.warnings.push(warning),
            }
        }

        report
    }

    /// Applies a single edge. Never fails; problems become [`EdgeResult::Skipped`].
    #[instrument(skip(self, provisioned), fields(edge = %edge))]
    pub async fn wire_edge(
        &self,
        provisioned: &HashMap<String, ResourceIdentity>,
        edge: &PermissionEdge,
    ) -> EdgeResult {
        let Some(source) = provisioned.get(&edge.source) else {
            return skipped(edge, format!("source '{}' was not provisioned", edge.source));
        };
        let Some(target) = provisioned.get(&edge.target) else {
            return skipped(edge, format!("target '{}' was not provisioned", edge.target));
        };

        let target_app = match self.directory.get_application(&target.object_id).await {
            Ok(app) => app,
            Err(e) => return skipped(edge, format!("cannot read target: {e}")),
        };
        let permission_id = match edge.permission_type {
            PermissionType::Scope => target_app.scope_id(&edge.scope),
            PermissionType::Role => target_app.role_id(&edge.scope),
        };
        let Some(permission_id) = permission_id else {
            return skipped(
                edge,
                format!(
                    "'{}' does not expose {} '{}'",
                    edge.target, edge.permission_type, edge.scope
                ),
            );
        };

        let source_app = match self.directory.get_application(&source.object_id).await {
            Ok(app) => app,
            Err(e) => return skipped(edge, format!("cannot read source: {e}")),
        };

        let Some(merged) = merge_required_access(
            &source_app.required_resource_access,
            &target.app_id,
            permission_id,
            edge.permission_type.into(),
        ) else {
            debug!("Permission already declared");
            return EdgeResult::AlreadySatisfied;
        };

        let patch = ApplicationPatch {
            required_resource_access: Some(merged),
            ..Default::default()
        };
        match self.directory.update_application(&source.object_id, &patch).await {
            Ok(()) => {
                info!("Permission declared");
                EdgeResult::Applied
            }
            Err(e) => skipped(edge, format!("cannot update source: {e}")),
        }
    }
}

fn skipped(edge: &PermissionEdge, reason: String) -> EdgeResult {
    warn!(%edge, %reason, "Permission edge skipped");
    EdgeResult::Skipped(format!("permission edge {edge} skipped: {reason}"))
}

/// Adds `(resource_app_id, permission_id)` to `existing`.
///
/// Returns `None` when the pair is already declared. Otherwise returns the
/// full list to persist: the permission is appended to the resource's entry
/// if one exists, or a new entry is added.
#[must_use]
pub fn merge_required_access(
    existing: &[RequiredResourceAccess],
    resource_app_id: &str,
    permission_id: &str,
    access_type: AccessType,
) -> Option<Vec<RequiredResourceAccess>> {
    let mut merged = existing.to_vec();
    let access = ResourceAccess {
        id: permission_id.to_string(),
        access_type,
    };

    match merged
        .iter_mut()
        .find(|rra| rra.resource_app_id.eq_ignore_ascii_case(resource_app_id))
    {
        Some(entry) => {
            if entry.resource_access.iter().any(|a| a.id == permission_id) {
                return None;
            }
            entry.resource_access.push(access);
        }
        None => merged.push(RequiredResourceAccess {
            resource_app_id: resource_app_id.to_string(),
            resource_access: vec![access],
        }),
    }

    Some(merged)
}
