//! Dry-run planning: what a run would create or adopt.

use serde::{Deserialize, Serialize};

use crate::resolver::Resolution;
use crate::topology::{ApplicationKind, ApplicationSpec, PermissionEdge};

/// Action a run would take for one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlannedAction {
    Create,
    Adopt,
}

impl std::fmt::Display for PlannedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create => f.write_str("create"),
            Self::Adopt => f.write_str("adopt"),
        }
    }
}

/// Planned action for one spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedResource {
    pub display_name: String,
    pub kind: ApplicationKind,
    pub action: PlannedAction,
    /// Existing object that would be adopted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    /// An adopted object has no principal, so one would be created.
    #[serde(default)]
    pub repairs_principal: bool,
    /// Other objects sharing the display name.
    #[serde(default)]
    pub duplicates: usize,
}

impl PlannedResource {
    pub(crate) fn from_resolution(spec: &ApplicationSpec, resolution: Option<&Resolution>) -> Self {
        match resolution {
            Some(found) => Self {
                display_name: spec.display_name.clone(),
                kind: spec.kind,
                action: PlannedAction::Adopt,
                object_id: Some(found.application.id.clone()),
                repairs_principal: found.principal.is_none(),
                duplicates: found.duplicates,
            },
            None => Self {
                display_name: spec.display_name.clone(),
                kind: spec.kind,
                action: PlannedAction::Create,
                object_id: None,
                repairs_principal: false,
                duplicates: 0,
            },
        }
    }
}

/// Result of a dry run. Nothing was written to the directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunPlan {
    pub resources: Vec<PlannedResource>,
    /// Edges the run would wire; already declared ones become no-ops.
    pub permission_edges: Vec<PermissionEdge>,
    /// Lookups that failed while planning.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl RunPlan {
    /// Number of resources with the given action.
    #[must_use]
    pub fn count(&self, action: PlannedAction) -> usize {
        self.resources.iter().filter(|r| r.action == action).count()
    }

    /// True when a run would create nothing.
    #[must_use]
    pub fn is_converged(&self) -> bool {
        self.count(PlannedAction::Create) == 0
            && self.resources.iter().all(|r| !r.repairs_principal)
            && self.errors.is_empty()
    }
}
