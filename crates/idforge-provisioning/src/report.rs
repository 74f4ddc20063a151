//! Run report generation.
//!
//! Aggregates per-resource outcomes, errors and warnings of a run into a
//! single serializable record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::outcome::ProvisionOutcome;
use crate::wiring::WiringReport;

/// Complete result of one provisioning run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Run ID.
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// True whenever authentication succeeded. Inspect `errors` and
    /// `warnings` for per-resource problems.
    pub success: bool,
    /// The run stopped early on request.
    pub cancelled: bool,
    /// Application outcomes, in topology order.
    pub applications: Vec<ProvisionOutcome>,
    /// Enterprise object outcomes, in topology order.
    pub enterprise: Vec<ProvisionOutcome>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub summary: RunSummary,
}

impl RunReport {
    /// Every outcome, applications first.
    pub fn outcomes(&self) -> impl Iterator<Item = &ProvisionOutcome> {
        self.applications.iter().chain(self.enterprise.iter())
    }

    /// Outcome recorded for `display_name`, if any.
    #[must_use]
    pub fn outcome(&self, display_name: &str) -> Option<&ProvisionOutcome> {
        self.outcomes().find(|o| o.display_name == display_name)
    }

    /// Whole seconds between start and finish.
    #[must_use]
    pub fn duration_seconds(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds()
    }
}

/// Summary counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub applications_created: u32,
    pub applications_adopted: u32,
    pub enterprise_created: u32,
    pub enterprise_adopted: u32,
    /// Applications whose admin authorization succeeded.
    pub authorizations_granted: u32,
    pub edges_applied: u32,
    pub edges_already_satisfied: u32,
    pub errors: u32,
    pub warnings: u32,
}

impl RunSummary {
    /// Calculate from the report's lists.
    #[must_use]
    pub fn from_outcomes(
        applications: &[ProvisionOutcome],
        enterprise: &[ProvisionOutcome],
        errors: usize,
        warnings: usize,
    ) -> Self {
        let count = |list: &[ProvisionOutcome], created: bool| {
            list.iter().filter(|o| o.is_created() == created).count() as u32
        };
        Self {
            applications_created: count(applications, true),
            applications_adopted: count(applications, false),
            enterprise_created: count(enterprise, true),
            enterprise_adopted: count(enterprise, false),
            authorizations_granted: applications
                .iter()
                .chain(enterprise)
                .filter(|o| o.authorization_granted)
                .count() as u32,
            edges_applied: 0,
            edges_already_satisfied: 0,
            errors: errors as u32,
            warnings: warnings as u32,
        }
    }
}

/// Incrementally assembles a [`RunReport`]. Consumed by [`finish`](Self::finish).
#[derive(Debug)]
pub struct RunReportBuilder {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    cancelled: bool,
    applications: Vec<ProvisionOutcome>,
    enterprise: Vec<ProvisionOutcome>,
    errors: Vec<String>,
    warnings: Vec<String>,
    edges_applied: u32,
    edges_already_satisfied: u32,
}

impl RunReportBuilder {
    /// Starts a report with a fresh run id.
    #[must_use]
    pub fn new() -> Self {
        Self::with_run_id(Uuid::new_v4())
    }

    #[must_use]
    pub fn with_run_id(run_id: Uuid) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            cancelled: false,
            applications: Vec::new(),
            enterprise: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            edges_applied: 0,
            edges_already_satisfied: 0,
        }
    }

    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn application(&mut self, outcome: ProvisionOutcome) {
        self.applications.push(outcome);
    }

    pub fn enterprise(&mut self, outcome: ProvisionOutcome) {
        self.enterprise.push(outcome);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn wiring(&mut self, wiring: WiringReport) {
        self.edges_applied += wiring.applied as u32;
        self.edges_already_satisfied += wiring.already_satisfied as u32;
        self.warnings.extend(wiring.warnings);
        if wiring.cancelled > 0 {
            self.cancelled = true;
        }
    }

    pub fn cancelled(&mut self) {
        self.cancelled = true;
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Finalizes the report. Outcome warnings are also copied to the
    /// run-level warning list so callers can read a single list.
    #[must_use]
    pub fn finish(mut self) -> RunReport {
        let outcome_warnings: Vec<String> = self
            .applications
            .iter()
            .chain(&self.enterprise)
            .flat_map(|o| o.warnings.iter().cloned())
            .collect();
        let mut warnings = outcome_warnings;
        warnings.append(&mut self.warnings);

        let mut summary = RunSummary::from_outcomes(
            &self.applications,
            &self.enterprise,
            self.errors.len(),
            warnings.len(),
        );
        summary.edges_applied = self.edges_applied;
        summary.edges_already_satisfied = self.edges_already_satisfied;

        RunReport {
            run_id: self.run_id,
            started_at: self.started_at,
            finished_at: Utc::now(),
            success: true,
            cancelled: self.cancelled,
            applications: self.applications,
            enterprise: self.enterprise,
            errors: self.errors,
            warnings,
            summary,
        }
    }
}

impl Default for RunReportBuilder {
    fn default() -> Self {
        Self::new()
    }
}
