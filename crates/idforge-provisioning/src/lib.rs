//! Create-or-adopt provisioning of identity resources for idforge.
//!
//! A [`Topology`] lists the application identities, enterprise sign-on
//! objects and permission edges a deployment needs. The [`Orchestrator`]
//! reconciles it against the directory in one sequential run and returns a
//! [`RunReport`].
//!
//! # Features
//!
//! - Display-name resolution with a per-run identity cache
//! - Application provisioning (web, single-page) with exposed scopes,
//!   identifier URI and credential minting
//! - Enterprise objects with federated (SAML) or proxy sign-on profiles
//! - Idempotent permission wiring between provisioned applications
//! - Best-effort admin authorization with bounded retry
//! - Dry-run planning and cooperative cancellation
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use idforge_directory::{DirectoryConfig, DirectoryCredentials, GraphDirectory};
//! use idforge_provisioning::{Orchestrator, Topology};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let topology = Topology::from_path(std::path::Path::new("topology.yaml"))?;
//! let config = DirectoryConfig::builder().tenant_id("your-tenant-id").build()?;
//! let credentials = DirectoryCredentials {
//!     client_id: "your-client-id".to_string(),
//!     client_secret: "your-client-secret".to_string().into(),
//! };
//!
//! let directory = Arc::new(GraphDirectory::new(&config, credentials)?);
//! let orchestrator = Orchestrator::for_topology(directory, &topology);
//! let report = orchestrator.run(&topology, &CancellationToken::new()).await?;
//! println!("{} errors", report.errors.len());
//! # Ok(())
//! # }
//! ```

mod application;
mod authorization;
mod config;
mod enterprise;
mod error;
mod orchestrator;
mod outcome;
mod plan;
mod report;
mod resolver;
pub mod retry;
mod steps;
mod topology;
mod wiring;

pub use application::ApplicationProvisioner;
pub use authorization::{AdminAuthorizer, AuthorizationOutcome};
pub use config::{ProvisionerConfig, RetrySettings, MAX_CREDENTIAL_LIFETIME_DAYS};
pub use enterprise::{
    EnterpriseProfile, EnterpriseProvisioner, TAG_CUSTOM_SSO, TAG_ENTERPRISE, TAG_ON_PREM_PROXY,
};
pub use error::{ProvisionFailure, ProvisioningError, ProvisioningResult};
pub use orchestrator::Orchestrator;
pub use outcome::{
    Disposition, ProvisionOutcome, ResourceIdentity, CREDENTIAL_NOT_REQUESTED,
    CREDENTIAL_NOT_RETURNED, CREDENTIAL_UNAVAILABLE,
};
pub use plan::{PlannedAction, PlannedResource, RunPlan};
pub use report::{RunReport, RunReportBuilder, RunSummary};
pub use resolver::{Resolution, ResourceResolver};
pub use topology::{
    ApplicationKind, ApplicationSpec, PermissionEdge, PermissionType, ScopeSpec, Topology,
};
pub use wiring::{merge_required_access, EdgeResult, PermissionWiring, WiringReport};
