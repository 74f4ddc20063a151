//! Microsoft Graph directory client for idforge.
//!
//! Exposes the [`DirectoryClient`] contract the provisioning orchestrator is
//! written against, together with [`GraphDirectory`], its implementation over
//! the Microsoft Graph REST API.
//!
//! # Features
//!
//! - `OAuth2` client credentials authentication with token caching
//! - Typed request and response shapes for applications, principals,
//!   password credentials and role assignments
//! - Per-call timeouts and bounded retry of throttling and gateway errors
//! - Error classification (`is_conflict`, `is_transient`,
//!   `is_not_yet_replicated`) used by callers to pick a retry policy
//! - Multi-cloud endpoints (Commercial, US Government, China)
//!
//! # Example
//!
//! ```no_run
//! use idforge_directory::{DirectoryClient, DirectoryConfig, DirectoryCredentials, GraphDirectory};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DirectoryConfig::builder().tenant_id("your-tenant-id").build()?;
//! let credentials = DirectoryCredentials {
//!     client_id: "your-client-id".to_string(),
//!     client_secret: "your-client-secret".to_string().into(),
//! };
//!
//! let directory = GraphDirectory::new(&config, credentials)?;
//! directory.authenticate().await?;
//! let matches = directory.find_applications_by_name("contoso-api").await?;
//! # Ok(())
//! # }
//! ```

mod auth;
mod client;
mod config;
mod directory;
mod error;
mod graph_client;
pub mod models;

pub use auth::TokenCache;
pub use client::DirectoryClient;
pub use config::{
    CloudEnvironment, DirectoryConfig, DirectoryConfigBuilder, DirectoryCredentials,
    MAX_TRANSIENT_RETRIES,
};
pub use directory::GraphDirectory;
pub use error::{DirectoryError, DirectoryResult};
pub use graph_client::{GraphClient, ODataCollection, ODataError, ODataErrorBody};
