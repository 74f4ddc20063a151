//! [`DirectoryClient`] implementation over Microsoft Graph.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::graph_client::GraphClient;
use crate::models::{
    AppRoleAssignment, Application, ApplicationPatch, NewApplication, NewPrincipal,
    PasswordCredential, Principal,
};
use crate::{
    DirectoryClient, DirectoryConfig, DirectoryCredentials, DirectoryError, DirectoryResult,
    TokenCache,
};

/// Directory backed by the Microsoft Graph REST API.
#[derive(Debug)]
pub struct GraphDirectory {
    graph: GraphClient,
}

impl GraphDirectory {
    /// Creates a directory client. No network call is made until
    /// [`DirectoryClient::authenticate`] or the first operation.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        config: &DirectoryConfig,
        credentials: DirectoryCredentials,
    ) -> DirectoryResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| DirectoryError::Config(format!("failed to create HTTP client: {e}")))?;

        let tokens = Arc::new(TokenCache::new(http_client.clone(), config, credentials));
        Ok(Self {
            graph: GraphClient::new(http_client, tokens, config),
        })
    }

    /// Underlying Graph client.
    #[must_use]
    pub fn graph_client(&self) -> &GraphClient {
        &self.graph
    }
}

/// Quotes a value as an OData string literal.
fn odata_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[async_trait]
impl DirectoryClient for GraphDirectory {
    #[instrument(skip(self))]
    async fn authenticate(&self) -> DirectoryResult<()> {
        self.graph.tokens().bearer().await.map(|_| ())
    }

    #[instrument(skip(self))]
    async fn find_applications_by_name(
        &self,
        display_name: &str,
    ) -> DirectoryResult<Vec<Application>> {
        let filter = format!("displayName eq {}", odata_literal(display_name));
        let url = self.graph.url("applications", &[("$filter", filter.as_str())])?;
        let apps: Vec<Application> = self.graph.get_all(url).await?;
        debug!(count = apps.len(), "Applications matched by display name");
        Ok(apps)
    }

    #[instrument(skip(self))]
    async fn get_application(&self, object_id: &str) -> DirectoryResult<Application> {
        let url = self.graph.url(&format!("applications/{object_id}"), &[])?;
        self.graph.get(url).await
    }

    #[instrument(skip(self))]
    async fn find_principal_by_app_id(&self, app_id: &str) -> DirectoryResult<Option<Principal>> {
        let filter = format!("appId eq {}", odata_literal(app_id));
        let url = self
            .graph
            .url("servicePrincipals", &[("$filter", filter.as_str())])?;
        let principals: Vec<Principal> = self.graph.get_all(url).await?;
        Ok(principals.into_iter().next())
    }

    #[instrument(skip(self, request), fields(display_name = %request.display_name))]
    async fn create_application(&self, request: &NewApplication) -> DirectoryResult<Application> {
        let url = self.graph.url("applications", &[])?;
        let created: Application = self.graph.post(url, request).await?;
        info!(object_id = %created.id, app_id = %created.app_id, "Application created");
        Ok(created)
    }

    #[instrument(skip(self, patch))]
    async fn update_application(
        &self,
        object_id: &str,
        patch: &ApplicationPatch,
    ) -> DirectoryResult<()> {
        let url = self.graph.url(&format!("applications/{object_id}"), &[])?;
        self.graph.patch(url, patch).await
    }

    #[instrument(skip(self, request), fields(app_id = %request.app_id))]
    async fn create_principal(&self, request: &NewPrincipal) -> DirectoryResult<Principal> {
        let url = self.graph.url("servicePrincipals", &[])?;
        let created: Principal = self.graph.post(url, request).await?;
        info!(principal_id = %created.id, "Principal created");
        Ok(created)
    }

    #[instrument(skip(self))]
    async fn create_credential(
        &self,
        object_id: &str,
        description: &str,
        expires_at: DateTime<Utc>,
    ) -> DirectoryResult<PasswordCredential> {
        let url = self
            .graph
            .url(&format!("applications/{object_id}/addPassword"), &[])?;
        let body = json!({
            "passwordCredential": {
                "displayName": description,
                "endDateTime": expires_at.to_rfc3339(),
            }
        });
        self.graph.post(url, &body).await
    }

    #[instrument(skip(self))]
    async fn create_role_assignment(
        &self,
        principal_id: &str,
        resource_id: &str,
        role_id: &str,
    ) -> DirectoryResult<AppRoleAssignment> {
        let url = self
            .graph
            .url(&format!("servicePrincipals/{principal_id}/appRoleAssignments"), &[])?;
        let body = json!({
            "principalId": principal_id,
            "resourceId": resource_id,
            "appRoleId": role_id,
        });
        self.graph.post(url, &body).await
    }
}
