//! Common test utilities for idforge-directory integration tests.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use idforge_directory::{DirectoryConfig, DirectoryCredentials, GraphDirectory};

pub const TENANT_ID: &str = "test-tenant";
pub const ACCESS_TOKEN: &str = "mock-access-token";

/// Application document as Graph returns it.
pub fn application_json(object_id: &str, app_id: &str, name: &str) -> Value {
    json!({
        "id": object_id,
        "appId": app_id,
        "displayName": name,
        "signInAudience": "AzureADMyOrg",
        "identifierUris": [],
        "api": {"oauth2PermissionScopes": []},
        "appRoles": [],
        "requiredResourceAccess": []
    })
}

/// Service principal document as Graph returns it.
pub fn principal_json(id: &str, app_id: &str) -> Value {
    json!({
        "id": id,
        "appId": app_id,
        "displayName": "principal",
        "tags": ["WindowsAzureActiveDirectoryIntegratedApp"],
        "preferredSingleSignOnMode": null
    })
}

/// Wraps items in an OData collection.
pub fn odata_collection(items: Vec<Value>, next_link: Option<&str>) -> Value {
    let mut response = json!({ "value": items });
    if let Some(link) = next_link {
        response["@odata.nextLink"] = json!(link);
    }
    response
}

/// OData error document.
pub fn odata_error(code: &str, message: &str) -> Value {
    json!({
        "error": {
            "code": code,
            "message": message
        }
    })
}

/// Mock server standing in for both the token issuer and Graph.
pub struct MockGraphServer {
    pub server: MockServer,
}

impl MockGraphServer {
    pub async fn new() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Directory client pointed at this server with millisecond backoff.
    pub fn directory(&self) -> GraphDirectory {
        let config = DirectoryConfig::builder()
            .tenant_id(TENANT_ID)
            .graph_endpoint(self.url())
            .login_endpoint(self.url())
            .request_timeout(Duration::from_secs(5))
            .transient_backoff(Duration::from_millis(1))
            .max_transient_retries(2)
            .build()
            .expect("valid test config");
        let credentials = DirectoryCredentials {
            client_id: "client".to_string(),
            client_secret: "secret".to_string().into(),
        };
        GraphDirectory::new(&config, credentials).expect("directory client")
    }

    pub async fn mock_token_endpoint(&self) {
        Mock::given(method("POST"))
            .and(path(format!("/{TENANT_ID}/oauth2/v2.0/token")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": ACCESS_TOKEN,
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_token_rejected(&self) {
        Mock::given(method("POST"))
            .and(path(format!("/{TENANT_ID}/oauth2/v2.0/token")))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({"error": "invalid_client"})),
            )
            .mount(&self.server)
            .await;
    }
}
