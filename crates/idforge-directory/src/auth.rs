//! Client-credentials authentication against the directory's token issuer.

use chrono::{DateTime, Duration, Utc};
use secrecy::ExposeSecret;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::{DirectoryConfig, DirectoryCredentials, DirectoryError, DirectoryResult};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct BearerToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl BearerToken {
    /// True once the token is inside the refresh window.
    fn needs_refresh(&self, now: DateTime<Utc>, refresh_window: Duration) -> bool {
        now + refresh_window >= self.expires_at
    }
}

/// Acquires and caches the bearer token for one provisioning run.
#[derive(Debug)]
pub struct TokenCache {
    http_client: reqwest::Client,
    token_url: String,
    scope: String,
    tenant_id: String,
    credentials: DirectoryCredentials,
    current: RwLock<Option<BearerToken>>,
    refresh_window: Duration,
}

impl TokenCache {
    /// Creates a cache for the tenant described by `config`.
    #[must_use]
    pub fn new(
        http_client: reqwest::Client,
        config: &DirectoryConfig,
        credentials: DirectoryCredentials,
    ) -> Self {
        Self {
            http_client,
            token_url: format!(
                "{}/{}/oauth2/v2.0/token",
                config.login_endpoint(),
                config.tenant_id
            ),
            scope: config.token_scope(),
            tenant_id: config.tenant_id.clone(),
            credentials,
            current: RwLock::new(None),
            refresh_window: Duration::minutes(5),
        }
    }

    /// Returns a valid access token, requesting a new one when the cached
    /// token is missing or about to expire.
    #[instrument(skip(self), fields(tenant_id = %self.tenant_id))]
    pub async fn bearer(&self) -> DirectoryResult<String> {
        {
            let current = self.current.read().await;
            if let Some(token) = current.as_ref() {
                if !token.needs_refresh(Utc::now(), self.refresh_window) {
                    return Ok(token.value.clone());
                }
            }
        }

        let mut current = self.current.write().await;
        // Another caller may have refreshed while we waited for the lock.
        if let Some(token) = current.as_ref() {
            if !token.needs_refresh(Utc::now(), self.refresh_window) {
                return Ok(token.value.clone());
            }
        }

        let fresh = self.request_token().await?;
        let value = fresh.value.clone();
        *current = Some(fresh);
        Ok(value)
    }

    /// Drops the cached token so the next call re-authenticates.
    pub async fn invalidate(&self) {
        *self.current.write().await = None;
    }

    async fn request_token(&self) -> DirectoryResult<BearerToken> {
        debug!("Requesting access token");

        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.credentials.client_id.as_str()),
            (
                "client_secret",
                self.credentials.client_secret.expose_secret(),
            ),
            ("scope", self.scope.as_str()),
        ];

        let response = self
            .http_client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| DirectoryError::Auth(format!("token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DirectoryError::Auth(format!(
                "token request rejected with status {status}: {body}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| DirectoryError::Auth(format!("malformed token response: {e}")))?;

        let expires_at = Utc::now() + Duration::seconds(token.expires_in);
        debug!(expires_at = %expires_at, "Access token acquired");

        Ok(BearerToken {
            value: token.access_token,
            expires_at,
        })
    }
}
