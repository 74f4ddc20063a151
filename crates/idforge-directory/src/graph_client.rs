//! Microsoft Graph HTTP client with token injection and transient retry.

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::{DirectoryConfig, DirectoryError, DirectoryResult, TokenCache};

/// `OData` error response from Microsoft Graph.
#[derive(Debug, Deserialize)]
pub struct ODataError {
    pub error: ODataErrorBody,
}

/// `OData` error body.
#[derive(Debug, Deserialize)]
pub struct ODataErrorBody {
    pub code: String,
    pub message: String,
}

/// Collection response from Microsoft Graph.
#[derive(Debug, Deserialize)]
pub struct ODataCollection<T> {
    pub value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

/// Thin Graph client shared by every directory operation.
#[derive(Debug)]
pub struct GraphClient {
    http_client: reqwest::Client,
    tokens: Arc<TokenCache>,
    base_url: String,
    max_retries: u32,
    backoff: Duration,
}

impl GraphClient {
    /// Creates a client over an already configured HTTP client.
    #[must_use]
    pub fn new(
        http_client: reqwest::Client,
        tokens: Arc<TokenCache>,
        config: &DirectoryConfig,
    ) -> Self {
        Self {
            http_client,
            tokens,
            base_url: format!("{}/{}", config.graph_endpoint(), config.api_version),
            max_retries: config.max_transient_retries,
            backoff: config.transient_backoff,
        }
    }

    /// Base URL including the API version segment.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Token cache backing this client.
    #[must_use]
    pub fn tokens(&self) -> &Arc<TokenCache> {
        &self.tokens
    }

    /// Builds a URL under the API root with encoded query parameters.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::Url`] when the resulting URL is invalid.
    pub fn url(&self, path: &str, query: &[(&str, &str)]) -> DirectoryResult<Url> {
        let raw = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        if query.is_empty() {
            Ok(Url::parse(&raw)?)
        } else {
            Ok(Url::parse_with_params(&raw, query)?)
        }
    }

    /// Performs a GET and decodes the JSON body.
    #[instrument(skip(self, url), fields(url = %url))]
    pub async fn get<T: DeserializeOwned>(&self, url: Url) -> DirectoryResult<T> {
        let body = self.send(Method::GET, url, None::<&()>).await?;
        decode(body)
    }

    /// Follows `@odata.nextLink` until the collection is exhausted.
    #[instrument(skip(self, url), fields(url = %url))]
    pub async fn get_all<T: DeserializeOwned>(&self, url: Url) -> DirectoryResult<Vec<T>> {
        let mut items = Vec::new();
        let mut next = Some(url);
        while let Some(page_url) = next.take() {
            debug!(page = %page_url, "Fetching page");
            let page: ODataCollection<T> = self.get(page_url).await?;
            items.extend(page.value);
            if let Some(link) = page.next_link {
                next = Some(Url::parse(&link)?);
            }
        }
        Ok(items)
    }

    /// Performs a POST and decodes the JSON body.
    #[instrument(skip(self, url, body), fields(url = %url))]
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        url: Url,
        body: &B,
    ) -> DirectoryResult<T> {
        let body = self.send(Method::POST, url, Some(body)).await?;
        decode(body)
    }

    /// Performs a PATCH. Graph answers 204 No Content, so nothing is decoded.
    #[instrument(skip(self, url, body), fields(url = %url))]
    pub async fn patch<B: Serialize + ?Sized>(&self, url: Url, body: &B) -> DirectoryResult<()> {
        self.send(Method::PATCH, url, Some(body)).await.map(|_| ())
    }

    /// Sends a request, retrying throttling and gateway errors with
    /// exponential backoff. Returns the raw response body.
    ///
    /// Gateway errors are only replayed for idempotent methods. A POST that
    /// timed out at the gateway may still have been applied, so the error is
    /// returned to the caller instead.
    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> DirectoryResult<String> {
        let mut attempt = 0u32;
        let mut delay = self.backoff;
        let mut reauthenticated = false;

        loop {
            let token = self.tokens.bearer().await?;
            let mut request = self
                .http_client
                .request(method.clone(), url.clone())
                .bearer_auth(&token);
            if let Some(b) = body {
                request = request.json(b);
            }

            let response = request.send().await.map_err(|e| {
                if e.is_timeout() {
                    DirectoryError::Timeout(format!("{method} {}", url.path()))
                } else {
                    DirectoryError::Http(e)
                }
            })?;
            let status = response.status();

            if status.is_success() {
                return response.text().await.map_err(DirectoryError::from);
            }

            if status == StatusCode::UNAUTHORIZED && !reauthenticated {
                debug!("Token rejected, re-authenticating");
                self.tokens.invalidate().await;
                reauthenticated = true;
                continue;
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok());
                if attempt >= self.max_retries {
                    return Err(DirectoryError::RateLimited {
                        retry_after_secs: retry_after.unwrap_or(0),
                    });
                }
                attempt += 1;
                let wait = retry_after.map_or(delay, Duration::from_secs);
                warn!(attempt, max = self.max_retries, ?wait, "Throttled by Graph");
                tokio::time::sleep(wait).await;
                delay = delay.saturating_mul(2);
                continue;
            }

            if is_gateway_error(status) && method != Method::POST && attempt < self.max_retries {
                attempt += 1;
                warn!(%status, attempt, max = self.max_retries, ?delay, "Transient Graph error");
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
                continue;
            }

            let text = response.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<ODataError>(&text) {
                Ok(odata) => DirectoryError::graph(status, odata.error.code, odata.error.message),
                Err(_) => DirectoryError::graph(status, status.as_str(), text),
            });
        }
    }
}

fn is_gateway_error(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
    )
}

fn decode<T: DeserializeOwned>(body: String) -> DirectoryResult<T> {
    // Some endpoints answer 201/204 with an empty body; decode that as `null`.
    let body = if body.trim().is_empty() { "null".to_string() } else { body };
    serde_json::from_str(&body).map_err(DirectoryError::from)
}
