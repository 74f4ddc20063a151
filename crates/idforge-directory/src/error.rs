//! Error types for the directory client.

use reqwest::StatusCode;
use thiserror::Error;

/// Result type alias using `DirectoryError`.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Graph error codes that mean the object being created already exists.
const CONFLICT_CODES: &[&str] = &[
    "Request_MultipleObjectsWithSameKeyValue",
    "ObjectConflict",
    "Conflict",
];

/// Message fragments Graph uses for "already exists" when it reports the
/// conflict as a generic bad request. Matched case-insensitively.
const CONFLICT_MESSAGES: &[&str] = &[
    "already exist",
    "already assigned",
    "permission being assigned already exists",
];

/// Message fragments emitted while a just-created application has not been
/// replicated to the directory partition serving the next request.
const REPLICATION_MESSAGES: &[&str] = &[
    "does not reference a valid application object",
    "does not exist or one of its queried reference-property objects are not present",
];

/// Errors that can occur when talking to the directory.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Client-credentials authentication failed.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Microsoft Graph returned an error document.
    #[error("Graph API error ({status}): {code} - {message}")]
    GraphApi {
        status: u16,
        code: String,
        message: String,
    },

    /// The request did not complete within the configured timeout.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Rate limit still in effect after the retry budget was spent.
    #[error("Rate limit exceeded, retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Object looked up by identifier does not exist.
    #[error("Resource not found: {0}")]
    NotFound(String),
}

impl DirectoryError {
    /// Builds a Graph API error from a status code and decoded OData body.
    pub fn graph(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::GraphApi {
            status: status.as_u16(),
            code: code.into(),
            message: message.into(),
        }
    }

    /// Returns true when the directory reports that the object or assignment
    /// being created already exists.
    ///
    /// The structured error code and HTTP 409 are checked first. Graph does
    /// not expose a dedicated code for every duplicate case, so the message
    /// text is matched as a fallback.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        match self {
            Self::GraphApi {
                status,
                code,
                message,
            } => {
                if *status == StatusCode::CONFLICT.as_u16()
                    || CONFLICT_CODES.iter().any(|c| c.eq_ignore_ascii_case(code))
                {
                    return true;
                }
                let message = message.to_ascii_lowercase();
                CONFLICT_MESSAGES.iter().any(|m| message.contains(m))
            }
            _ => false,
        }
    }

    /// Returns true for failures that are expected to clear on their own:
    /// timeouts, throttling, gateway errors and dropped connections.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::RateLimited { .. } => true,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::GraphApi { status, .. } => matches!(*status, 429 | 500 | 502 | 503 | 504),
            _ => false,
        }
    }

    /// Returns true when the error means a referenced object was created but
    /// is not yet visible to the endpoint handling this request.
    #[must_use]
    pub fn is_not_yet_replicated(&self) -> bool {
        match self {
            Self::GraphApi { code, message, .. } => {
                if code == "Request_ResourceNotFound" {
                    return true;
                }
                let message = message.to_ascii_lowercase();
                REPLICATION_MESSAGES.iter().any(|m| message.contains(m))
            }
            Self::NotFound(_) => true,
            _ => false,
        }
    }
}
