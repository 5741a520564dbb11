//! Error taxonomy and shared types for transport sources.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Error types for transport operations.
///
/// The variants carry the retry taxonomy: transient faults are worth another
/// attempt, everything else must surface to the user unchanged because
/// retrying cannot fix it.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {code}: {message}")]
    Status { code: u16, message: String },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Not available: {0}")]
    Unavailable(String),

    #[error("Bridge relay error: {0}")]
    Relay(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SourceError {
    /// Whether retrying the same request can plausibly succeed.
    ///
    /// Network faults and server-side 5xx are transient blips; a rejected
    /// token or a missing endpoint will reject identically on every attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            SourceError::Http(_) | SourceError::Relay(_) => true,
            SourceError::Status { code, .. } => *code >= 500,
            SourceError::AuthenticationFailed(_)
            | SourceError::Unavailable(_)
            | SourceError::Json(_) => false,
        }
    }
}

/// Map an HTTP response into the source error taxonomy before reading its
/// body. 401 carries the user-actionable auth message; 404 means the endpoint
/// or feature does not exist on this backend.
pub(crate) async fn check_response(
    response: reqwest::Response,
) -> Result<reqwest::Response, SourceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    match status.as_u16() {
        401 => Err(SourceError::AuthenticationFailed(
            "the Tally proxy rejected the auth token; set a valid token in connection settings"
                .to_string(),
        )),
        404 => Err(SourceError::Unavailable(format!(
            "endpoint not found: {}",
            response.url().path()
        ))),
        code => {
            let message = response.text().await.unwrap_or_default();
            Err(SourceError::Status { code, message })
        }
    }
}

/// One connected relay, as listed by the bridge registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeInfo {
    pub token: String,
    #[serde(default)]
    pub connected: bool,
    /// RFC 3339 timestamp of the relay's last heartbeat, if it sent one.
    #[serde(default, alias = "last_seen")]
    pub last_seen: Option<String>,
}

/// Outcome of a completed backup upload.
#[derive(Debug, Clone)]
pub struct UploadReceipt {
    /// Companies the server found in the uploaded extraction.
    pub company_count: usize,
    /// Size of the uploaded file.
    pub bytes: u64,
    /// Wall-clock duration of the upload.
    pub elapsed: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_taxonomy_matches_error_class() {
        assert!(
            SourceError::Status {
                code: 503,
                message: String::new()
            }
            .is_transient()
        );
        assert!(SourceError::Relay("relay hop dropped".to_string()).is_transient());

        assert!(!SourceError::AuthenticationFailed("bad token".to_string()).is_transient());
        assert!(!SourceError::Unavailable("no such endpoint".to_string()).is_transient());
        assert!(
            !SourceError::Status {
                code: 400,
                message: String::new()
            }
            .is_transient()
        );
    }

    #[test]
    fn bridge_info_accepts_both_heartbeat_spellings() {
        let info: BridgeInfo = serde_json::from_value(serde_json::json!({
            "token": "abc",
            "connected": true,
            "last_seen": "2026-08-01T10:00:00Z",
        }))
        .unwrap();
        assert_eq!(info.last_seen.as_deref(), Some("2026-08-01T10:00:00Z"));
    }
}
