//! Bridge transport: cloud-to-local relay keyed by a pairing token.
//!
//! The relay exposes convenience JSON endpoints for cheap queries and a
//! generic `/tally` endpoint that forwards a raw XML envelope to the paired
//! machine and returns Tally's XML answer verbatim. Relay-side failures come
//! back as JSON `{"error": …}` bodies and are surfaced distinctly so the
//! gateway can retry them as transient hop faults.

use crate::protocol::{ConnectionStatus, XmlEnvelope};
use crate::source::types::{BridgeInfo, SourceError, check_response};
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Client for the `/bridge/{token}/…` relay endpoints.
#[derive(Clone)]
pub struct BridgeSource {
    http_client: Client,
    base_url: String,
    token: String,
}

impl BridgeSource {
    /// Create a new bridge client for one pairing token.
    pub fn new(base_url: String, token: String) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(150))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http_client,
            base_url,
            token,
        }
    }

    fn endpoint(&self, suffix: &str) -> String {
        format!("{}/bridge/{}/{}", self.base_url, self.token, suffix)
    }

    /// Raw status payload for this relay.
    pub async fn status(&self) -> Result<serde_json::Value, SourceError> {
        let response = self
            .http_client
            .get(self.endpoint("status"))
            .timeout(Duration::from_secs(5))
            .send()
            .await?;
        Ok(check_response(response).await?.json().await?)
    }

    /// Probe connectivity through the relay's status endpoint.
    ///
    /// A relay can be registered but have lost its local peer, so `connected`
    /// in the payload is the authority; a missing endpoint means no relay
    /// with this token exists at all.
    pub async fn probe(&self) -> ConnectionStatus {
        match self.status().await {
            Ok(payload) => match payload.get("connected").and_then(|c| c.as_bool()) {
                Some(true) => ConnectionStatus::Connected,
                Some(false) => ConnectionStatus::Disconnected,
                None => ConnectionStatus::Unknown,
            },
            Err(SourceError::Unavailable(_)) => ConnectionStatus::Disconnected,
            Err(e) => {
                debug!("Bridge status probe failed: {}", e);
                ConnectionStatus::Unknown
            }
        }
    }

    /// Company list via the relay's convenience endpoint.
    ///
    /// Returns the raw `{"companies": […]}` payload for the normalizer.
    pub async fn companies(&self) -> Result<serde_json::Value, SourceError> {
        let response = self
            .http_client
            .get(self.endpoint("companies"))
            .timeout(Duration::from_secs(30))
            .send()
            .await?;
        Ok(check_response(response).await?.json().await?)
    }

    /// Forward an XML envelope to the paired Tally and return its XML answer.
    ///
    /// # Arguments
    /// * `envelope` - The rendered request envelope.
    /// * `timeout` - Budget granted to the far side, also used as the HTTP
    ///   timeout for the relay hop itself.
    pub async fn relay(
        &self,
        envelope: XmlEnvelope,
        timeout: Duration,
    ) -> Result<String, SourceError> {
        let request_body = json!({
            "payload": envelope.body(),
            "headers": { "Content-Type": "application/xml" },
            "timeout": timeout.as_secs(),
        });

        let response = self
            .http_client
            .post(self.endpoint("tally"))
            .timeout(timeout)
            .json(&request_body)
            .send()
            .await?;
        let body = check_response(response).await?.text().await?;

        // The relay answers with the forwarded XML, except when the hop
        // itself failed, which arrives as a JSON error envelope.
        if body.trim_start().starts_with('{') {
            if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(&body) {
                if let Some(message) = parsed.get("error").and_then(|e| e.as_str()) {
                    return Err(SourceError::Relay(message.to_string()));
                }
                if let Some(xml) = parsed.get("response").and_then(|r| r.as_str()) {
                    return Ok(xml.to_string());
                }
            }
        }

        Ok(body)
    }

    /// List every relay currently registered with the server.
    pub async fn list_bridges(&self) -> Result<Vec<BridgeInfo>, SourceError> {
        let response = self
            .http_client
            .get(format!("{}/bridge/bridges", self.base_url))
            .timeout(Duration::from_secs(10))
            .send()
            .await?;
        let payload: serde_json::Value = check_response(response).await?.json().await?;

        // Either a bare array or {"bridges": [...]}.
        let items = payload
            .get("bridges")
            .and_then(|b| b.as_array())
            .cloned()
            .or_else(|| payload.as_array().cloned())
            .unwrap_or_default();

        Ok(items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect())
    }
}
