//! Direct transport: the local proxy speaking Tally's XML protocol.

use crate::protocol::{ConnectionStatus, RequestKind, RequestParams, build_request, scan_connection};
use crate::source::types::{SourceError, check_response};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// Client for the locally running proxy that brokers Tally gateway calls.
///
/// The proxy accepts the XML envelope as a plain POST body at its root and
/// answers with Tally's XML document. It is reachable only from the machine
/// it runs on, so connection errors here usually mean "proxy not started",
/// not a network outage.
#[derive(Clone)]
pub struct DirectSource {
    http_client: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl DirectSource {
    /// Create a new direct client.
    ///
    /// # Arguments
    /// * `base_url` - The proxy address, e.g. `http://localhost:8765`.
    /// * `auth_token` - Token sent as `X-Tally-Auth` when the proxy
    ///   advertises `auth_required`; omitted otherwise.
    pub fn new(base_url: String, auth_token: Option<String>) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(150))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http_client,
            base_url,
            auth_token,
        }
    }

    /// POST a request envelope and return the raw XML response body.
    ///
    /// The per-operation timeout from `RequestKind` overrides the client-wide
    /// ceiling, so a voucher export gets its two minutes while a probe gives
    /// up after five seconds.
    pub async fn post_envelope(
        &self,
        kind: RequestKind,
        params: &RequestParams,
    ) -> Result<String, SourceError> {
        let envelope = build_request(kind, params);
        debug!("POST {:?} envelope to {}", kind, self.base_url);

        let mut request = self
            .http_client
            .post(&self.base_url)
            .header("Content-Type", "application/xml")
            .timeout(kind.timeout())
            .body(envelope.into_body());

        if let Some(token) = &self.auth_token {
            request = request.header("X-Tally-Auth", token);
        }

        let response = check_response(request.send().await?).await?;
        Ok(response.text().await?)
    }

    /// Probe connectivity with the 5-second status request.
    ///
    /// Never fails: a missing endpoint or an unreachable proxy is a
    /// `Disconnected`/`Unknown` verdict, because status polling must always
    /// leave the UI something to render.
    pub async fn probe(&self) -> ConnectionStatus {
        match self
            .post_envelope(RequestKind::ConnectionTest, &RequestParams::default())
            .await
        {
            Ok(body) => scan_connection(&body),
            Err(SourceError::Unavailable(_)) => ConnectionStatus::Disconnected,
            Err(SourceError::AuthenticationFailed(message)) => {
                warn!("Status probe rejected: {}", message);
                ConnectionStatus::Disconnected
            }
            Err(e) => {
                debug!("Status probe failed: {}", e);
                ConnectionStatus::Disconnected
            }
        }
    }
}
