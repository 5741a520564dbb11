//! The orchestrating client the dashboards call.
//!
//! `TallyGateway` owns the session config and one client per backend. Every
//! fetch runs the same pipeline: select a route, issue the request through
//! the retry engine with the backup snapshot as the fallback chain, normalize
//! whatever shape came back, and degrade any residual error into a renderable
//! empty `FetchResult`. Nothing here panics the caller; the worst case is a
//! dashboard drawing its empty state.

use crate::config::{ConnectionType, SessionConfig};
use crate::gateway::normalize::{
    BridgePayload, RawResponse, normalize_companies, normalize_ledgers, normalize_vouchers,
};
use crate::gateway::retry::{DEFAULT_MAX_RETRIES, classify, with_retry, with_retry_and_fallback};
use crate::gateway::types::{FetchResult, GatewayError, Source};
use crate::protocol::{
    Company, ConnectionStatus, Ledger, RequestKind, RequestParams, Voucher, build_request,
};
use crate::source::{
    BackupSource, BridgeInfo, BridgeSource, DirectSource, Operation, Route, SourceError,
    UploadReceipt, check_response, select_route,
};
use chrono::NaiveDate;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info};

/// Multi-source data access client for the Tally dashboards.
pub struct TallyGateway {
    config: SessionConfig,
    server_base: String,
    http_client: Client,
    direct: DirectSource,
    bridge: Option<BridgeSource>,
    backup: BackupSource,
}

impl TallyGateway {
    /// Create a gateway from the persisted session config.
    ///
    /// # Arguments
    /// * `config` - The active session config; the gateway owns it and is the
    ///   single writer for its lifetime.
    /// * `server_base` - Base URL of the dashboard server hosting the bridge,
    ///   backup and dashboard endpoints.
    pub fn new(config: SessionConfig, server_base: impl Into<String>) -> Self {
        let server_base = server_base.into().trim_end_matches('/').to_string();
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        let direct = DirectSource::new(
            config.direct_base_url(),
            config.auth_token().map(String::from),
        );
        let bridge = config
            .bridge_token()
            .map(|token| BridgeSource::new(server_base.clone(), token.to_string()));
        let backup = BackupSource::new(server_base.clone());

        info!(
            "Created Tally gateway ({} mode against {})",
            config.connection_type(),
            server_base
        );

        Self {
            config,
            server_base,
            http_client,
            direct,
            bridge,
            backup,
        }
    }

    /// The active session config.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[allow(dead_code)]
    pub fn set_connection_type(&mut self, connection_type: ConnectionType) {
        self.config.set_connection_type(connection_type);
    }

    pub fn set_auth_token(&mut self, token: Option<String>) {
        self.config.set_auth_token(token);
        self.rebuild_direct();
    }

    pub fn set_bridge_token(&mut self, token: Option<String>) {
        self.config.set_bridge_token(token);
        self.bridge = self
            .config
            .bridge_token()
            .map(|token| BridgeSource::new(self.server_base.clone(), token.to_string()));
    }

    #[allow(dead_code)]
    pub fn set_server_override(&mut self, url: Option<String>, port: Option<u16>) {
        self.config.set_server_override(url, port);
        self.rebuild_direct();
    }

    fn rebuild_direct(&mut self) {
        self.direct = DirectSource::new(
            self.config.direct_base_url(),
            self.config.auth_token().map(String::from),
        );
    }

    /// Probe the configured live backend.
    pub async fn test_connection(&self) -> ConnectionStatus {
        match select_route(Operation::Status, &self.config, &self.server_base) {
            Route::Bridge { .. } => match &self.bridge {
                Some(bridge) => bridge.probe().await,
                None => ConnectionStatus::Unknown,
            },
            _ => self.direct.probe().await,
        }
    }

    /// Fetch the company list.
    pub async fn get_companies(&self) -> FetchResult<Vec<Company>> {
        let route = select_route(Operation::Companies, &self.config, &self.server_base);
        if matches!(route, Route::Backup { .. }) {
            let result = with_retry(
                || async {
                    let payload = self.backup.companies().await.map_err(classify)?;
                    Ok(normalize_companies(RawResponse::Backup { payload }))
                },
                DEFAULT_MAX_RETRIES,
            )
            .await;
            return finish("companies", &route, result);
        }

        let result = with_retry_and_fallback(
            || async {
                let raw = self
                    .live_raw(&route, RequestKind::CompanyList, &RequestParams::default())
                    .await
                    .map_err(classify)?;
                Ok(normalize_companies(raw))
            },
            Some(|| async {
                let payload = self.backup.companies().await?;
                Ok(normalize_companies(RawResponse::Backup { payload }).mark_auto_fallback())
            }),
            DEFAULT_MAX_RETRIES,
        )
        .await;
        finish("companies", &route, result)
    }

    /// Fetch ledgers with closing balances for one company.
    pub async fn get_ledgers(&self, company: &str) -> FetchResult<Vec<Ledger>> {
        let route = select_route(Operation::Ledgers, &self.config, &self.server_base);
        let params = RequestParams::for_company(company);

        if matches!(route, Route::Backup { .. }) {
            let result = with_retry(
                || async {
                    let payload = self.backup.data(company).await.map_err(classify)?;
                    Ok(normalize_ledgers(RawResponse::Backup { payload }))
                },
                DEFAULT_MAX_RETRIES,
            )
            .await;
            return finish("ledgers", &route, result);
        }

        let result = with_retry_and_fallback(
            || async {
                let raw = self
                    .live_raw(&route, RequestKind::LedgerList, &params)
                    .await
                    .map_err(classify)?;
                Ok(normalize_ledgers(raw))
            },
            Some(|| async {
                let payload = self.backup.data(company).await?;
                Ok(normalize_ledgers(RawResponse::Backup { payload }).mark_auto_fallback())
            }),
            DEFAULT_MAX_RETRIES,
        )
        .await;
        finish("ledgers", &route, result)
    }

    /// Fetch the voucher register for one company over an inclusive range.
    pub async fn get_vouchers(
        &self,
        company: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> FetchResult<Vec<Voucher>> {
        let route = select_route(Operation::Vouchers, &self.config, &self.server_base);
        let params = RequestParams::for_period(company, from, to);

        if matches!(route, Route::Backup { .. }) {
            let result = with_retry(
                || async {
                    let payload = self.backup.data(company).await.map_err(classify)?;
                    Ok(normalize_vouchers(RawResponse::Backup { payload }))
                },
                DEFAULT_MAX_RETRIES,
            )
            .await;
            return finish("vouchers", &route, result);
        }

        let result = with_retry_and_fallback(
            || async {
                let raw = self
                    .live_raw(&route, RequestKind::VoucherList, &params)
                    .await
                    .map_err(classify)?;
                Ok(normalize_vouchers(raw))
            },
            Some(|| async {
                let payload = self.backup.data(company).await?;
                Ok(normalize_vouchers(RawResponse::Backup { payload }).mark_auto_fallback())
            }),
            DEFAULT_MAX_RETRIES,
        )
        .await;
        finish("vouchers", &route, result)
    }

    /// Fetch a prebuilt dashboard payload from the server.
    ///
    /// The server aggregates a report (`sales`, `profit-loss`, …) per company
    /// from either the live connection or the snapshot; this wraps the call
    /// in the same retry-then-fallback pipeline as the record fetches.
    pub async fn get_dashboard(
        &self,
        kind: &str,
        company: &str,
        refresh: bool,
    ) -> FetchResult<serde_json::Value> {
        if self.config.connection_type() == ConnectionType::Backup {
            let result = with_retry(
                || async {
                    let payload = self
                        .fetch_dashboard(kind, company, "backup", refresh)
                        .await
                        .map_err(classify)?;
                    Ok(FetchResult::ok(payload, Source::Backup))
                },
                DEFAULT_MAX_RETRIES,
            )
            .await;
            return finish_dashboard(result, Source::Backup);
        }

        let result = with_retry_and_fallback(
            || async {
                let payload = self
                    .fetch_dashboard(kind, company, "live", refresh)
                    .await
                    .map_err(classify)?;
                Ok(FetchResult::ok(payload, Source::Live))
            },
            Some(|| async {
                let payload = self.fetch_dashboard(kind, company, "backup", refresh).await?;
                Ok(FetchResult::ok(payload, Source::Backup).mark_auto_fallback())
            }),
            DEFAULT_MAX_RETRIES,
        )
        .await;
        finish_dashboard(result, Source::Live)
    }

    /// Upload a backup file for server-side extraction.
    pub async fn upload_backup(&self, path: &Path) -> Result<UploadReceipt, GatewayError> {
        Ok(self.backup.upload(path).await?)
    }

    /// Delete the server-side snapshot.
    #[allow(dead_code)]
    pub async fn clear_backup(&self) -> Result<(), GatewayError> {
        Ok(self.backup.clear().await?)
    }

    /// List every relay registered with the server.
    pub async fn list_bridges(&self) -> Result<Vec<BridgeInfo>, GatewayError> {
        // The registry endpoint is token-free, so a gateway that has no
        // pairing token yet can still offer the list in settings.
        let listing = match &self.bridge {
            Some(bridge) => bridge.list_bridges().await?,
            None => {
                BridgeSource::new(self.server_base.clone(), String::new())
                    .list_bridges()
                    .await?
            }
        };
        Ok(listing)
    }

    /// Issue one live request along the selected route, returning the raw
    /// tagged response for the normalizer.
    async fn live_raw(
        &self,
        route: &Route,
        kind: RequestKind,
        params: &RequestParams,
    ) -> Result<RawResponse, SourceError> {
        match route {
            Route::Direct { .. } => Ok(RawResponse::Direct {
                body: self.direct.post_envelope(kind, params).await?,
            }),
            Route::Bridge { .. } => {
                let bridge = self.bridge.as_ref().ok_or_else(|| {
                    SourceError::Unavailable("bridge token not configured".to_string())
                })?;
                let payload = match kind {
                    // The relay answers the company list natively; everything
                    // else is forwarded to Tally as a raw envelope.
                    RequestKind::CompanyList | RequestKind::ConnectionTest => {
                        BridgePayload::Json(bridge.companies().await?)
                    }
                    _ => BridgePayload::Xml(
                        bridge
                            .relay(build_request(kind, params), kind.timeout())
                            .await?,
                    ),
                };
                Ok(RawResponse::Bridge { payload })
            }
            Route::Backup { .. } => Err(SourceError::Unavailable(
                "backup route has no live request".to_string(),
            )),
        }
    }

    async fn fetch_dashboard(
        &self,
        kind: &str,
        company: &str,
        source: &str,
        refresh: bool,
    ) -> Result<serde_json::Value, SourceError> {
        let mut url = reqwest::Url::parse(&format!("{}/dashboards/", self.server_base))
            .map_err(|e| SourceError::Unavailable(format!("invalid dashboard URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| SourceError::Unavailable("dashboard URL cannot take a path".to_string()))?
            .pop_if_empty()
            .push(kind)
            .push(company);
        url.query_pairs_mut()
            .append_pair("source", source)
            .append_pair("refresh", if refresh { "true" } else { "false" });

        let response = self.http_client.get(url).send().await?;
        Ok(check_response(response).await?.json().await?)
    }
}

fn route_source(route: &Route) -> Source {
    match route {
        Route::Direct { .. } => Source::Live,
        Route::Bridge { .. } => Source::Bridge,
        Route::Backup { .. } => Source::Backup,
    }
}

/// Collapse a fetch outcome into the renderable contract: errors become an
/// empty-default failure result instead of propagating to chart code.
fn finish<T: Default>(
    what: &str,
    route: &Route,
    result: Result<FetchResult<T>, SourceError>,
) -> FetchResult<T> {
    result.unwrap_or_else(|e| {
        error!("{} fetch failed on every source: {}", what, e);
        FetchResult::failure(e.to_string(), route_source(route))
    })
}

fn finish_dashboard(
    result: Result<FetchResult<serde_json::Value>, SourceError>,
    source: Source,
) -> FetchResult<serde_json::Value> {
    result.unwrap_or_else(|e| {
        error!("Dashboard fetch failed on every source: {}", e);
        FetchResult {
            success: false,
            // An empty object, not null: chart code indexes into this.
            data: serde_json::json!({}),
            source,
            error: Some(e.to_string()),
            auto_fallback: false,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn gateway_builds_bridge_client_only_with_a_token() {
        let gateway = TallyGateway::new(SessionConfig::default(), "https://server.example");
        assert!(gateway.bridge.is_none());

        let mut config = SessionConfig::default();
        config.set_connection_type(ConnectionType::Bridge);
        config.set_bridge_token(Some("tok".to_string()));
        let gateway = TallyGateway::new(config, "https://server.example/");
        assert!(gateway.bridge.is_some());
        assert_eq!(gateway.server_base, "https://server.example");
    }

    #[test]
    fn setting_a_bridge_token_builds_the_relay_client() {
        let mut gateway = TallyGateway::new(SessionConfig::default(), "https://server.example");
        gateway.set_bridge_token(Some("tok".to_string()));
        assert!(gateway.bridge.is_some());
        assert_eq!(gateway.config().bridge_token(), Some("tok"));

        gateway.set_bridge_token(None);
        assert!(gateway.bridge.is_none());
    }

    // The end-to-end shape from the module's contract: a relay that 500s on
    // every attempt, then a fallback that answers. The result must surface
    // the fallback's companies with no error escaping to the caller.
    #[tokio::test]
    async fn relay_failures_fall_through_to_the_fallback_source() {
        let attempts = AtomicUsize::new(0);

        let result: Result<FetchResult<Vec<Company>>, SourceError> = with_retry_and_fallback(
            || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(classify(SourceError::Status {
                    code: 500,
                    message: "relay exploded".to_string(),
                }))
            },
            Some(|| async {
                let payload = json!({"companies": [{"name": "X"}]});
                Ok(normalize_companies(RawResponse::Bridge {
                    payload: BridgePayload::Json(payload),
                })
                .mark_auto_fallback())
            }),
            3,
        )
        .await;

        let result = finish(
            "companies",
            &Route::Bridge {
                base: "https://server.example".to_string(),
                token: "tok".to_string(),
            },
            result,
        );

        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert!(result.success);
        assert!(result.auto_fallback);
        assert_eq!(result.data.len(), 1);
        assert_eq!(result.data[0].name, "X");
    }

    #[tokio::test]
    async fn exhausted_sources_degrade_to_an_empty_failure_result() {
        let result: Result<FetchResult<Vec<Ledger>>, SourceError> = with_retry(
            || async {
                Err(classify(SourceError::AuthenticationFailed(
                    "bad token".to_string(),
                )))
            },
            DEFAULT_MAX_RETRIES,
        )
        .await;

        let result = finish(
            "ledgers",
            &Route::Direct {
                base: "http://localhost:8765".to_string(),
            },
            result,
        );

        assert!(!result.success);
        assert!(result.data.is_empty());
        assert_eq!(result.source, Source::Live);
        let message = result.error.unwrap();
        assert!(message.contains("Authentication failed"), "{message}");
    }
}
