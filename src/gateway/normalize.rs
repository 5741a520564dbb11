//! Reshaping heterogeneous backend payloads into the `FetchResult` contract.
//!
//! Each backend answers in its own shape: the proxy hands back Tally XML, the
//! bridge either relays that XML or serves convenience JSON, and the backup
//! endpoints serve a JSON superset with `ledgers`/`vouchers`/`stock_items` at
//! the root. The raw shapes are a tagged union matched exhaustively here, so
//! no dashboard ever sees a source-specific key name.

use crate::gateway::types::{FetchResult, Source};
use crate::protocol::{
    Company, Ledger, Voucher, parse_companies, parse_ledgers_with_warnings,
    parse_vouchers_with_warnings,
};
use itertools::Itertools;
use serde::de::DeserializeOwned;
use tracing::warn;

/// What a bridge endpoint handed back.
#[derive(Debug, Clone)]
pub enum BridgePayload {
    /// JSON from a convenience endpoint, e.g. `{"companies": […]}`.
    Json(serde_json::Value),
    /// Tally XML relayed verbatim through the `/tally` endpoint.
    Xml(String),
}

/// A raw backend response, tagged by origin.
#[derive(Debug, Clone)]
pub enum RawResponse {
    /// XML straight from the local proxy.
    Direct { body: String },
    /// Response from the relay.
    Bridge { payload: BridgePayload },
    /// JSON superset from the server-side snapshot.
    Backup { payload: serde_json::Value },
}

impl RawResponse {
    fn source(&self) -> Source {
        match self {
            RawResponse::Direct { .. } => Source::Live,
            RawResponse::Bridge { .. } => Source::Bridge,
            RawResponse::Backup { .. } => Source::Backup,
        }
    }
}

/// Normalize a company-list response from any backend.
pub fn normalize_companies(raw: RawResponse) -> FetchResult<Vec<Company>> {
    let source = raw.source();
    if let Some(failure) = snapshot_failure(&raw) {
        return failure;
    }
    let companies = match raw {
        RawResponse::Direct { body } => parse_companies(&body),
        RawResponse::Bridge { payload } => match payload {
            BridgePayload::Json(json) => records(&json, "companies"),
            BridgePayload::Xml(body) => parse_companies(&body),
        },
        RawResponse::Backup { payload } => records(&payload, "companies"),
    };
    FetchResult::ok(companies, source)
}

/// Normalize a ledger-list response from any backend.
pub fn normalize_ledgers(raw: RawResponse) -> FetchResult<Vec<Ledger>> {
    let source = raw.source();
    if let Some(failure) = snapshot_failure(&raw) {
        return failure;
    }
    let ledgers = match raw {
        RawResponse::Direct { body } => scanned_ledgers(&body),
        RawResponse::Bridge { payload } => match payload {
            BridgePayload::Json(json) => records(&json, "ledgers"),
            BridgePayload::Xml(body) => scanned_ledgers(&body),
        },
        RawResponse::Backup { payload } => records(&payload, "ledgers"),
    };
    FetchResult::ok(ledgers, source)
}

/// Normalize a voucher-register response from any backend.
///
/// Vouchers come back date-ordered regardless of origin; Tally's `YYYYMMDD`
/// strings order lexically.
pub fn normalize_vouchers(raw: RawResponse) -> FetchResult<Vec<Voucher>> {
    let source = raw.source();
    if let Some(failure) = snapshot_failure(&raw) {
        return failure;
    }
    let vouchers: Vec<Voucher> = match raw {
        RawResponse::Direct { body } => scanned_vouchers(&body),
        RawResponse::Bridge { payload } => match payload {
            BridgePayload::Json(json) => records(&json, "vouchers"),
            BridgePayload::Xml(body) => scanned_vouchers(&body),
        },
        RawResponse::Backup { payload } => records(&payload, "vouchers"),
    };
    let vouchers = vouchers
        .into_iter()
        .sorted_by(|a, b| a.date.cmp(&b.date))
        .collect();
    FetchResult::ok(vouchers, source)
}

/// A backup payload that reports its own failure becomes a failed result; the
/// other backends signal failure at the HTTP layer instead.
fn snapshot_failure<T: Default>(raw: &RawResponse) -> Option<FetchResult<T>> {
    let RawResponse::Backup { payload } = raw else {
        return None;
    };
    if payload.get("success").and_then(|s| s.as_bool()) == Some(false) {
        let message = payload
            .get("error")
            .and_then(|e| e.as_str())
            .unwrap_or("backup snapshot reported failure");
        return Some(FetchResult::failure(message, Source::Backup));
    }
    None
}

/// Deserialize a named record array from a JSON payload, skipping records
/// that do not fit rather than failing the batch.
fn records<T: DeserializeOwned>(payload: &serde_json::Value, key: &str) -> Vec<T> {
    payload
        .get(key)
        .and_then(|value| value.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

fn scanned_ledgers(body: &str) -> Vec<Ledger> {
    let (ledgers, warnings) = parse_ledgers_with_warnings(body);
    for warning in &warnings {
        warn!("Ledger parse degradation: {}", warning);
    }
    ledgers
}

fn scanned_vouchers(body: &str) -> Vec<Voucher> {
    let (vouchers, warnings) = parse_vouchers_with_warnings(body);
    for warning in &warnings {
        warn!("Voucher parse degradation: {}", warning);
    }
    vouchers
}
