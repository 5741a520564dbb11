//! Data gateway module
//!
//! This module is the policy layer the dashboards talk to. It wires route
//! selection, the transport clients, bounded retries with live-to-backup
//! fallback, and response normalization into one stable `FetchResult`
//! contract, so twenty chart views consume identical shapes no matter which
//! backend actually answered.

/// The orchestrating client the dashboards call
mod client;
/// Reshaping heterogeneous backend payloads into one contract
mod normalize;
/// Bounded retry with constant delay and a one-shot fallback
mod retry;
/// The result contract and gateway error type
mod types;

pub use client::TallyGateway;
pub use normalize::{
    BridgePayload, RawResponse, normalize_companies, normalize_ledgers, normalize_vouchers,
};
pub use retry::{DEFAULT_MAX_RETRIES, classify, with_retry, with_retry_and_fallback};
pub use types::{FetchResult, GatewayError, Source};
