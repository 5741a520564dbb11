//! The result contract and error types for the gateway layer.

use crate::config::ConfigError;
use crate::source::SourceError;
use serde::Serialize;

/// Which backend a result actually came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Direct local proxy.
    Live,
    /// Cloud-to-local relay.
    Bridge,
    /// Server-side snapshot.
    Backup,
}

/// The stable result shape every dashboard consumes.
///
/// Invariant: `success == false` implies `data` is the type's empty default,
/// never a null-equivalent, so chart code can map over it unconditionally.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchResult<T> {
    pub success: bool,
    pub data: T,
    pub source: Source,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// True when this payload only exists because the live fetch failed and
    /// the backup chain supplied it; the UI shows a "cached data" banner.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub auto_fallback: bool,
}

impl<T> FetchResult<T> {
    /// A successful result from the given source.
    pub fn ok(data: T, source: Source) -> Self {
        Self {
            success: true,
            data,
            source,
            error: None,
            auto_fallback: false,
        }
    }

    /// Mark this result as produced by the automatic fallback path.
    pub fn mark_auto_fallback(mut self) -> Self {
        self.auto_fallback = true;
        self
    }
}

impl<T: Default> FetchResult<T> {
    /// A failed result carrying the empty default so the UI never null-derefs.
    pub fn failure(error: impl Into<String>, source: Source) -> Self {
        Self {
            success: false,
            data: T::default(),
            source,
            error: Some(error.into()),
            auto_fallback: false,
        }
    }
}

/// Error types for gateway operations.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_carries_safe_empty_default() {
        let result: FetchResult<Vec<String>> = FetchResult::failure("backend down", Source::Live);
        assert!(!result.success);
        assert!(result.data.is_empty());
        assert_eq!(result.error.as_deref(), Some("backend down"));
    }

    #[test]
    fn serialized_shape_matches_dashboard_contract() {
        let result = FetchResult::ok(vec!["Acme".to_string()], Source::Backup).mark_auto_fallback();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["source"], "backup");
        assert_eq!(json["autoFallback"], true);
        assert!(json.get("error").is_none());
    }
}
