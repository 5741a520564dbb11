//! Transport selection policy.
//!
//! Pure decision logic: given the persisted connection preference and the
//! logical operation, pick the backend and target base URL. No I/O happens
//! here; whether the chosen backend actually answers is the gateway's problem.

use crate::config::{ConnectionType, SessionConfig};

/// Logical operations that need a transport decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Connectivity probe; only live backends are meaningful targets.
    Status,
    Companies,
    Ledgers,
    Vouchers,
}

impl Operation {
    fn is_live_only(&self) -> bool {
        matches!(self, Operation::Status)
    }
}

/// A selected transport and its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// POST XML to the local proxy.
    Direct { base: String },
    /// Relay through `/bridge/{token}/…` on the dashboard server.
    Bridge { base: String, token: String },
    /// Serve from the uploaded snapshot under `/backup/…`.
    Backup { base: String },
}

/// Pick the transport for one operation.
///
/// Bridge and Direct serve live data; Backup serves the uploaded snapshot and
/// is chosen for everything once the user has switched to it. Two degradation
/// rules keep selection total: bridge mode without a stored pairing token
/// falls back to Direct, and live-only operations never route to Backup.
pub fn select_route(operation: Operation, config: &SessionConfig, server_base: &str) -> Route {
    let server_base = server_base.trim_end_matches('/');

    match config.connection_type() {
        ConnectionType::Backup if !operation.is_live_only() => Route::Backup {
            base: server_base.to_string(),
        },
        ConnectionType::Bridge => match config.bridge_token() {
            Some(token) => Route::Bridge {
                base: server_base.to_string(),
                token: token.to_string(),
            },
            None => Route::Direct {
                base: config.direct_base_url(),
            },
        },
        _ => Route::Direct {
            base: config.direct_base_url(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERVER: &str = "https://dashboard.example.com/";

    #[test]
    fn direct_mode_targets_local_proxy() {
        let config = SessionConfig::default();
        let route = select_route(Operation::Companies, &config, SERVER);
        assert_eq!(
            route,
            Route::Direct {
                base: "http://localhost:8765".to_string()
            }
        );
    }

    #[test]
    fn bridge_mode_routes_through_token() {
        let mut config = SessionConfig::default();
        config.set_connection_type(ConnectionType::Bridge);
        config.set_bridge_token(Some("tok42".to_string()));

        let route = select_route(Operation::Ledgers, &config, SERVER);
        assert_eq!(
            route,
            Route::Bridge {
                base: "https://dashboard.example.com".to_string(),
                token: "tok42".to_string()
            }
        );
    }

    #[test]
    fn bridge_without_token_degrades_to_direct() {
        let mut config = SessionConfig::default();
        config.set_connection_type(ConnectionType::Bridge);

        let route = select_route(Operation::Companies, &config, SERVER);
        assert!(matches!(route, Route::Direct { .. }));
    }

    #[test]
    fn backup_mode_routes_data_to_snapshot() {
        let mut config = SessionConfig::default();
        config.set_connection_type(ConnectionType::Backup);

        let route = select_route(Operation::Vouchers, &config, SERVER);
        assert_eq!(
            route,
            Route::Backup {
                base: "https://dashboard.example.com".to_string()
            }
        );
    }

    #[test]
    fn status_probe_never_routes_to_backup() {
        let mut config = SessionConfig::default();
        config.set_connection_type(ConnectionType::Backup);

        let route = select_route(Operation::Status, &config, SERVER);
        assert!(matches!(route, Route::Direct { .. }));
    }
}
