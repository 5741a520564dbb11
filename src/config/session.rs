//! Session configuration for the data access layer.

use serde::{Deserialize, Serialize};

/// Default address of the local proxy that brokers Tally gateway calls.
/// Reachable only from the machine the proxy runs on.
pub const DEFAULT_DIRECT_HOST: &str = "http://localhost";
pub const DEFAULT_DIRECT_PORT: u16 = 8765;

/// Which backend live data is fetched from.
///
/// Serialized in the uppercase form the dashboard has always persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConnectionType {
    /// Local proxy speaking Tally's XML protocol directly.
    #[default]
    Direct,
    /// Cloud-to-local relay keyed by a pairing token.
    Bridge,
    /// Previously uploaded server-side snapshot.
    Backup,
}

impl std::fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionType::Direct => write!(f, "direct"),
            ConnectionType::Bridge => write!(f, "bridge"),
            ConnectionType::Backup => write!(f, "backup"),
        }
    }
}

/// Connection settings persisted across dashboard sessions.
///
/// Exactly one config is active per gateway. Reads are cheap and happen on
/// every call; mutation goes through the explicit setters only, from the
/// single-threaded UI event loop.
///
/// The serde names are the storage keys the dashboard has persisted since the
/// first release, so an existing config file keeps working.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(rename = "tally_connection_type", default)]
    connection_type: ConnectionType,
    #[serde(rename = "serverUrl", default, skip_serializing_if = "Option::is_none")]
    server_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    port: Option<u16>,
    #[serde(rename = "tally_bridge_token", default, skip_serializing_if = "Option::is_none")]
    bridge_token: Option<String>,
    #[serde(rename = "tallyAuthToken", default, skip_serializing_if = "Option::is_none")]
    auth_token: Option<String>,
}

impl SessionConfig {
    pub fn connection_type(&self) -> ConnectionType {
        self.connection_type
    }

    pub fn set_connection_type(&mut self, connection_type: ConnectionType) {
        self.connection_type = connection_type;
    }

    /// Auth token sent as `X-Tally-Auth` when the proxy advertises
    /// `auth_required`.
    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    pub fn set_auth_token(&mut self, token: Option<String>) {
        self.auth_token = token;
    }

    pub fn is_bridge_mode(&self) -> bool {
        self.connection_type == ConnectionType::Bridge
    }

    pub fn bridge_token(&self) -> Option<&str> {
        self.bridge_token.as_deref()
    }

    pub fn set_bridge_token(&mut self, token: Option<String>) {
        self.bridge_token = token;
    }

    pub fn set_server_override(&mut self, url: Option<String>, port: Option<u16>) {
        self.server_url = url;
        self.port = port;
    }

    /// Base URL of the local proxy for Direct transport.
    ///
    /// Defaults to `http://localhost:8765`; both host and port can be
    /// overridden from settings.
    pub fn direct_base_url(&self) -> String {
        let host = self
            .server_url
            .as_deref()
            .unwrap_or(DEFAULT_DIRECT_HOST)
            .trim_end_matches('/');
        let port = self.port.unwrap_or(DEFAULT_DIRECT_PORT);
        format!("{host}:{port}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_direct_on_localhost() {
        let config = SessionConfig::default();
        assert_eq!(config.connection_type(), ConnectionType::Direct);
        assert!(!config.is_bridge_mode());
        assert_eq!(config.direct_base_url(), "http://localhost:8765");
    }

    #[test]
    fn server_override_changes_direct_base() {
        let mut config = SessionConfig::default();
        config.set_server_override(Some("http://192.168.1.20/".to_string()), Some(9000));
        assert_eq!(config.direct_base_url(), "http://192.168.1.20:9000");
    }

    #[test]
    fn persisted_keys_use_legacy_names() {
        let mut config = SessionConfig::default();
        config.set_connection_type(ConnectionType::Bridge);
        config.set_bridge_token(Some("abc123".to_string()));
        config.set_auth_token(Some("secret".to_string()));

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["tally_connection_type"], "BRIDGE");
        assert_eq!(json["tally_bridge_token"], "abc123");
        assert_eq!(json["tallyAuthToken"], "secret");
    }

    #[test]
    fn legacy_json_round_trips() {
        let json = serde_json::json!({
            "tally_connection_type": "BACKUP",
            "tallyAuthToken": "tok",
        });
        let config: SessionConfig = serde_json::from_value(json).unwrap();
        assert_eq!(config.connection_type(), ConnectionType::Backup);
        assert_eq!(config.auth_token(), Some("tok"));
        assert_eq!(config.bridge_token(), None);
    }
}
