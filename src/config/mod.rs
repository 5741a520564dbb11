//! Session configuration module
//!
//! Holds the connection settings the dashboard persists across sessions: which
//! transport to use, the local proxy address override, and the auth and bridge
//! tokens. The config is an explicit struct owned by the gateway; all mutation
//! goes through setters and all persistence through the repository seam.

/// File-backed persistence for the session config
mod persistence;
/// The session config struct and connection-type policy
mod session;

pub use persistence::{ConfigError, ConfigRepository, FileConfigRepository};
pub use session::{ConnectionType, SessionConfig};

use rand::Rng;

/// Generate a fresh bridge pairing token as 16 random bytes, hex-encoded.
pub fn generate_bridge_token() -> String {
    let mut token = [0u8; 16];
    rand::rng().fill(&mut token);
    hex::encode(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bridge_tokens_are_hex_and_distinct() {
        let a = generate_bridge_token();
        let b = generate_bridge_token();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
