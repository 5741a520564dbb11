//! File-backed persistence for the session configuration.
//!
//! The repository trait abstracts where the config lives so the gateway can be
//! tested without touching disk. The file implementation stores pretty JSON
//! with a `savedAt` timestamp; a missing file yields defaults (lazy first-use
//! initialization) and a corrupt file degrades to defaults with a warning
//! rather than wedging the dashboard at startup.

use crate::config::SessionConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

/// Errors from config persistence.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Repository for session config persistence
#[async_trait::async_trait]
pub trait ConfigRepository: Send + Sync {
    async fn save(&self, config: &SessionConfig) -> Result<(), ConfigError>;
    async fn load(&self) -> Result<SessionConfig, ConfigError>;
}

#[derive(Serialize, Deserialize)]
struct PersistedConfig {
    #[serde(flatten)]
    config: SessionConfig,
    #[serde(rename = "savedAt")]
    saved_at: String,
}

/// File-based implementation of ConfigRepository
pub struct FileConfigRepository {
    path: PathBuf,
}

impl FileConfigRepository {
    /// Store the config as `tally_session.json` under the given directory.
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            path: data_dir.join("tally_session.json"),
        }
    }
}

#[async_trait::async_trait]
impl ConfigRepository for FileConfigRepository {
    async fn save(&self, config: &SessionConfig) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let persisted = PersistedConfig {
            config: config.clone(),
            saved_at: chrono::Utc::now().to_rfc3339(),
        };
        let content = serde_json::to_string_pretty(&persisted)?;
        tokio::fs::write(&self.path, content).await?;

        info!("Saved session config to {:?}", self.path);
        Ok(())
    }

    async fn load(&self) -> Result<SessionConfig, ConfigError> {
        if !self.path.exists() {
            return Ok(SessionConfig::default());
        }

        let content = tokio::fs::read_to_string(&self.path).await?;
        match serde_json::from_str::<PersistedConfig>(&content) {
            Ok(persisted) => {
                info!("Loaded session config from {:?}", self.path);
                Ok(persisted.config)
            }
            Err(e) => {
                warn!(
                    "Corrupt session config at {:?} ({}), falling back to defaults",
                    self.path, e
                );
                Ok(SessionConfig::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionType;

    fn scratch_dir(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!("tally-config-{}-{}", label, std::process::id()))
    }

    #[tokio::test]
    async fn round_trips_through_disk() {
        let repo = FileConfigRepository::new(scratch_dir("roundtrip"));

        let mut config = SessionConfig::default();
        config.set_connection_type(ConnectionType::Bridge);
        config.set_bridge_token(Some("deadbeef".to_string()));
        repo.save(&config).await.unwrap();

        let loaded = repo.load().await.unwrap();
        assert_eq!(loaded, config);
    }

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let repo = FileConfigRepository::new(scratch_dir("missing").join("never-created"));
        let loaded = repo.load().await.unwrap();
        assert_eq!(loaded, SessionConfig::default());
    }

    #[tokio::test]
    async fn corrupt_file_degrades_to_defaults() {
        let dir = scratch_dir("corrupt");
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("tally_session.json"), "{not json")
            .await
            .unwrap();

        let repo = FileConfigRepository::new(dir);
        let loaded = repo.load().await.unwrap();
        assert_eq!(loaded, SessionConfig::default());
    }
}
