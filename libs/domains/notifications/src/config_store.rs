//! Read-through access to the active transport configuration.

use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use validator::Validate;

use crate::models::TransportConfig;
use crate::repository::ConfigRepository;

/// Loads and saves [`TransportConfig`] snapshots.
///
/// `load` never fails: a missing snapshot or a storage error both yield the
/// built-in defaults.
#[derive(Clone)]
pub struct ConfigStore {
    repository: Arc<dyn ConfigRepository>,
}

impl ConfigStore {
    pub fn new(repository: Arc<dyn ConfigRepository>) -> Self {
        Self { repository }
    }

    pub async fn load(&self) -> TransportConfig {
        match self.repository.latest().await {
            Ok(Some(config)) => config,
            Ok(None) => {
                info!("No transport configuration stored, using defaults");
                TransportConfig::default()
            }
            Err(e) => {
                error!(error = %e, "Failed to load transport configuration, using defaults");
                TransportConfig::default()
            }
        }
    }

    /// Validate and append a snapshot. False on rejection or storage failure.
    #[instrument(skip_all, fields(server = %config.server, port = config.port))]
    pub async fn save(&self, config: TransportConfig) -> bool {
        if let Err(e) = config.validate() {
            warn!(error = %e, "Rejected transport configuration");
            return false;
        }

        match self.repository.insert(config).await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Failed to store transport configuration");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotificationError;
    use crate::memory::InMemoryConfigRepository;
    use crate::repository::MockConfigRepository;

    #[tokio::test]
    async fn test_load_defaults_when_empty() {
        let store = ConfigStore::new(Arc::new(InMemoryConfigRepository::new()));
        assert_eq!(store.load().await, TransportConfig::default());
    }

    #[tokio::test]
    async fn test_load_defaults_on_storage_error() {
        let mut repo = MockConfigRepository::new();
        repo.expect_latest()
            .returning(|| Err(NotificationError::Database("connection reset".into())));

        let store = ConfigStore::new(Arc::new(repo));
        assert_eq!(store.load().await, TransportConfig::default());
    }

    #[tokio::test]
    async fn test_latest_snapshot_wins() {
        let store = ConfigStore::new(Arc::new(InMemoryConfigRepository::new()));

        assert!(
            store
                .save(TransportConfig {
                    server: "smtp.first.local".into(),
                    ..TransportConfig::default()
                })
                .await
        );
        assert!(
            store
                .save(TransportConfig {
                    server: "smtp.second.local".into(),
                    max_retries: 5,
                    ..TransportConfig::default()
                })
                .await
        );

        let loaded = store.load().await;
        assert_eq!(loaded.server, "smtp.second.local");
        assert_eq!(loaded.max_retries, 5);
    }

    #[tokio::test]
    async fn test_save_rejects_invalid() {
        let repo = Arc::new(InMemoryConfigRepository::new());
        let store = ConfigStore::new(repo.clone());

        let saved = store
            .save(TransportConfig {
                timeout_seconds: 0,
                ..TransportConfig::default()
            })
            .await;

        assert!(!saved);
        assert_eq!(repo.snapshot_count().await, 0);
    }

    #[tokio::test]
    async fn test_save_reports_storage_failure() {
        let mut repo = MockConfigRepository::new();
        repo.expect_insert()
            .returning(|_| Err(NotificationError::Database("read-only".into())));

        let store = ConfigStore::new(Arc::new(repo));
        assert!(!store.save(TransportConfig::default()).await);
    }
}
