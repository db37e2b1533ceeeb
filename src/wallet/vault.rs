//! Seed custody for the wallet engine.
//!
//! The vault generates, persists and retrieves the single mnemonic phrase
//! all per-mint wallet handles derive from. At most one seed is stored at a
//! time; storing a new one supersedes the previous, which only the recovery
//! flow does.

use crate::capability::WalletConnector;
use crate::wallet::WalletError;
use crate::wallet::repositories::SeedRepository;

use std::sync::Arc;
use tracing::warn;

pub struct SecretVault {
    connector: Arc<dyn WalletConnector>,
    repo: Box<dyn SeedRepository>,
}

impl SecretVault {
    pub fn new(connector: Arc<dyn WalletConnector>, repo: Box<dyn SeedRepository>) -> Self {
        Self { connector, repo }
    }

    /// Produce a fresh seed phrase. Pure; nothing is persisted.
    pub fn generate_seed(&self) -> Result<String, WalletError> {
        self.connector
            .generate_mnemonic()
            .map_err(|e| WalletError::from_capability("generate mnemonic", e))
    }

    /// Persist the seed to secure storage. Returns false on failure; the
    /// caller decides whether that is fatal.
    pub async fn store_seed(&self, mnemonic: &str) -> bool {
        match self.repo.save(mnemonic).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to store seed: {}", e);
                false
            }
        }
    }

    /// The stored seed, if any. Absence is not an error; unreadable storage
    /// is logged and treated as absent.
    pub async fn retrieve_seed(&self) -> Option<String> {
        match self.repo.load().await {
            Ok(seed) => seed,
            Err(e) => {
                warn!("Failed to read stored seed: {}", e);
                None
            }
        }
    }

    /// The stored seed, or a freshly generated and persisted one. Used on
    /// first wallet creation; a persistence failure here is fatal because
    /// funds minted against an unsaved seed would be unrecoverable.
    pub async fn ensure_seed(&self) -> Result<String, WalletError> {
        if let Some(seed) = self.retrieve_seed().await {
            return Ok(seed);
        }
        let seed = self.generate_seed()?;
        if !self.store_seed(&seed).await {
            return Err(WalletError::Storage(
                "could not persist newly generated seed".to_string(),
            ));
        }
        Ok(seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::memory::{MemoryBackend, MemoryBackendConfig};
    use crate::wallet::repositories::FileSeedRepository;

    fn vault(dir: &std::path::Path) -> SecretVault {
        SecretVault::new(
            Arc::new(MemoryBackend::new(MemoryBackendConfig::default())),
            Box::new(FileSeedRepository::new(dir.to_path_buf())),
        )
    }

    #[tokio::test]
    async fn absent_seed_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(vault(dir.path()).retrieve_seed().await, None);
    }

    #[tokio::test]
    async fn ensure_seed_is_stable_across_calls() {
        let dir = tempfile::tempdir().unwrap();
        let vault = vault(dir.path());

        let first = vault.ensure_seed().await.unwrap();
        let second = vault.ensure_seed().await.unwrap();
        assert_eq!(first, second);
        assert!(first.split_whitespace().count() >= 12);
    }

    #[tokio::test]
    async fn storing_supersedes_previous_seed() {
        let dir = tempfile::tempdir().unwrap();
        let vault = vault(dir.path());

        assert!(vault.store_seed("first phrase").await);
        assert!(vault.store_seed("second phrase").await);
        assert_eq!(vault.retrieve_seed().await, Some("second phrase".to_string()));
    }

    #[tokio::test]
    async fn store_failure_reports_false() {
        // Point the repository at a path that cannot be a directory.
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();
        let vault = SecretVault::new(
            Arc::new(MemoryBackend::new(MemoryBackendConfig::default())),
            Box::new(FileSeedRepository::new(blocker.join("nested"))),
        );

        assert!(!vault.store_seed("phrase").await);
    }
}
