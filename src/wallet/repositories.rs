use crate::wallet::WalletError;
use crate::wallet::types::BalanceRecord;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

/// Persisted registry state: ordered mint list plus the active entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintListState {
	pub mints: Vec<String>,
	pub active: Option<String>,
}

/// Repository for the persisted mint list
#[async_trait::async_trait]
pub trait MintListRepository: Send + Sync {
	async fn save(&self, state: &MintListState) -> Result<(), WalletError>;
	async fn load(&self) -> Result<Option<MintListState>, WalletError>;
}

/// Repository for persisted per-mint balance records
#[async_trait::async_trait]
pub trait BalanceRepository: Send + Sync {
	async fn save(&self, records: &[BalanceRecord]) -> Result<(), WalletError>;
	async fn load(&self) -> Result<Vec<BalanceRecord>, WalletError>;
}

/// Repository for the seed phrase in secure storage
#[async_trait::async_trait]
pub trait SeedRepository: Send + Sync {
	async fn save(&self, mnemonic: &str) -> Result<(), WalletError>;
	async fn load(&self) -> Result<Option<String>, WalletError>;
}

/// File-based implementation of MintListRepository
pub struct FileMintListRepository {
	data_dir: PathBuf,
}

impl FileMintListRepository {
	pub fn new(data_dir: PathBuf) -> Self {
		Self { data_dir }
	}

	fn filename(&self) -> PathBuf {
		self.data_dir.join("mints.json")
	}
}

#[async_trait::async_trait]
impl MintListRepository for FileMintListRepository {
	async fn save(&self, state: &MintListState) -> Result<(), WalletError> {
		let content = serde_json::to_string_pretty(state)
			.map_err(|e| WalletError::ParseError(format!("Failed to serialize mint list: {}", e)))?;
		tokio::fs::write(self.filename(), content)
			.await
			.map_err(|e| WalletError::Storage(format!("Failed to write mint list: {}", e)))?;
		info!("Saved {} mints to {:?}", state.mints.len(), self.filename());
		Ok(())
	}

	async fn load(&self) -> Result<Option<MintListState>, WalletError> {
		let filename = self.filename();
		if !filename.exists() {
			return Ok(None);
		}
		let content = tokio::fs::read_to_string(&filename)
			.await
			.map_err(|e| WalletError::Storage(format!("Failed to read mint list: {}", e)))?;
		let state = serde_json::from_str(&content)
			.map_err(|e| WalletError::ParseError(format!("Failed to parse mint list: {}", e)))?;
		Ok(Some(state))
	}
}

/// File-based implementation of BalanceRepository
pub struct FileBalanceRepository {
	data_dir: PathBuf,
}

impl FileBalanceRepository {
	pub fn new(data_dir: PathBuf) -> Self {
		Self { data_dir }
	}

	fn filename(&self) -> PathBuf {
		self.data_dir.join("balances.json")
	}
}

#[async_trait::async_trait]
impl BalanceRepository for FileBalanceRepository {
	async fn save(&self, records: &[BalanceRecord]) -> Result<(), WalletError> {
		let content = serde_json::to_string_pretty(records).map_err(|e| {
			WalletError::ParseError(format!("Failed to serialize balance records: {}", e))
		})?;
		tokio::fs::write(self.filename(), content)
			.await
			.map_err(|e| WalletError::Storage(format!("Failed to write balance records: {}", e)))?;
		Ok(())
	}

	async fn load(&self) -> Result<Vec<BalanceRecord>, WalletError> {
		let filename = self.filename();
		if !filename.exists() {
			return Ok(Vec::new());
		}
		let content = tokio::fs::read_to_string(&filename)
			.await
			.map_err(|e| WalletError::Storage(format!("Failed to read balance records: {}", e)))?;
		let records = serde_json::from_str(&content).map_err(|e| {
			WalletError::ParseError(format!("Failed to parse balance records: {}", e))
		})?;
		Ok(records)
	}
}

/// File-based implementation of SeedRepository.
///
/// The seed file is the engine's secure-storage entry; on unix it is written
/// with owner-only permissions.
pub struct FileSeedRepository {
	data_dir: PathBuf,
}

impl FileSeedRepository {
	pub fn new(data_dir: PathBuf) -> Self {
		Self { data_dir }
	}

	fn filename(&self) -> PathBuf {
		self.data_dir.join("seed.txt")
	}
}

#[async_trait::async_trait]
impl SeedRepository for FileSeedRepository {
	async fn save(&self, mnemonic: &str) -> Result<(), WalletError> {
		let filename = self.filename();
		tokio::fs::write(&filename, mnemonic)
			.await
			.map_err(|e| WalletError::Storage(format!("Failed to write seed: {}", e)))?;

		#[cfg(unix)]
		{
			use std::os::unix::fs::PermissionsExt;
			let perms = std::fs::Permissions::from_mode(0o600);
			if let Err(e) = tokio::fs::set_permissions(&filename, perms).await {
				warn!("Failed to restrict seed file permissions: {}", e);
			}
		}

		info!("Saved seed to {:?}", filename);
		Ok(())
	}

	async fn load(&self) -> Result<Option<String>, WalletError> {
		let filename = self.filename();
		if !filename.exists() {
			return Ok(None);
		}
		let content = tokio::fs::read_to_string(&filename)
			.await
			.map_err(|e| WalletError::Storage(format!("Failed to read seed: {}", e)))?;
		let trimmed = content.trim();
		if trimmed.is_empty() {
			return Ok(None);
		}
		Ok(Some(trimmed.to_string()))
	}
}
