//! Cache of native wallet handles, one per mint URL.
//!
//! Handles are constructed lazily through the capability connector and
//! reused for the lifetime of the process. Construction tries an ordered
//! list of store locations: the per-mint filesystem database first, the
//! in-memory fallback second. Only when every strategy fails is the error
//! surfaced, carrying all underlying messages.

use crate::capability::{CurrencyUnit, StoreLocation, WalletConnector, WalletHandle};
use crate::utils::wallet_db_path;
use crate::wallet::WalletError;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

pub struct WalletHandleCache {
    connector: Arc<dyn WalletConnector>,
    unit: CurrencyUnit,
    data_dir: PathBuf,
    handles: Mutex<HashMap<String, WalletHandle>>,
}

impl WalletHandleCache {
    pub fn new(connector: Arc<dyn WalletConnector>, unit: CurrencyUnit, data_dir: PathBuf) -> Self {
        Self {
            connector,
            unit,
            data_dir,
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Whether a wallet database already exists on disk for this mint.
    /// Drives the create-vs-recover decision on wallet creation.
    pub fn wallet_db_exists(&self, mint_url: &str) -> bool {
        wallet_db_path(&self.data_dir, mint_url).exists()
    }

    /// The ordered store locations tried for this mint.
    fn store_candidates(&self, mint_url: &str) -> Vec<StoreLocation> {
        vec![
            StoreLocation::Filesystem(wallet_db_path(&self.data_dir, mint_url)),
            StoreLocation::InMemory,
        ]
    }

    fn cached(&self, mint_url: &str) -> Option<WalletHandle> {
        self.handles
            .lock()
            .expect("handle cache poisoned")
            .get(mint_url)
            .cloned()
    }

    /// Insert unless another caller won the construction race; either way
    /// the returned handle is the single live one for this mint.
    fn insert_or_existing(&self, mint_url: &str, handle: WalletHandle) -> WalletHandle {
        let mut handles = self.handles.lock().expect("handle cache poisoned");
        handles.entry(mint_url.to_string()).or_insert(handle).clone()
    }

    /// The cached handle for `mint_url`, constructing one when absent.
    pub async fn get_or_create(
        &self,
        mint_url: &str,
        seed: &str,
    ) -> Result<WalletHandle, WalletError> {
        if let Some(handle) = self.cached(mint_url) {
            return Ok(handle);
        }
        let handle = self.construct(mint_url, seed, false).await?;
        Ok(self.insert_or_existing(mint_url, handle))
    }

    /// Construct a wallet through the restore path, replacing any cached
    /// handle. Used when an on-disk database or a recovered seed means
    /// existing funds must be picked up rather than shadowed.
    pub async fn restore(&self, mint_url: &str, seed: &str) -> Result<WalletHandle, WalletError> {
        let handle = self.construct(mint_url, seed, true).await?;
        self.handles
            .lock()
            .expect("handle cache poisoned")
            .insert(mint_url.to_string(), handle.clone());
        Ok(handle)
    }

    async fn construct(
        &self,
        mint_url: &str,
        seed: &str,
        restore: bool,
    ) -> Result<WalletHandle, WalletError> {
        let mut failures: Vec<String> = Vec::new();
        for store in self.store_candidates(mint_url) {
            let result = if restore {
                self.connector
                    .restore_wallet(mint_url, self.unit, &store, seed)
                    .await
            } else {
                self.connector
                    .create_wallet(mint_url, self.unit, &store, seed)
                    .await
            };
            match result {
                Ok(handle) => {
                    info!(
                        "Constructed wallet for {} using {}",
                        mint_url,
                        store.describe()
                    );
                    return Ok(handle);
                }
                Err(e) => {
                    warn!(
                        "Wallet construction for {} failed with {}: {}",
                        mint_url,
                        store.describe(),
                        e
                    );
                    failures.push(format!("{}: {}", store.describe(), e));
                }
            }
        }
        Err(WalletError::Storage(format!(
            "all store locations failed for {}: {}",
            mint_url,
            failures.join("; ")
        )))
    }

    /// Drop the cached handle for one mint. Used on mint removal.
    pub fn invalidate(&self, mint_url: &str) {
        self.handles
            .lock()
            .expect("handle cache poisoned")
            .remove(mint_url);
    }

    /// Drop every cached handle. Used on seed recovery, since every handle
    /// is bound to the superseded seed.
    pub fn invalidate_all(&self) {
        self.handles.lock().expect("handle cache poisoned").clear();
    }
}
