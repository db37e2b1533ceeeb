//! Per-mint balance cache.
//!
//! The cache holds the last known balance for every mint and persists it
//! through a repository. Reads never fail; a mint with no record reads as
//! zero. `sync` bypasses the cache and asks the live wallet, updating the
//! cache only on success, so a failed sync can never destroy the previous
//! snapshot. Two concurrent syncs for the same mint may race; the last
//! writer wins.

use crate::capability::WalletHandle;
use crate::wallet::WalletError;
use crate::wallet::events::{EventDispatcher, WalletEvent};
use crate::wallet::repositories::BalanceRepository;
use crate::wallet::types::BalanceRecord;

use std::sync::{Arc, Mutex};
use tracing::{debug, info};

pub struct BalanceCache {
    records: Mutex<Vec<BalanceRecord>>,
    repo: Box<dyn BalanceRepository>,
    dispatcher: Arc<EventDispatcher>,
}

impl BalanceCache {
    /// Load the full persisted cache.
    pub async fn load(
        repo: Box<dyn BalanceRepository>,
        dispatcher: Arc<EventDispatcher>,
    ) -> Result<Self, WalletError> {
        let records = repo.load().await?;
        info!("Loaded {} cached balance records", records.len());
        Ok(Self {
            records: Mutex::new(records),
            repo,
            dispatcher,
        })
    }

    /// The cached amount for a mint; zero when no record exists. Never
    /// fails.
    pub fn get_cached(&self, mint_url: &str) -> u64 {
        self.records
            .lock()
            .expect("balance records poisoned")
            .iter()
            .find(|r| r.mint_url == mint_url)
            .map(|r| r.amount)
            .unwrap_or(0)
    }

    /// Snapshot of every cached record.
    pub fn records(&self) -> Vec<BalanceRecord> {
        self.records.lock().expect("balance records poisoned").clone()
    }

    /// Replace-or-append the record for a mint, persist the full set, then
    /// notify subscribers with the changed record.
    pub async fn update(&self, mint_url: &str, amount: u64) -> Result<(), WalletError> {
        let snapshot = {
            let mut records = self.records.lock().expect("balance records poisoned");
            match records.iter_mut().find(|r| r.mint_url == mint_url) {
                Some(record) => record.amount = amount,
                None => records.push(BalanceRecord {
                    mint_url: mint_url.to_string(),
                    amount,
                }),
            }
            records.clone()
        };
        self.repo.save(&snapshot).await?;

        self.dispatcher
            .dispatch(&WalletEvent::BalanceChanged {
                mint_url: mint_url.to_string(),
                amount,
            })
            .await;
        Ok(())
    }

    /// Query the live wallet balance and cache it. On failure the cache is
    /// left untouched and the error is returned; callers decide whether to
    /// ignore it.
    pub async fn sync(&self, mint_url: &str, wallet: &WalletHandle) -> Result<u64, WalletError> {
        debug!("Syncing balance for {}", mint_url);
        let amount = wallet
            .balance()
            .await
            .map_err(|e| WalletError::from_capability("balance query", e))?;
        self.update(mint_url, amount).await?;
        Ok(amount)
    }

    /// Drop every record, persisting the empty set. Used on seed recovery,
    /// after which all amounts must be re-derived.
    pub async fn clear(&self) -> Result<(), WalletError> {
        self.records.lock().expect("balance records poisoned").clear();
        self.repo.save(&[]).await?;
        info!("Cleared balance cache");
        Ok(())
    }
}
