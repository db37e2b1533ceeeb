//! Engine facade tying the components together.
//!
//! The orchestrator owns the vault, the mint registry, the handle cache,
//! the balance cache and the send/receive flows, and is the only type the
//! embedding application talks to. Wallet-affecting commands issued while
//! no mint is active are not errors: they are parked, a
//! `MintSelectionRequired` event is emitted, and the parked commands replay
//! automatically once a mint becomes active.

use crate::capability::{CurrencyUnit, WalletConnector, WalletHandle};
use crate::wallet::WalletError;
use crate::wallet::balance::BalanceCache;
use crate::wallet::events::{EventDispatcher, WalletEvent, WalletEventHandler};
use crate::wallet::handles::WalletHandleCache;
use crate::wallet::receive::{PaymentQuotePoller, PollerConfig, ReceiveSession};
use crate::wallet::registry::MintRegistry;
use crate::wallet::repositories::{
    FileBalanceRepository, FileMintListRepository, FileSeedRepository,
};
use crate::wallet::send::{PaymentExecutor, SendConfirmation, SendOutcome};
use crate::wallet::types::BalanceRecord;
use crate::wallet::vault::SecretVault;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Engine construction parameters.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory holding every persisted engine file.
    pub data_dir: PathBuf,
    pub unit: CurrencyUnit,
    pub poller: PollerConfig,
}

impl EngineConfig {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            unit: CurrencyUnit::Sat,
            poller: PollerConfig::default(),
        }
    }
}

/// Outcome of a command that may have been parked for later.
#[derive(Debug)]
pub enum Dispatch<T> {
    /// The command ran to completion.
    Completed(T),
    /// No mint is active; the command was parked and will replay once one
    /// becomes active.
    Deferred,
}

impl<T> Dispatch<T> {
    pub fn is_deferred(&self) -> bool {
        matches!(self, Dispatch::Deferred)
    }

    pub fn completed(self) -> Option<T> {
        match self {
            Dispatch::Completed(value) => Some(value),
            Dispatch::Deferred => None,
        }
    }
}

/// A command parked until a mint becomes active.
#[derive(Debug, Clone)]
enum PendingCommand {
    CreateWallet,
    Receive { amount: u64, memo: Option<String> },
    Send { invoice: String },
    RefreshBalance,
}

pub struct WalletOrchestrator {
    vault: SecretVault,
    registry: tokio::sync::Mutex<MintRegistry>,
    handles: WalletHandleCache,
    balance: Arc<BalanceCache>,
    poller: PaymentQuotePoller,
    executor: PaymentExecutor,
    dispatcher: Arc<EventDispatcher>,
    confirm: Arc<dyn SendConfirmation>,
    pending: Mutex<Vec<PendingCommand>>,
    sessions: Mutex<Vec<Arc<ReceiveSession>>>,
}

impl WalletOrchestrator {
    /// Construct the engine, creating the data directory and loading every
    /// persisted component.
    pub async fn init(
        config: EngineConfig,
        connector: Arc<dyn WalletConnector>,
        confirm: Arc<dyn SendConfirmation>,
    ) -> Result<Self, WalletError> {
        tokio::fs::create_dir_all(&config.data_dir).await?;

        let dispatcher = Arc::new(EventDispatcher::new());
        let registry = MintRegistry::load(Box::new(FileMintListRepository::new(
            config.data_dir.clone(),
        )))
        .await?;
        let balance = Arc::new(
            BalanceCache::load(
                Box::new(FileBalanceRepository::new(config.data_dir.clone())),
                Arc::clone(&dispatcher),
            )
            .await?,
        );
        let vault = SecretVault::new(
            Arc::clone(&connector),
            Box::new(FileSeedRepository::new(config.data_dir.clone())),
        );
        let handles = WalletHandleCache::new(connector, config.unit, config.data_dir.clone());
        let poller = PaymentQuotePoller::new(
            Arc::clone(&balance),
            Arc::clone(&dispatcher),
            config.poller.clone(),
        );
        let executor = PaymentExecutor::new(Arc::clone(&balance), Arc::clone(&dispatcher));

        info!(
            "Wallet engine initialized with {} known mints in {:?}",
            registry.list().len(),
            config.data_dir
        );
        Ok(Self {
            vault,
            registry: tokio::sync::Mutex::new(registry),
            handles,
            balance,
            poller,
            executor,
            dispatcher,
            confirm,
            pending: Mutex::new(Vec::new()),
            sessions: Mutex::new(Vec::new()),
        })
    }

    /// Register an event handler for engine notifications.
    pub async fn subscribe(&self, handler: Box<dyn WalletEventHandler>) {
        self.dispatcher.register_handler(handler).await;
    }

    /// Add a mint. When this makes the mint active, parked commands replay.
    pub async fn add_mint(&self, url: &str) -> Result<String, WalletError> {
        let (url, became_active) = {
            let mut registry = self.registry.lock().await;
            let url = registry.add(url).await?;
            let became_active = registry.active() == Some(url.as_str());
            (url, became_active)
        };
        if became_active {
            self.resume_pending().await;
        }
        Ok(url)
    }

    /// Switch the active mint. Returns false when the URL is not registered.
    pub async fn set_active_mint(&self, url: &str) -> Result<bool, WalletError> {
        let switched = self.registry.lock().await.set_active(url).await?;
        if switched {
            self.resume_pending().await;
        }
        Ok(switched)
    }

    /// Remove a non-active mint and drop its cached wallet handle.
    pub async fn remove_mint(&self, url: &str) -> Result<(), WalletError> {
        self.registry.lock().await.remove(url).await?;
        self.handles.invalidate(&crate::utils::normalize_mint_url(url));
        Ok(())
    }

    pub async fn list_mints(&self) -> Vec<String> {
        self.registry.lock().await.list()
    }

    pub async fn active_mint(&self) -> Option<String> {
        self.registry.lock().await.active().map(String::from)
    }

    /// The cached balance for one mint. Never fails; unknown mints read as
    /// zero.
    pub fn cached_balance(&self, mint_url: &str) -> u64 {
        self.balance.get_cached(mint_url)
    }

    pub fn balances(&self) -> Vec<BalanceRecord> {
        self.balance.records()
    }

    /// Ensure a wallet exists for the active mint. Picks the restore path
    /// when a wallet database is already on disk, so existing funds are
    /// recovered rather than shadowed by a fresh wallet.
    pub async fn create_wallet(&self) -> Result<Dispatch<()>, WalletError> {
        let Some(active) = self.active_mint().await else {
            self.park(PendingCommand::CreateWallet).await;
            return Ok(Dispatch::Deferred);
        };
        let seed = self.vault.ensure_seed().await?;
        let wallet = if self.handles.wallet_db_exists(&active) {
            self.handles.restore(&active, &seed).await?
        } else {
            self.handles.get_or_create(&active, &seed).await?
        };
        if let Err(e) = self.balance.sync(&active, &wallet).await {
            warn!("Initial balance sync for {} failed: {}", active, e);
        }
        Ok(Dispatch::Completed(()))
    }

    /// Replace the stored seed with a recovered mnemonic, then rebuild every
    /// registered wallet from it. Cached balances are cleared first; each
    /// restored wallet repopulates its own entry.
    pub async fn recover_wallet(&self, mnemonic: &str) -> Result<(), WalletError> {
        let mnemonic = mnemonic.trim();
        bip39::Mnemonic::parse(mnemonic)
            .map_err(|e| WalletError::Validation(format!("invalid mnemonic: {}", e)))?;

        if !self.vault.store_seed(mnemonic).await {
            return Err(WalletError::Storage(
                "could not persist recovered seed".to_string(),
            ));
        }
        self.handles.invalidate_all();
        self.balance.clear().await?;

        let mints = self.list_mints().await;
        for mint_url in mints {
            match self.handles.restore(&mint_url, mnemonic).await {
                Ok(wallet) => {
                    if let Err(e) = self.balance.sync(&mint_url, &wallet).await {
                        warn!("Post-recovery balance sync for {} failed: {}", mint_url, e);
                    }
                }
                Err(e) => {
                    warn!("Could not restore wallet for {}: {}", mint_url, e);
                }
            }
        }
        info!("Wallet recovered from mnemonic");
        Ok(())
    }

    /// Start receiving `amount` sats on the active mint. The returned
    /// session carries the invoice to present and polls the quote until it
    /// is redeemed.
    pub async fn receive(
        &self,
        amount: u64,
        memo: Option<String>,
    ) -> Result<Dispatch<Arc<ReceiveSession>>, WalletError> {
        let Some(wallet) = self.active_wallet().await? else {
            self.park(PendingCommand::Receive { amount, memo }).await;
            return Ok(Dispatch::Deferred);
        };

        let quote = self.poller.create_quote(&wallet, amount, memo).await?;
        self.dispatcher
            .dispatch(&WalletEvent::QuoteCreated {
                quote: quote.clone(),
            })
            .await;
        let session = self.poller.start_polling(wallet, quote);
        {
            // Finished sessions are dropped here so the list only holds
            // quotes still being polled.
            let mut sessions = self.sessions.lock().expect("session list poisoned");
            sessions.retain(|s| !s.state().is_terminal());
            sessions.push(Arc::clone(&session));
        }
        Ok(Dispatch::Completed(session))
    }

    /// Pay a lightning invoice from the active mint. The confirmation hook
    /// runs before any funds move.
    pub async fn send(&self, invoice: &str) -> Result<Dispatch<SendOutcome>, WalletError> {
        let Some(wallet) = self.active_wallet().await? else {
            self.park(PendingCommand::Send {
                invoice: invoice.to_string(),
            })
            .await;
            return Ok(Dispatch::Deferred);
        };

        let outcome = self
            .executor
            .send(&wallet, invoice, self.confirm.as_ref())
            .await?;
        Ok(Dispatch::Completed(outcome))
    }

    /// Re-query the live balance for one mint, or for the active mint when
    /// none is named.
    pub async fn refresh_balance(
        &self,
        mint_url: Option<&str>,
    ) -> Result<Dispatch<u64>, WalletError> {
        let target = match mint_url {
            Some(url) => crate::utils::normalize_mint_url(url),
            None => match self.active_mint().await {
                Some(url) => url,
                None => {
                    self.park(PendingCommand::RefreshBalance).await;
                    return Ok(Dispatch::Deferred);
                }
            },
        };
        let seed = self.vault.ensure_seed().await?;
        let wallet = self.handles.get_or_create(&target, &seed).await?;
        let amount = self.balance.sync(&target, &wallet).await?;
        Ok(Dispatch::Completed(amount))
    }

    /// Stop every polling session. Parked commands and persisted state are
    /// left in place.
    pub fn shutdown(&self) {
        let sessions = self.sessions.lock().expect("session list poisoned");
        for session in sessions.iter() {
            session.stop();
        }
        info!("Stopped {} receive sessions", sessions.len());
    }

    /// The wallet handle for the active mint, or None when no mint is
    /// active.
    async fn active_wallet(&self) -> Result<Option<WalletHandle>, WalletError> {
        let Some(active) = self.active_mint().await else {
            return Ok(None);
        };
        let seed = self.vault.ensure_seed().await?;
        let wallet = self.handles.get_or_create(&active, &seed).await?;
        Ok(Some(wallet))
    }

    async fn park(&self, command: PendingCommand) {
        info!("No active mint; parking command {:?}", command);
        self.pending
            .lock()
            .expect("pending list poisoned")
            .push(command);
        self.dispatcher
            .dispatch(&WalletEvent::MintSelectionRequired)
            .await;
    }

    /// Replay parked commands in the order they were issued. Replay errors
    /// are logged, not propagated; the original caller is long gone.
    async fn resume_pending(&self) {
        let parked: Vec<PendingCommand> = self
            .pending
            .lock()
            .expect("pending list poisoned")
            .drain(..)
            .collect();
        for command in parked {
            info!("Resuming parked command {:?}", command);
            let result = match command {
                PendingCommand::CreateWallet => self.create_wallet().await.map(|_| ()),
                PendingCommand::Receive { amount, memo } => {
                    self.receive(amount, memo).await.map(|_| ())
                }
                PendingCommand::Send { invoice } => self.send(&invoice).await.map(|_| ()),
                PendingCommand::RefreshBalance => self.refresh_balance(None).await.map(|_| ()),
            };
            if let Err(e) = result {
                warn!("Parked command failed on resume: {}", e);
            }
        }
    }
}
