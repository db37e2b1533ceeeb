//!
//! In-process mint simulation.
//!
//! `MemoryBackend` implements the capability traits against a purely local
//! model of a mint: quotes flip to `Paid` after a configurable number of
//! state checks, `mint` issues the quoted amount exactly once, `melt` debits
//! the simulated balance. The demo binary runs against it, and the test
//! suite uses it wherever a full receive/send round is exercised.

use super::types::*;
use super::{MintWallet, WalletConnector, WalletHandle};
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Behavior knobs for the simulated mint.
#[derive(Debug, Clone)]
pub struct MemoryBackendConfig {
    /// A mint quote reports `Paid` after this many state checks. Zero means
    /// the first check already sees it paid.
    pub pay_after_checks: u32,
}

impl Default for MemoryBackendConfig {
    fn default() -> Self {
        Self { pay_after_checks: 1 }
    }
}

#[derive(Debug)]
struct SimMintQuote {
    amount: u64,
    state: QuoteState,
    checks: u32,
}

#[derive(Debug)]
struct SimMeltQuote {
    amount: u64,
    fee_reserve: u64,
}

/// Shared state of one simulated mint, reused across handles for the same
/// URL so recreated handles observe the same balance.
#[derive(Debug, Default)]
struct SimulatedMint {
    balance: Mutex<u64>,
    mint_quotes: Mutex<HashMap<String, SimMintQuote>>,
    melt_quotes: Mutex<HashMap<String, SimMeltQuote>>,
}

/// In-process implementation of the wallet capability.
pub struct MemoryBackend {
    config: MemoryBackendConfig,
    mints: Mutex<HashMap<String, Arc<SimulatedMint>>>,
}

impl MemoryBackend {
    pub fn new(config: MemoryBackendConfig) -> Self {
        Self {
            config,
            mints: Mutex::new(HashMap::new()),
        }
    }

    fn mint_state(&self, mint_url: &str) -> Arc<SimulatedMint> {
        let mut mints = self.mints.lock().expect("mint map poisoned");
        mints.entry(mint_url.to_string()).or_default().clone()
    }

    /// Force a quote into the `Paid` state, regardless of check counts.
    /// Test and demo control surface; a real mint flips this when the
    /// invoice settles.
    pub fn mark_quote_paid(&self, mint_url: &str, quote_id: &str) {
        let mint = self.mint_state(mint_url);
        let mut quotes = mint.mint_quotes.lock().expect("quote map poisoned");
        if let Some(quote) = quotes.get_mut(quote_id) {
            if quote.state == QuoteState::Unpaid {
                quote.state = QuoteState::Paid;
            }
        }
    }

    async fn prepare_store(&self, store: &StoreLocation) -> Result<(), CapabilityError> {
        if let StoreLocation::Filesystem(path) = store {
            tokio::fs::create_dir_all(path)
                .await
                .map_err(|e| CapabilityError::Store(format!("{}: {}", path.display(), e)))?;
            tokio::fs::write(path.join("wallet.db"), b"")
                .await
                .map_err(|e| CapabilityError::Store(format!("{}: {}", path.display(), e)))?;
        }
        Ok(())
    }
}

fn random_id() -> String {
    let mut bytes = [0u8; 8];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}

#[async_trait::async_trait]
impl WalletConnector for MemoryBackend {
    async fn create_wallet(
        &self,
        mint_url: &str,
        _unit: CurrencyUnit,
        store: &StoreLocation,
        _seed: &str,
    ) -> Result<WalletHandle, CapabilityError> {
        self.prepare_store(store).await?;
        debug!("created simulated wallet for {} ({})", mint_url, store.describe());
        Ok(Arc::new(MemoryWallet {
            mint_url: mint_url.to_string(),
            mint: self.mint_state(mint_url),
            pay_after_checks: self.config.pay_after_checks,
        }))
    }

    async fn restore_wallet(
        &self,
        mint_url: &str,
        unit: CurrencyUnit,
        store: &StoreLocation,
        seed: &str,
    ) -> Result<WalletHandle, CapabilityError> {
        // Restoration reattaches to the simulated mint state; any balance
        // accumulated there is recovered.
        self.create_wallet(mint_url, unit, store, seed).await
    }

    fn generate_mnemonic(&self) -> Result<String, CapabilityError> {
        let mut entropy = [0u8; 16];
        rand::rng().fill(&mut entropy);
        let mnemonic = bip39::Mnemonic::from_entropy(&entropy)
            .map_err(|e| CapabilityError::Internal(format!("mnemonic generation: {}", e)))?;
        Ok(mnemonic.to_string())
    }
}

/// One handle onto a simulated mint.
struct MemoryWallet {
    mint_url: String,
    mint: Arc<SimulatedMint>,
    pay_after_checks: u32,
}

#[async_trait::async_trait]
impl MintWallet for MemoryWallet {
    fn mint_url(&self) -> &str {
        &self.mint_url
    }

    async fn balance(&self) -> Result<u64, CapabilityError> {
        Ok(*self.mint.balance.lock().expect("balance poisoned"))
    }

    async fn mint_quote(
        &self,
        amount: u64,
        _memo: Option<String>,
    ) -> Result<MintQuoteResponse, CapabilityError> {
        let id = random_id();
        let invoice = format!("lnbc{}n1sim{}", amount, id);
        self.mint
            .mint_quotes
            .lock()
            .expect("quote map poisoned")
            .insert(
                id.clone(),
                SimMintQuote {
                    amount,
                    state: QuoteState::Unpaid,
                    checks: 0,
                },
            );
        Ok(MintQuoteResponse { id, invoice, amount })
    }

    async fn mint_quote_state(&self, quote_id: &str) -> Result<QuoteState, CapabilityError> {
        let mut quotes = self.mint.mint_quotes.lock().expect("quote map poisoned");
        let quote = quotes
            .get_mut(quote_id)
            .ok_or_else(|| CapabilityError::QuoteNotFound(quote_id.to_string()))?;
        quote.checks += 1;
        if quote.state == QuoteState::Unpaid && quote.checks > self.pay_after_checks {
            quote.state = QuoteState::Paid;
        }
        Ok(quote.state)
    }

    async fn mint(&self, quote_id: &str, _split: SplitPolicy) -> Result<u64, CapabilityError> {
        let amount = {
            let mut quotes = self.mint.mint_quotes.lock().expect("quote map poisoned");
            let quote = quotes
                .get_mut(quote_id)
                .ok_or_else(|| CapabilityError::QuoteNotFound(quote_id.to_string()))?;
            match quote.state {
                QuoteState::Paid => {
                    quote.state = QuoteState::Issued;
                    quote.amount
                }
                QuoteState::Issued => {
                    return Err(CapabilityError::QuoteNotPayable {
                        quote_id: quote_id.to_string(),
                        reason: "tokens already issued".to_string(),
                    });
                }
                QuoteState::Unpaid | QuoteState::Cancelled => {
                    return Err(CapabilityError::QuoteNotPayable {
                        quote_id: quote_id.to_string(),
                        reason: format!("quote state is {:?}", quote.state),
                    });
                }
            }
        };
        let mut balance = self.mint.balance.lock().expect("balance poisoned");
        *balance = balance.saturating_add(amount);
        Ok(amount)
    }

    async fn melt_quote(&self, invoice: &str) -> Result<MeltQuoteResponse, CapabilityError> {
        let digits: String = invoice
            .strip_prefix("lnbc")
            .unwrap_or("")
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        let amount: u64 = digits
            .parse()
            .map_err(|_| CapabilityError::Unsupported(format!("unparseable invoice: {}", invoice)))?;
        let id = random_id();
        let fee_reserve = (amount / 100).max(1);
        self.mint
            .melt_quotes
            .lock()
            .expect("quote map poisoned")
            .insert(id.clone(), SimMeltQuote { amount, fee_reserve });
        Ok(MeltQuoteResponse {
            id,
            amount,
            fee_reserve,
        })
    }

    async fn melt(&self, quote_id: &str) -> Result<MeltResult, CapabilityError> {
        let (amount, fee_reserve) = {
            let quotes = self.mint.melt_quotes.lock().expect("quote map poisoned");
            let quote = quotes
                .get(quote_id)
                .ok_or_else(|| CapabilityError::QuoteNotFound(quote_id.to_string()))?;
            (quote.amount, quote.fee_reserve)
        };
        let mut balance = self.mint.balance.lock().expect("balance poisoned");
        let total = amount.saturating_add(fee_reserve);
        if *balance < total {
            return Err(CapabilityError::QuoteNotPayable {
                quote_id: quote_id.to_string(),
                reason: format!("insufficient balance: {} < {}", *balance, total),
            });
        }
        *balance -= total;
        let mut preimage = [0u8; 32];
        rand::rng().fill(&mut preimage);
        Ok(MeltResult {
            preimage: Some(hex::encode(preimage)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn quote_pays_after_configured_checks() {
        let backend = MemoryBackend::new(MemoryBackendConfig { pay_after_checks: 2 });
        let wallet = backend
            .create_wallet("https://mint.test", CurrencyUnit::Sat, &StoreLocation::InMemory, "seed")
            .await
            .unwrap();
        let quote = wallet.mint_quote(50, None).await.unwrap();

        assert_eq!(wallet.mint_quote_state(&quote.id).await.unwrap(), QuoteState::Unpaid);
        assert_eq!(wallet.mint_quote_state(&quote.id).await.unwrap(), QuoteState::Unpaid);
        assert_eq!(wallet.mint_quote_state(&quote.id).await.unwrap(), QuoteState::Paid);
    }

    #[tokio::test]
    async fn mint_is_single_shot() {
        let backend = MemoryBackend::new(MemoryBackendConfig { pay_after_checks: 0 });
        let wallet = backend
            .create_wallet("https://mint.test", CurrencyUnit::Sat, &StoreLocation::InMemory, "seed")
            .await
            .unwrap();
        let quote = wallet.mint_quote(50, None).await.unwrap();
        wallet.mint_quote_state(&quote.id).await.unwrap();

        assert_eq!(wallet.mint(&quote.id, SplitPolicy::Default).await.unwrap(), 50);
        assert!(wallet.mint(&quote.id, SplitPolicy::Default).await.is_err());
        assert_eq!(wallet.balance().await.unwrap(), 50);
    }
}
