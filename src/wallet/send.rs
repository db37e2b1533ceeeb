//! Send-side payment flow.
//!
//! Sending is a two-step flow: `prepare` turns a lightning invoice into a
//! melt quote with a fee reserve, `execute` runs it after the pluggable
//! confirmation hook approves. A process-wide in-flight flag serializes
//! sends; a second send while one is running is a silent no-op rather than
//! an error, so the UI never shows duplicate failure alerts. The flag is
//! released on every exit path through an RAII guard.

use crate::capability::WalletHandle;
use crate::wallet::WalletError;
use crate::wallet::balance::BalanceCache;
use crate::wallet::events::{EventDispatcher, WalletEvent};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// A melt quote ready for user confirmation.
#[derive(Debug, Clone)]
pub struct PreparedSend {
    pub quote_id: String,
    pub mint_url: String,
    pub invoice: String,
    pub amount: u64,
    pub fee_reserve: u64,
}

/// How a send attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The melt settled.
    Sent {
        amount: u64,
        preimage: Option<String>,
    },
    /// The confirmation hook declined.
    Cancelled,
    /// Another send was already in flight; nothing happened.
    AlreadyInFlight,
}

/// Pluggable user-confirmation hook, asked before every melt executes.
#[async_trait::async_trait]
pub trait SendConfirmation: Send + Sync {
    async fn confirm(&self, prepared: &PreparedSend) -> bool;
}

/// Confirmation hook that approves everything. For headless use and tests.
pub struct AutoConfirm;

#[async_trait::async_trait]
impl SendConfirmation for AutoConfirm {
    async fn confirm(&self, _prepared: &PreparedSend) -> bool {
        true
    }
}

pub struct PaymentExecutor {
    balance: Arc<BalanceCache>,
    dispatcher: Arc<EventDispatcher>,
    in_flight: AtomicBool,
}

impl PaymentExecutor {
    pub fn new(balance: Arc<BalanceCache>, dispatcher: Arc<EventDispatcher>) -> Self {
        Self {
            balance,
            dispatcher,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Request a melt quote for the invoice. Accepts an optional
    /// `lightning:` URI prefix; anything not starting with the `ln` scheme
    /// prefix is rejected before the backend is consulted.
    pub async fn prepare(
        &self,
        wallet: &WalletHandle,
        invoice: &str,
    ) -> Result<PreparedSend, WalletError> {
        let trimmed = invoice.trim();
        let bare = trimmed.strip_prefix("lightning:").unwrap_or(trimmed);
        if !bare.to_lowercase().starts_with("ln") {
            return Err(WalletError::InvalidInvoice(format!(
                "not a lightning invoice: {}",
                trimmed
            )));
        }

        let quote = wallet
            .melt_quote(bare)
            .await
            .map_err(|e| WalletError::from_capability("melt quote", e))?;
        info!(
            "Prepared melt quote {}: {} sats + {} fee reserve at {}",
            quote.id,
            quote.amount,
            quote.fee_reserve,
            wallet.mint_url()
        );
        Ok(PreparedSend {
            quote_id: quote.id,
            mint_url: wallet.mint_url().to_string(),
            invoice: bare.to_string(),
            amount: quote.amount,
            fee_reserve: quote.fee_reserve,
        })
    }

    /// Run the whole send flow under the in-flight guard. A duplicate call
    /// while one is running returns `AlreadyInFlight` before any quote is
    /// requested from the mint.
    pub async fn send(
        &self,
        wallet: &WalletHandle,
        invoice: &str,
        confirm: &dyn SendConfirmation,
    ) -> Result<SendOutcome, WalletError> {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            debug!("Send already in flight, ignoring duplicate attempt");
            return Ok(SendOutcome::AlreadyInFlight);
        };
        let prepared = self.prepare(wallet, invoice).await?;
        self.settle(wallet, &prepared, confirm).await
    }

    /// Confirm and execute an already prepared melt.
    pub async fn execute(
        &self,
        wallet: &WalletHandle,
        prepared: &PreparedSend,
        confirm: &dyn SendConfirmation,
    ) -> Result<SendOutcome, WalletError> {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            debug!("Send already in flight, ignoring duplicate attempt");
            return Ok(SendOutcome::AlreadyInFlight);
        };
        self.settle(wallet, prepared, confirm).await
    }

    async fn settle(
        &self,
        wallet: &WalletHandle,
        prepared: &PreparedSend,
        confirm: &dyn SendConfirmation,
    ) -> Result<SendOutcome, WalletError> {
        if !confirm.confirm(prepared).await {
            info!("Send of {} sats cancelled by user", prepared.amount);
            return Ok(SendOutcome::Cancelled);
        }

        let available = self.balance.get_cached(&prepared.mint_url);
        let required = prepared
            .amount
            .checked_add(prepared.fee_reserve)
            .ok_or_else(|| {
                WalletError::Validation("melt amount plus fee overflows".to_string())
            })?;
        if available < required {
            return Err(WalletError::InsufficientFunds {
                available,
                required,
            });
        }

        // The balance may change between this check and the melt call; the
        // mint remains the authority on whether the melt is funded.
        let result = wallet
            .melt(&prepared.quote_id)
            .await
            .map_err(|e| WalletError::from_capability("melt", e))?;

        // Re-read the cache after the melt await: a receive finalizing in
        // the meantime must not have its credit overwritten.
        let new_balance = self
            .balance
            .get_cached(&prepared.mint_url)
            .saturating_sub(prepared.amount);
        self.balance.update(&prepared.mint_url, new_balance).await?;
        self.dispatcher
            .dispatch(&WalletEvent::PaymentSent {
                mint_url: prepared.mint_url.clone(),
                amount: prepared.amount,
            })
            .await;
        info!("Melt {} settled for {} sats", prepared.quote_id, prepared.amount);

        Ok(SendOutcome::Sent {
            amount: prepared.amount,
            preimage: result.preimage,
        })
    }
}

/// Holds the process-wide send lock; releases it on drop so no exit path
/// can leave it held.
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
