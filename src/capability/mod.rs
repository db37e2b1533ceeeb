//!
//! Native wallet capability boundary.
//!
//! The engine never implements the ecash protocol itself. Everything
//! cryptographic is consumed through the two traits in this module:
//! `WalletConnector` constructs per-mint wallet handles and generates
//! mnemonics, `MintWallet` is the surface of one constructed handle
//! (balance, mint and melt quotes, mint, melt). All methods are async and
//! designed for use with Tokio.
//!
//! `memory` provides an in-process simulation of a mint used by the demo
//! binary and the test suite.

pub mod memory;
pub mod types;

pub use types::*;

use std::sync::Arc;

/// A constructed native wallet bound to one mint URL and one seed.
pub type WalletHandle = Arc<dyn MintWallet>;

/// Entry point into the native wallet library.
#[async_trait::async_trait]
pub trait WalletConnector: Send + Sync {
    /// Construct a fresh wallet for `mint_url` with the given seed and store.
    async fn create_wallet(
        &self,
        mint_url: &str,
        unit: CurrencyUnit,
        store: &StoreLocation,
        seed: &str,
    ) -> Result<WalletHandle, CapabilityError>;

    /// Reconstruct a wallet from an existing seed, recovering any funds the
    /// backend can find for it.
    async fn restore_wallet(
        &self,
        mint_url: &str,
        unit: CurrencyUnit,
        store: &StoreLocation,
        seed: &str,
    ) -> Result<WalletHandle, CapabilityError>;

    /// Produce a fresh mnemonic phrase. Pure; nothing is persisted.
    fn generate_mnemonic(&self) -> Result<String, CapabilityError>;
}

/// Operations on one wallet handle.
#[async_trait::async_trait]
pub trait MintWallet: Send + Sync {
    /// The mint URL this handle is bound to.
    fn mint_url(&self) -> &str;

    /// Current balance according to the backend.
    async fn balance(&self) -> Result<u64, CapabilityError>;

    /// Request a lightning invoice for receiving `amount` sats.
    async fn mint_quote(
        &self,
        amount: u64,
        memo: Option<String>,
    ) -> Result<MintQuoteResponse, CapabilityError>;

    /// Look up the current state of a mint quote.
    async fn mint_quote_state(&self, quote_id: &str) -> Result<QuoteState, CapabilityError>;

    /// Redeem a paid quote into tokens. Returns the amount minted.
    async fn mint(&self, quote_id: &str, split: SplitPolicy) -> Result<u64, CapabilityError>;

    /// Request a quote for paying a lightning invoice.
    async fn melt_quote(&self, invoice: &str) -> Result<MeltQuoteResponse, CapabilityError>;

    /// Execute a previously quoted melt.
    async fn melt(&self, quote_id: &str) -> Result<MeltResult, CapabilityError>;
}
