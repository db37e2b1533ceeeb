//! Types for the native wallet capability boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Accounting unit for wallet amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CurrencyUnit {
    /// Satoshi, the base unit of every wallet in this engine.
    #[default]
    Sat,
}

impl fmt::Display for CurrencyUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CurrencyUnit::Sat => write!(f, "sat"),
        }
    }
}

/// Where a wallet's local database lives.
///
/// Handle construction tries an ordered list of these: the per-mint
/// filesystem location first, then the in-memory fallback.
#[derive(Debug, Clone)]
pub enum StoreLocation {
    /// Durable store rooted at the given directory.
    Filesystem(PathBuf),
    /// Volatile store, lost on process exit.
    InMemory,
}

impl StoreLocation {
    /// Short description used when aggregating construction failures.
    pub fn describe(&self) -> String {
        match self {
            StoreLocation::Filesystem(path) => format!("filesystem store at {}", path.display()),
            StoreLocation::InMemory => "in-memory store".to_string(),
        }
    }
}

/// Lifecycle state of a mint (receive) quote.
///
/// Transitions only move forward: Unpaid -> Paid -> Issued, or
/// Unpaid -> Cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuoteState {
    /// The lightning invoice has not been paid yet.
    Unpaid,
    /// The invoice is paid; tokens can be minted.
    Paid,
    /// Tokens were minted for this quote. Terminal.
    Issued,
    /// The caller abandoned the quote before payment. Terminal.
    Cancelled,
}

impl QuoteState {
    /// Whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, QuoteState::Issued | QuoteState::Cancelled)
    }
}

/// Response to a mint quote request: the invoice to pay and the quote id to
/// poll.
#[derive(Debug, Clone)]
pub struct MintQuoteResponse {
    pub id: String,
    pub invoice: String,
    pub amount: u64,
}

/// Response to a melt quote request.
#[derive(Debug, Clone)]
pub struct MeltQuoteResponse {
    pub id: String,
    pub amount: u64,
    pub fee_reserve: u64,
}

/// Result of executing a melt.
#[derive(Debug, Clone)]
pub struct MeltResult {
    /// Lightning payment preimage, when the backend reports one.
    pub preimage: Option<String>,
}

/// How minted tokens are split into denominations. The engine always uses
/// the backend default.
#[derive(Debug, Clone, Copy, Default)]
pub enum SplitPolicy {
    #[default]
    Default,
}

/// Error types for the native wallet capability.
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    #[error("network error: {0}")]
    Network(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("quote {0} not found")]
    QuoteNotFound(String),

    #[error("quote {0} expired")]
    QuoteExpired(String),

    #[error("quote {quote_id} not payable: {reason}")]
    QuoteNotPayable { quote_id: String, reason: String },

    #[error("operation not supported: {0}")]
    Unsupported(String),

    #[error("backend failure: {0}")]
    Internal(String),
}
