use crate::capability::{CapabilityError, QuoteState};

use serde::{Deserialize, Serialize};

/// Cached balance snapshot for one mint.
///
/// The amount is authoritative only as of the last successful sync against
/// the live wallet. Amounts serialize as strings to avoid precision loss in
/// consumers that parse the persisted file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceRecord {
	pub mint_url: String,
	#[serde(with = "amount_as_string")]
	pub amount: u64,
}

mod amount_as_string {
	use serde::{Deserialize, Deserializer, Serializer, de::Error};

	pub fn serialize<S: Serializer>(amount: &u64, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&amount.to_string())
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
		let raw = String::deserialize(deserializer)?;
		raw.parse().map_err(D::Error::custom)
	}
}

/// A receive-side quote: one lightning invoice awaiting payment and
/// redemption. Immutable except for `state`, which only moves forward.
/// Quotes are never reused across receive operations and are not persisted
/// across restarts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
	pub id: String,
	pub mint_url: String,
	pub invoice: String,
	pub amount: u64,
	pub state: QuoteState,
	/// Unix timestamp of quote creation.
	pub created_at: u64,
}

/// Error types for the wallet orchestration engine
#[derive(Debug, thiserror::Error)]
pub enum WalletError {
	/// All storage construction strategies exhausted, or persisted state
	/// could not be written. Fatal; no automatic retry.
	#[error("storage error: {0}")]
	Storage(String),

	/// The native wallet capability failed in a way that is not tied to a
	/// single quote or request. Fatal.
	#[error("wallet backend unavailable: {0}")]
	BackendUnavailable(String),

	/// Caller input was rejected. Recoverable after user correction.
	#[error("validation error: {0}")]
	Validation(String),

	/// The invoice does not match the expected scheme prefix.
	#[error("invalid invoice format: {0}")]
	InvalidInvoice(String),

	/// The cached balance cannot cover the payment plus its fee reserve.
	#[error("insufficient funds: {available} sat available, {required} sat required")]
	InsufficientFunds { available: u64, required: u64 },

	/// The active mint cannot be removed from the registry.
	#[error("cannot remove the active mint {0}")]
	CannotRemoveActiveMint(String),

	/// A quote was rejected, expired or otherwise unusable. Recoverable,
	/// caller may retry with a fresh quote.
	#[error("quote error: {0}")]
	Quote(String),

	/// The mint was unreachable. Recoverable, caller may retry.
	#[error("network error: {0}")]
	Network(String),

	/// Persisted engine state could not be read or parsed.
	#[error("state parse error: {0}")]
	ParseError(String),

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),
}

impl WalletError {
	/// Translate a capability-boundary error into the engine taxonomy,
	/// prefixing the failed operation for a human-readable message.
	pub fn from_capability(context: &str, err: CapabilityError) -> Self {
		match err {
			CapabilityError::Network(msg) => WalletError::Network(format!("{}: {}", context, msg)),
			CapabilityError::Store(msg) => WalletError::Storage(format!("{}: {}", context, msg)),
			CapabilityError::QuoteNotFound(_)
			| CapabilityError::QuoteExpired(_)
			| CapabilityError::QuoteNotPayable { .. } => {
				WalletError::Quote(format!("{}: {}", context, err))
			}
			CapabilityError::Unsupported(_) | CapabilityError::Internal(_) => {
				WalletError::BackendUnavailable(format!("{}: {}", context, err))
			}
		}
	}
}
