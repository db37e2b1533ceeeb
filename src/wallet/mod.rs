//! Wallet orchestration engine.
//!
//! `WalletOrchestrator` is the facade; the submodules hold the components
//! it coordinates: seed custody, the mint registry, per-mint wallet
//! handles, the balance cache and the receive/send payment flows.

pub mod balance;
pub mod events;
pub mod handles;
pub mod orchestrator;
pub mod receive;
pub mod registry;
pub mod repositories;
pub mod send;
pub mod types;
pub mod vault;

#[cfg(test)]
pub(crate) mod testing;

pub use events::{EventDispatcher, WalletEvent, WalletEventHandler};
pub use orchestrator::{Dispatch, EngineConfig, WalletOrchestrator};
pub use receive::{PollerConfig, ReceiveSession};
pub use send::{AutoConfirm, PreparedSend, SendConfirmation, SendOutcome};
pub use types::{BalanceRecord, Quote, WalletError};
