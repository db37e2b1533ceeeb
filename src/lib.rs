//! Orchestration engine for an ecash wallet over Lightning.
//!
//! The engine coordinates seed custody, multiple mints, cached balances
//! and the receive/send payment flows on top of a pluggable native wallet
//! capability. It implements no cryptography itself; everything
//! protocol-level is consumed through the traits in [`capability`].

pub mod capability;
pub mod utils;
pub mod wallet;

pub use capability::{CapabilityError, CurrencyUnit, MintWallet, WalletConnector, WalletHandle};
pub use wallet::{
    Dispatch, EngineConfig, SendOutcome, WalletError, WalletEvent, WalletOrchestrator,
};
