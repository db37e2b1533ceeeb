//! Event system for the wallet engine.
//!
//! This module defines the notification surface the UI layer subscribes to.
//! Engine components emit events when a balance changes, a payment settles
//! in either direction, or a command needs a mint to be selected first.
//! Events are fire-and-forget: delivery order is not guaranteed to match
//! call order across different mints, and a failing handler never blocks
//! the others.

use crate::wallet::WalletError;
use crate::wallet::types::Quote;

/// Notifications emitted by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum WalletEvent {
    /// The cached balance for a mint changed.
    BalanceChanged { mint_url: String, amount: u64 },
    /// A receive quote was finalized and tokens were minted.
    PaymentReceived { mint_url: String, amount: u64 },
    /// An outbound payment settled.
    PaymentSent { mint_url: String, amount: u64 },
    /// A receive quote was created; carries the invoice to present.
    QuoteCreated { quote: Quote },
    /// A wallet-affecting command was issued with no active mint. The
    /// command is parked and resumes once a mint becomes active.
    MintSelectionRequired,
}

/// Trait for handling wallet events.
///
/// Implementors receive every event dispatched by the engine and can drive
/// UI refresh or any other side effect.
#[async_trait::async_trait]
pub trait WalletEventHandler: Send + Sync {
    /// Handle one event.
    async fn handle(&mut self, event: &WalletEvent) -> Result<(), WalletError>;

    /// Get the name of this handler for logging and diagnostics.
    fn name(&self) -> &'static str;
}

/// Event dispatcher that manages multiple event handlers.
///
/// Handlers are called in registration order. Errors from handlers are
/// logged but do not stop other handlers from running.
pub struct EventDispatcher {
    handlers: tokio::sync::Mutex<Vec<Box<dyn WalletEventHandler>>>,
}

impl EventDispatcher {
    /// Create a new, empty event dispatcher.
    pub fn new() -> Self {
        Self {
            handlers: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    /// Register a new event handler.
    pub async fn register_handler(&self, handler: Box<dyn WalletEventHandler>) {
        self.handlers.lock().await.push(handler);
    }

    /// Remove every registered handler.
    pub async fn clear_handlers(&self) {
        self.handlers.lock().await.clear();
    }

    /// Dispatch an event to all registered handlers.
    pub async fn dispatch(&self, event: &WalletEvent) {
        let mut handlers = self.handlers.lock().await;
        for handler in handlers.iter_mut() {
            if let Err(e) = handler.handle(event).await {
                tracing::error!("Handler {} failed to process event: {}", handler.name(), e);
                // Continue processing with other handlers
            }
        }
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
