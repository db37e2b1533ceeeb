//! Receive-side payment flow.
//!
//! A receive starts with a mint quote (a lightning invoice the payer must
//! settle) and ends when the paid quote is redeemed into tokens. The mint
//! pushes nothing, so a `ReceiveSession` polls the quote state on a fixed
//! interval, with an immediate check before the first tick. Both the timer
//! and any manual check funnel into the same guarded finalize path, so
//! `mint()` runs at most once per quote id no matter how the triggers race.
//!
//! Poll errors are logged and retried on the next tick; they never escape
//! the loop. Quotes do not survive a process restart.

use crate::capability::{QuoteState, SplitPolicy, WalletHandle};
use crate::wallet::WalletError;
use crate::wallet::balance::BalanceCache;
use crate::wallet::events::{EventDispatcher, WalletEvent};
use crate::wallet::types::Quote;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Configuration for quote polling.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Fixed interval between quote state checks.
    pub interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
        }
    }
}

/// Creates receive quotes and spawns polling sessions for them.
pub struct PaymentQuotePoller {
    balance: Arc<BalanceCache>,
    dispatcher: Arc<EventDispatcher>,
    config: PollerConfig,
}

impl PaymentQuotePoller {
    pub fn new(
        balance: Arc<BalanceCache>,
        dispatcher: Arc<EventDispatcher>,
        config: PollerConfig,
    ) -> Self {
        Self {
            balance,
            dispatcher,
            config,
        }
    }

    /// Request a quote for receiving `amount` sats. The amount must be a
    /// positive integer.
    pub async fn create_quote(
        &self,
        wallet: &WalletHandle,
        amount: u64,
        memo: Option<String>,
    ) -> Result<Quote, WalletError> {
        if amount == 0 {
            return Err(WalletError::Validation(
                "receive amount must be a positive integer".to_string(),
            ));
        }
        let response = wallet
            .mint_quote(amount, memo)
            .await
            .map_err(|e| WalletError::from_capability("mint quote", e))?;
        info!(
            "Created mint quote {} for {} sats at {}",
            response.id,
            response.amount,
            wallet.mint_url()
        );
        Ok(Quote {
            id: response.id,
            mint_url: wallet.mint_url().to_string(),
            invoice: response.invoice,
            amount: response.amount,
            state: QuoteState::Unpaid,
            created_at: chrono::Utc::now().timestamp() as u64,
        })
    }

    /// Begin polling a quote. The returned session owns the quote's state
    /// machine; the spawned timer performs an immediate check and then one
    /// per configured interval until the quote reaches a terminal state or
    /// the session is stopped.
    pub fn start_polling(&self, wallet: WalletHandle, quote: Quote) -> Arc<ReceiveSession> {
        let (stop_tx, _) = watch::channel(false);
        let session = Arc::new(ReceiveSession {
            wallet,
            balance: Arc::clone(&self.balance),
            dispatcher: Arc::clone(&self.dispatcher),
            quote: Mutex::new(quote),
            finalizing: AtomicBool::new(false),
            stop_tx,
        });
        tokio::spawn(run_poll_loop(Arc::clone(&session), self.config.interval));
        session
    }
}

/// One in-flight receive: a quote plus the timer polling it.
pub struct ReceiveSession {
    wallet: WalletHandle,
    balance: Arc<BalanceCache>,
    dispatcher: Arc<EventDispatcher>,
    quote: Mutex<Quote>,
    /// Set once a finalize is in flight; the winning CAS is the only path
    /// allowed to call `mint()`.
    finalizing: AtomicBool,
    stop_tx: watch::Sender<bool>,
}

impl ReceiveSession {
    /// Snapshot of the quote, including its current state.
    pub fn quote(&self) -> Quote {
        self.quote.lock().expect("quote poisoned").clone()
    }

    pub fn state(&self) -> QuoteState {
        self.quote.lock().expect("quote poisoned").state
    }

    /// Whether the polling timer has been told to stop.
    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }

    /// Manually trigger a state check. Shares the guarded finalize path
    /// with the timer, so racing both never double-mints.
    pub async fn check_now(&self) -> Result<QuoteState, WalletError> {
        self.check_once().await
    }

    async fn check_once(&self) -> Result<QuoteState, WalletError> {
        let (quote_id, current) = {
            let quote = self.quote.lock().expect("quote poisoned");
            (quote.id.clone(), quote.state)
        };
        if current.is_terminal() {
            return Ok(current);
        }

        let remote = self
            .wallet
            .mint_quote_state(&quote_id)
            .await
            .map_err(|e| WalletError::from_capability("mint quote state", e))?;

        if remote == QuoteState::Paid {
            {
                let mut quote = self.quote.lock().expect("quote poisoned");
                if quote.state == QuoteState::Unpaid {
                    quote.state = QuoteState::Paid;
                }
            }
            self.try_finalize(&quote_id).await;
        }
        Ok(self.state())
    }

    /// Redeem a paid quote exactly once. Losing the CAS means another
    /// trigger is already finalizing; on failure the flag is released and
    /// the next tick retries.
    async fn try_finalize(&self, quote_id: &str) {
        if self
            .finalizing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        if self.state() != QuoteState::Paid {
            self.finalizing.store(false, Ordering::Release);
            return;
        }

        match self.wallet.mint(quote_id, SplitPolicy::Default).await {
            Ok(minted) => {
                {
                    let mut quote = self.quote.lock().expect("quote poisoned");
                    quote.state = QuoteState::Issued;
                }
                self.stop_tx.send_replace(true);

                let mint_url = self.wallet.mint_url().to_string();
                let new_balance = self.balance.get_cached(&mint_url).saturating_add(minted);
                if let Err(e) = self.balance.update(&mint_url, new_balance).await {
                    error!("Minted {} sats but failed to cache balance: {}", minted, e);
                }
                self.dispatcher
                    .dispatch(&WalletEvent::PaymentReceived {
                        mint_url,
                        amount: minted,
                    })
                    .await;
                info!("Quote {} finalized: {} sats minted", quote_id, minted);
                // finalizing stays set; the quote is terminal
            }
            Err(e) => {
                warn!("Finalize failed for quote {}: {}; retrying on next tick", quote_id, e);
                self.finalizing.store(false, Ordering::Release);
            }
        }
    }

    /// Cancel the polling timer without changing the quote state. Safe to
    /// call repeatedly; used on UI close, logout and engine shutdown.
    /// `send_replace` updates the flag even when the poll task has not
    /// subscribed yet; its entry check picks the stop up then.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    /// Stop polling and mark a still-unpaid quote as abandoned.
    pub fn cancel(&self) {
        self.stop();
        let mut quote = self.quote.lock().expect("quote poisoned");
        if quote.state == QuoteState::Unpaid {
            quote.state = QuoteState::Cancelled;
        }
    }
}

async fn run_poll_loop(session: Arc<ReceiveSession>, interval: Duration) {
    let mut stop_rx = session.stop_tx.subscribe();
    if *stop_rx.borrow() {
        return;
    }
    // The first tick fires immediately, giving the up-front check before
    // the fixed-interval cadence starts.
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match session.check_once().await {
                    Ok(state) if state.is_terminal() => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Quote poll failed, retrying on next tick: {}", e);
                    }
                }
            }
            _ = stop_rx.changed() => {
                debug!("Polling stopped for quote {}", session.quote().id);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CapabilityError;
    use crate::wallet::repositories::FileBalanceRepository;
    use crate::wallet::testing::{RecordingHandler, ScriptedWallet};
    use tokio::time::timeout;

    async fn balance_cache(dir: &std::path::Path, dispatcher: Arc<EventDispatcher>) -> Arc<BalanceCache> {
        Arc::new(
            BalanceCache::load(
                Box::new(FileBalanceRepository::new(dir.to_path_buf())),
                dispatcher,
            )
            .await
            .unwrap(),
        )
    }

    fn fast_config() -> PollerConfig {
        PollerConfig {
            interval: Duration::from_millis(10),
        }
    }

    async fn wait_for_state(session: &ReceiveSession, state: QuoteState) {
        timeout(Duration::from_secs(10), async {
            while session.state() != state {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("quote never reached expected state");
    }

    fn test_quote(id: &str, amount: u64) -> Quote {
        Quote {
            id: id.to_string(),
            mint_url: "https://mint.test".to_string(),
            invoice: format!("lnbc{}n1test", amount),
            amount,
            state: QuoteState::Unpaid,
            created_at: 0,
        }
    }

    #[tokio::test]
    async fn create_quote_rejects_zero_amount() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = Arc::new(EventDispatcher::new());
        let poller = PaymentQuotePoller::new(
            balance_cache(dir.path(), Arc::clone(&dispatcher)).await,
            dispatcher,
            fast_config(),
        );
        let wallet: WalletHandle = Arc::new(ScriptedWallet::new("https://mint.test"));

        let err = poller.create_quote(&wallet, 0, None).await.unwrap_err();
        assert!(matches!(err, WalletError::Validation(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn unpaid_checks_then_paid_finalizes_once() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = Arc::new(EventDispatcher::new());
        let recorder = RecordingHandler::shared();
        dispatcher
            .register_handler(Box::new(RecordingHandler::new(Arc::clone(&recorder))))
            .await;
        let balance = balance_cache(dir.path(), Arc::clone(&dispatcher)).await;
        let poller = PaymentQuotePoller::new(Arc::clone(&balance), dispatcher, fast_config());

        let wallet = Arc::new(ScriptedWallet::new("https://mint.test"));
        wallet.push_quote_state(QuoteState::Unpaid);
        wallet.push_quote_state(QuoteState::Unpaid);
        wallet.push_quote_state(QuoteState::Unpaid);
        wallet.set_default_quote_state(QuoteState::Paid);
        wallet.set_mint_amount(100);

        let session = poller.start_polling(wallet.clone(), test_quote("q1", 100));
        wait_for_state(&session, QuoteState::Issued).await;

        assert_eq!(wallet.mint_calls(), 1);
        assert_eq!(balance.get_cached("https://mint.test"), 100);
        assert!(session.is_stopped());

        let seen = recorder.lock().unwrap();
        assert!(seen.contains(&WalletEvent::PaymentReceived {
            mint_url: "https://mint.test".to_string(),
            amount: 100,
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn racing_manual_and_timer_checks_mint_once() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = Arc::new(EventDispatcher::new());
        let balance = balance_cache(dir.path(), Arc::clone(&dispatcher)).await;
        let poller = PaymentQuotePoller::new(Arc::clone(&balance), dispatcher, fast_config());

        let wallet = Arc::new(ScriptedWallet::new("https://mint.test"));
        wallet.set_default_quote_state(QuoteState::Paid);
        wallet.set_mint_amount(50);
        // Slow mint call keeps the finalize window open while other
        // triggers race it.
        wallet.set_mint_delay(Duration::from_millis(50));

        let session = poller.start_polling(wallet.clone(), test_quote("q2", 50));
        let (a, b) = tokio::join!(session.check_now(), session.check_now());
        assert!(a.is_ok() && b.is_ok());

        wait_for_state(&session, QuoteState::Issued).await;
        assert_eq!(wallet.mint_calls(), 1);
        assert_eq!(balance.get_cached("https://mint.test"), 50);
    }

    #[tokio::test(start_paused = true)]
    async fn finalize_failure_retries_on_next_tick() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = Arc::new(EventDispatcher::new());
        let balance = balance_cache(dir.path(), Arc::clone(&dispatcher)).await;
        let poller = PaymentQuotePoller::new(Arc::clone(&balance), dispatcher, fast_config());

        let wallet = Arc::new(ScriptedWallet::new("https://mint.test"));
        wallet.set_default_quote_state(QuoteState::Paid);
        wallet.set_mint_amount(25);
        wallet.push_mint_result(Err(CapabilityError::Network("mint flaked".to_string())));

        let session = poller.start_polling(wallet.clone(), test_quote("q3", 25));
        wait_for_state(&session, QuoteState::Issued).await;

        assert_eq!(wallet.mint_calls(), 2);
        assert_eq!(balance.get_cached("https://mint.test"), 25);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent_and_leaves_state() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = Arc::new(EventDispatcher::new());
        let balance = balance_cache(dir.path(), Arc::clone(&dispatcher)).await;
        let poller = PaymentQuotePoller::new(Arc::clone(&balance), dispatcher, fast_config());

        let wallet = Arc::new(ScriptedWallet::new("https://mint.test"));
        wallet.set_default_quote_state(QuoteState::Unpaid);

        let session = poller.start_polling(wallet.clone(), test_quote("q4", 10));
        tokio::time::sleep(Duration::from_millis(50)).await;

        session.stop();
        session.stop();
        assert!(session.is_stopped());
        assert_eq!(session.state(), QuoteState::Unpaid);
        assert_eq!(wallet.mint_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_before_the_poll_task_runs_is_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = Arc::new(EventDispatcher::new());
        let balance = balance_cache(dir.path(), Arc::clone(&dispatcher)).await;
        let poller = PaymentQuotePoller::new(Arc::clone(&balance), dispatcher, fast_config());

        let wallet = Arc::new(ScriptedWallet::new("https://mint.test"));
        wallet.set_default_quote_state(QuoteState::Paid);
        wallet.set_mint_amount(10);

        // No await between spawn and stop: the poll task has not been
        // polled and nothing has subscribed to the stop channel yet.
        let session = poller.start_polling(wallet.clone(), test_quote("q6", 10));
        session.stop();
        assert!(session.is_stopped());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(wallet.mint_calls(), 0);
        assert_eq!(session.state(), QuoteState::Unpaid);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_marks_unpaid_quote_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = Arc::new(EventDispatcher::new());
        let balance = balance_cache(dir.path(), Arc::clone(&dispatcher)).await;
        let poller = PaymentQuotePoller::new(Arc::clone(&balance), dispatcher, fast_config());

        let wallet = Arc::new(ScriptedWallet::new("https://mint.test"));
        wallet.set_default_quote_state(QuoteState::Unpaid);

        let session = poller.start_polling(wallet, test_quote("q5", 10));
        session.cancel();
        assert_eq!(session.state(), QuoteState::Cancelled);

        // Cancelled is terminal; a later manual check is a no-op.
        assert_eq!(session.check_now().await.unwrap(), QuoteState::Cancelled);
    }
}
