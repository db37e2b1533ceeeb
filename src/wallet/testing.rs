//! Shared test doubles: an event recorder and a scriptable mint wallet.

use crate::capability::{
    CapabilityError, MeltQuoteResponse, MeltResult, MintQuoteResponse, MintWallet, QuoteState,
    SplitPolicy,
};
use crate::wallet::WalletError;
use crate::wallet::events::{WalletEvent, WalletEventHandler};

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Event handler that appends every dispatched event to a shared vector.
pub struct RecordingHandler {
    seen: Arc<Mutex<Vec<WalletEvent>>>,
}

impl RecordingHandler {
    pub fn shared() -> Arc<Mutex<Vec<WalletEvent>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    pub fn new(seen: Arc<Mutex<Vec<WalletEvent>>>) -> Self {
        Self { seen }
    }
}

#[async_trait::async_trait]
impl WalletEventHandler for RecordingHandler {
    async fn handle(&mut self, event: &WalletEvent) -> Result<(), WalletError> {
        self.seen.lock().unwrap().push(event.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "RecordingHandler"
    }
}

/// A `MintWallet` whose responses are scripted per call.
///
/// Queued responses are consumed front to back; when a queue runs dry the
/// configured default applies. Call counters let tests assert how often the
/// expensive operations actually ran.
pub struct ScriptedWallet {
    mint_url: String,
    balances: Mutex<VecDeque<Result<u64, CapabilityError>>>,
    quote_states: Mutex<VecDeque<QuoteState>>,
    default_quote_state: Mutex<QuoteState>,
    mint_amount: Mutex<u64>,
    mint_results: Mutex<VecDeque<Result<u64, CapabilityError>>>,
    mint_delay: Mutex<Option<Duration>>,
    mint_call_count: AtomicU32,
    melt_quote: Mutex<(u64, u64)>,
    melt_quote_call_count: AtomicU32,
    melt_results: Mutex<VecDeque<Result<MeltResult, CapabilityError>>>,
    melt_delay: Mutex<Option<Duration>>,
    melt_call_count: AtomicU32,
}

impl ScriptedWallet {
    pub fn new(mint_url: &str) -> Self {
        Self {
            mint_url: mint_url.to_string(),
            balances: Mutex::new(VecDeque::new()),
            quote_states: Mutex::new(VecDeque::new()),
            default_quote_state: Mutex::new(QuoteState::Unpaid),
            mint_amount: Mutex::new(0),
            mint_results: Mutex::new(VecDeque::new()),
            mint_delay: Mutex::new(None),
            mint_call_count: AtomicU32::new(0),
            melt_quote: Mutex::new((0, 0)),
            melt_quote_call_count: AtomicU32::new(0),
            melt_results: Mutex::new(VecDeque::new()),
            melt_delay: Mutex::new(None),
            melt_call_count: AtomicU32::new(0),
        }
    }

    pub fn push_balance(&self, result: Result<u64, CapabilityError>) {
        self.balances.lock().unwrap().push_back(result);
    }

    pub fn push_quote_state(&self, state: QuoteState) {
        self.quote_states.lock().unwrap().push_back(state);
    }

    pub fn set_default_quote_state(&self, state: QuoteState) {
        *self.default_quote_state.lock().unwrap() = state;
    }

    /// The amount a successful `mint` reports as minted.
    pub fn set_mint_amount(&self, amount: u64) {
        *self.mint_amount.lock().unwrap() = amount;
    }

    pub fn push_mint_result(&self, result: Result<u64, CapabilityError>) {
        self.mint_results.lock().unwrap().push_back(result);
    }

    pub fn set_mint_delay(&self, delay: Duration) {
        *self.mint_delay.lock().unwrap() = Some(delay);
    }

    pub fn mint_calls(&self) -> u32 {
        self.mint_call_count.load(Ordering::SeqCst)
    }

    /// The amount and fee reserve every melt quote reports.
    pub fn set_melt_quote(&self, amount: u64, fee_reserve: u64) {
        *self.melt_quote.lock().unwrap() = (amount, fee_reserve);
    }

    pub fn push_melt_result(&self, result: Result<MeltResult, CapabilityError>) {
        self.melt_results.lock().unwrap().push_back(result);
    }

    pub fn set_melt_delay(&self, delay: Duration) {
        *self.melt_delay.lock().unwrap() = Some(delay);
    }

    pub fn melt_calls(&self) -> u32 {
        self.melt_call_count.load(Ordering::SeqCst)
    }

    pub fn melt_quote_calls(&self) -> u32 {
        self.melt_quote_call_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl MintWallet for ScriptedWallet {
    fn mint_url(&self) -> &str {
        &self.mint_url
    }

    async fn balance(&self) -> Result<u64, CapabilityError> {
        self.balances
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(0))
    }

    async fn mint_quote(
        &self,
        amount: u64,
        _memo: Option<String>,
    ) -> Result<MintQuoteResponse, CapabilityError> {
        Ok(MintQuoteResponse {
            id: "scripted-quote".to_string(),
            invoice: format!("lnbc{}n1scripted", amount),
            amount,
        })
    }

    async fn mint_quote_state(&self, _quote_id: &str) -> Result<QuoteState, CapabilityError> {
        let queued = self.quote_states.lock().unwrap().pop_front();
        Ok(queued.unwrap_or(*self.default_quote_state.lock().unwrap()))
    }

    async fn mint(&self, _quote_id: &str, _split: SplitPolicy) -> Result<u64, CapabilityError> {
        self.mint_call_count.fetch_add(1, Ordering::SeqCst);
        let delay = *self.mint_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let queued = self.mint_results.lock().unwrap().pop_front();
        queued.unwrap_or_else(|| Ok(*self.mint_amount.lock().unwrap()))
    }

    async fn melt_quote(&self, _invoice: &str) -> Result<MeltQuoteResponse, CapabilityError> {
        self.melt_quote_call_count.fetch_add(1, Ordering::SeqCst);
        let (amount, fee_reserve) = *self.melt_quote.lock().unwrap();
        Ok(MeltQuoteResponse {
            id: "scripted-melt".to_string(),
            amount,
            fee_reserve,
        })
    }

    async fn melt(&self, _quote_id: &str) -> Result<MeltResult, CapabilityError> {
        self.melt_call_count.fetch_add(1, Ordering::SeqCst);
        let delay = *self.melt_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let queued = self.melt_results.lock().unwrap().pop_front();
        queued.unwrap_or_else(|| {
            Ok(MeltResult {
                preimage: Some("00ab".to_string()),
            })
        })
    }
}
