use ecash_wallet_engine::capability::QuoteState;
use ecash_wallet_engine::capability::memory::{MemoryBackend, MemoryBackendConfig};
use ecash_wallet_engine::wallet::{
    AutoConfirm, EngineConfig, WalletError, WalletEvent, WalletEventHandler, WalletOrchestrator,
};

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Logs every engine event. A real embedder would refresh its UI here.
struct LoggingHandler;

#[async_trait::async_trait]
impl WalletEventHandler for LoggingHandler {
    async fn handle(&mut self, event: &WalletEvent) -> Result<(), WalletError> {
        info!("event: {:?}", event);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "LoggingHandler"
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_target(false)
        .init();

    info!("Starting wallet engine demo against the simulated mint");

    let backend = Arc::new(MemoryBackend::new(MemoryBackendConfig::default()));
    let config = EngineConfig::new("./wallet-data".into());
    let engine = WalletOrchestrator::init(config, backend, Arc::new(AutoConfirm))
        .await
        .expect("engine init failed");
    engine.subscribe(Box::new(LoggingHandler)).await;

    let mint = engine
        .add_mint("https://mint.demo.example.org")
        .await
        .expect("add mint failed");
    engine.create_wallet().await.expect("wallet creation failed");

    let session = engine
        .receive(100, Some("demo receive".to_string()))
        .await
        .expect("receive failed")
        .completed()
        .expect("a mint is active");
    info!("Pay this invoice: {}", session.quote().invoice);

    while !session.state().is_terminal() {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(session.state(), QuoteState::Issued);
    info!("Received; balance is now {} sat", engine.cached_balance(&mint));

    let outcome = engine
        .send("lnbc40n1demo")
        .await
        .expect("send failed")
        .completed()
        .expect("a mint is active");
    info!("Send outcome: {:?}", outcome);

    for record in engine.balances() {
        info!("{}: {} sat", record.mint_url, record.amount);
    }
    engine.shutdown();
}
