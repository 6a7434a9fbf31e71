use solstream::provider::{PaperProvider, Provider};
use solstream::strategy::MovingAverageCross;
use solstream::stream::SimulatedTickSource;
use solstream::utils::{init_from_config, Config};
use solstream::{ExecutionRouter, StreamingOrchestrator};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let config = Config::load()?;
    init_from_config(&config.logging)?;

    info!(environment = %config.general.environment, "starting paper trader");

    // Paper providers with differing latency and price impact so the
    // routing strategies have something real to choose between.
    let fast = Arc::new(PaperProvider::new("fast-paper", Duration::from_millis(20), 35));
    let deep = Arc::new(PaperProvider::new("deep-paper", Duration::from_millis(80), 10));
    let flaky = Arc::new(PaperProvider::new("flaky-paper", Duration::from_millis(40), 20));

    let initial = Decimal::from_f64_retain(config.stream.initial_price)
        .ok_or_else(|| anyhow::anyhow!("initial_price is not a valid decimal"))?;
    for provider in [&fast, &deep, &flaky] {
        provider.set_price(&config.execution.quote_mint, Decimal::ONE);
        for symbol in &config.stream.symbols {
            provider.set_price(symbol, initial);
        }
        provider.deposit(&config.execution.quote_mint, u64::MAX / 2);
    }

    let providers: Vec<Arc<dyn Provider>> = vec![fast, deep, flaky];
    let router = Arc::new(ExecutionRouter::new(
        providers,
        config.router.router_config(),
    )?);

    let generator = MovingAverageCross::new(
        config.strategy.short_window,
        config.strategy.long_window,
    );

    let mut orchestrator = StreamingOrchestrator::new(
        Box::new(generator),
        config.filters.build_chain(),
        config.risk.sizer(),
        Arc::clone(&router),
        config.execution.defaults(),
        config.orchestrator_config(),
    );

    let mut source = SimulatedTickSource::new(
        config.stream.symbols.clone(),
        config.stream.initial_price,
        Duration::from_millis(config.stream.tick_interval_ms),
    );

    let shutdown = CancellationToken::new();
    let ctrl_c_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("ctrl-c received, shutting down");
            ctrl_c_token.cancel();
        }
    });

    info!(
        symbols = ?config.stream.symbols,
        strategy = %config.router.strategy.as_str(),
        "pipeline initialized, consuming ticks"
    );

    orchestrator.run(&mut source, shutdown).await;

    info!(
        processed = orchestrator.processed_count(),
        executed = orchestrator.executed_count(),
        "paper trader finished"
    );
    Ok(())
}
