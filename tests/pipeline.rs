//! End-to-end pipeline tests through the public API: replayed ticks in,
//! routed paper executions out.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use solstream::provider::{ExecutionDefaults, PaperProvider, Provider};
use solstream::risk::RiskSizer;
use solstream::strategy::FilterChain;
use solstream::stream::ReplaySource;
use solstream::{
    ExecutionRouter, MarketSnapshot, OrchestratorConfig, RouterConfig, RoutingStrategy, Side,
    Signal, SignalGenerator, StreamingOrchestrator, TokenTick,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

struct AlwaysBuy;

impl SignalGenerator for AlwaysBuy {
    fn name(&self) -> &'static str {
        "always_buy"
    }
    fn generate(&mut self, snapshot: &MarketSnapshot) -> Signal {
        Signal::new(&snapshot.symbol, Side::Buy, 1.0)
    }
}

fn defaults(simulate_only: bool) -> ExecutionDefaults {
    ExecutionDefaults {
        owner_pubkey: "owner".into(),
        quote_mint: "SOL".into(),
        atomic_decimals: 6,
        slippage_bps: 100,
        priority_fee_lamports: 0,
        simulate_only,
        max_retries: 1,
        timeout_ms: 5_000,
    }
}

fn router_with(providers: Vec<Arc<dyn Provider>>, strategy: RoutingStrategy) -> Arc<ExecutionRouter> {
    Arc::new(
        ExecutionRouter::new(
            providers,
            RouterConfig {
                strategy,
                ..RouterConfig::default()
            },
        )
        .expect("at least one provider"),
    )
}

fn paper(name: &str, impact_bps: u32) -> Arc<PaperProvider> {
    let p = Arc::new(PaperProvider::new(name, Duration::ZERO, impact_bps));
    p.set_price("SOL", Decimal::ONE);
    p.set_price("BONK", dec!(1));
    p.deposit("SOL", u64::MAX / 2);
    p
}

fn orchestrator(
    router: Arc<ExecutionRouter>,
    simulate_only: bool,
) -> StreamingOrchestrator {
    StreamingOrchestrator::new(
        Box::new(AlwaysBuy),
        FilterChain::empty(),
        RiskSizer::new(dec!(10000), dec!(0.01)),
        router,
        defaults(simulate_only),
        OrchestratorConfig {
            price_change_threshold: dec!(0.01),
            ..OrchestratorConfig::default()
        },
    )
}

fn ticks(prices: &[Decimal]) -> ReplaySource {
    ReplaySource::new(
        prices
            .iter()
            .map(|p| TokenTick::new("BONK", Some(*p)))
            .collect(),
    )
}

#[tokio::test]
async fn replayed_ticks_produce_one_execution_per_threshold_move() {
    let provider = paper("paper", 0);
    let router = router_with(vec![provider.clone()], RoutingStrategy::FirstSuccess);
    let mut orch = orchestrator(router, false);

    // Seed, one 3% move, one sub-threshold wiggle, one more 2% move.
    let mut source = ticks(&[dec!(1.00), dec!(1.03), dec!(1.032), dec!(1.051)]);
    orch.run(&mut source, CancellationToken::new()).await;

    assert_eq!(orch.processed_count(), 2);
    assert_eq!(orch.executed_count(), 2);
    assert_eq!(provider.fill_count(), 2);
}

#[tokio::test]
async fn simulate_only_runs_never_broadcast() {
    let provider = paper("paper", 0);
    let router = router_with(vec![provider.clone()], RoutingStrategy::FirstSuccess);
    let mut orch = orchestrator(router, true);

    let mut source = ticks(&[dec!(1.00), dec!(1.05)]);
    orch.run(&mut source, CancellationToken::new()).await;

    assert_eq!(orch.executed_count(), 1);
    assert_eq!(provider.fill_count(), 0);
}

#[tokio::test]
async fn best_price_routing_picks_the_lower_impact_venue() {
    let worse = paper("worse", 50);
    let better = paper("better", 5);
    let router = router_with(
        vec![worse.clone(), better.clone()],
        RoutingStrategy::BestPrice,
    );
    let mut orch = orchestrator(router, false);

    let mut source = ticks(&[dec!(1.00), dec!(1.05)]);
    orch.run(&mut source, CancellationToken::new()).await;

    assert_eq!(better.fill_count(), 1);
    assert_eq!(worse.fill_count(), 0);
}

#[tokio::test]
async fn unhealthy_venue_is_routed_around() {
    let down = paper("down", 0);
    down.set_healthy(false);
    let up = paper("up", 0);
    let router = router_with(vec![down.clone(), up.clone()], RoutingStrategy::FirstSuccess);
    let mut orch = orchestrator(router, false);

    let mut source = ticks(&[dec!(1.00), dec!(1.05)]);
    orch.run(&mut source, CancellationToken::new()).await;

    assert_eq!(up.fill_count(), 1);
    assert_eq!(down.fill_count(), 0);
}

#[tokio::test]
async fn cancelled_token_stops_the_run_loop_immediately() {
    let provider = paper("paper", 0);
    let router = router_with(vec![provider], RoutingStrategy::FirstSuccess);
    let mut orch = orchestrator(router, false);

    let shutdown = CancellationToken::new();
    shutdown.cancel();
    let mut source = ticks(&[dec!(1.00), dec!(1.05)]);
    orch.run(&mut source, shutdown).await;

    assert_eq!(orch.processed_count(), 0);
}
