use crate::data::{Candle, MarketSnapshot, OrderRequest, Side, TokenTick};
use crate::provider::{ExecutionDefaults, ExecutionRequest, ExecutionResult};
use crate::risk::RiskSizer;
use crate::router::ExecutionRouter;
use crate::strategy::{FilterChain, SignalGenerator};
use crate::stream::ObservationStream;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How stop levels are derived from the entry price.
#[derive(Debug, Clone)]
pub enum StopRule {
    /// Fixed fractional distance, e.g. 0.015 puts the stop 1.5% away.
    Percent { stop_pct: Decimal },
    /// Stop distance scales with recent volatility: `width` standard
    /// deviations of close-to-close returns over `lookback` candles,
    /// floored so a dead-quiet market still gets a nonzero stop.
    VolatilityBand { lookback: usize, width: f64 },
}

impl StopRule {
    /// Fractional stop distance for the given snapshot.
    fn stop_fraction(&self, snapshot: &MarketSnapshot) -> Decimal {
        match self {
            StopRule::Percent { stop_pct } => *stop_pct,
            StopRule::VolatilityBand { lookback, width } => {
                let closes: Vec<f64> = snapshot
                    .recent_closes(*lookback)
                    .iter()
                    .filter_map(|c| c.to_f64())
                    .collect();
                let vol = crate::strategy::filters::return_stddev(&closes);
                let fraction = (vol * width).max(0.001);
                Decimal::from_f64_retain(fraction).unwrap_or(Decimal::new(1, 3))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Minimum absolute relative price change, against the last processed
    /// price, for a tick to be worth processing.
    pub price_change_threshold: Decimal,
    /// Bounded candle window per symbol; oldest candles are trimmed.
    pub max_history: usize,
    pub stop_rule: StopRule,
    /// Fractional distance to the take-profit level, recorded on orders.
    pub target_pct: Decimal,
    /// Optional wall-clock cap on the run loop.
    pub max_duration: Option<Duration>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            price_change_threshold: Decimal::new(1, 3), // 0.1%
            max_history: 200,
            stop_rule: StopRule::Percent {
                stop_pct: Decimal::new(15, 3), // 1.5%
            },
            target_pct: Decimal::new(3, 2), // 3%
            max_duration: None,
        }
    }
}

/// Classification of one tick's processing, for logging only. Outcomes
/// never feed back into the state machine for subsequent ticks.
#[derive(Debug)]
pub enum TickOutcome {
    /// Tick carried no price.
    Dropped,
    /// First tick for the symbol; seeds last-price bookkeeping only.
    SuppressedInitial,
    /// Price change below the noise threshold.
    SuppressedNoise,
    /// Blocked by the filter chain.
    Filtered { filter: &'static str },
    /// Signal was flat; nothing to do.
    Flat,
    /// Actionable signal but no executable order came of it.
    Skipped { reason: String },
    /// Order handed to the router.
    Executed { result: ExecutionResult },
    /// Residual per-tick failure; the loop continues.
    Failed { error: String },
}

struct SymbolState {
    candles: VecDeque<Candle>,
    /// Price of the last *processed* tick. Noise-suppressed ticks do not
    /// move this.
    last_price: Option<Decimal>,
}

impl SymbolState {
    fn new() -> Self {
        Self {
            candles: VecDeque::new(),
            last_price: None,
        }
    }
}

/// Drives the full pipeline: tick -> candle history -> signal -> filters
/// -> sizing -> order -> router. Holds the only mutable snapshot state;
/// all other components see immutable views.
pub struct StreamingOrchestrator {
    generator: Box<dyn SignalGenerator>,
    filters: FilterChain,
    sizer: RiskSizer,
    router: Arc<ExecutionRouter>,
    exec_defaults: ExecutionDefaults,
    config: OrchestratorConfig,
    states: HashMap<String, SymbolState>,
    processed: u64,
    executed: u64,
}

impl StreamingOrchestrator {
    pub fn new(
        generator: Box<dyn SignalGenerator>,
        filters: FilterChain,
        sizer: RiskSizer,
        router: Arc<ExecutionRouter>,
        exec_defaults: ExecutionDefaults,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            generator,
            filters,
            sizer,
            router,
            exec_defaults,
            config,
            states: HashMap::new(),
            processed: 0,
            executed: 0,
        }
    }

    /// Equity is caller-maintained between cycles.
    pub fn sizer_mut(&mut self) -> &mut RiskSizer {
        &mut self.sizer
    }

    /// Process one tick end to end. Never panics and never returns an
    /// error: residual failures become `TickOutcome::Failed`.
    pub async fn process_tick(&mut self, tick: &TokenTick) -> TickOutcome {
        // 1. A tick without a price is dropped outright.
        let Some(price) = tick.price_usd else {
            debug!(symbol = %tick.symbol, "tick without price dropped");
            return TickOutcome::Dropped;
        };
        if price <= Decimal::ZERO {
            return TickOutcome::Failed {
                error: format!("non-positive price {price} for {}", tick.symbol),
            };
        }

        let state = self
            .states
            .entry(tick.symbol.clone())
            .or_insert_with(SymbolState::new);

        // 2. First tick seeds the baseline and is otherwise suppressed;
        //    sub-threshold moves are suppressed without touching the
        //    baseline, so drift accumulates until it clears the threshold.
        match state.last_price {
            None => {
                state.last_price = Some(price);
                return TickOutcome::SuppressedInitial;
            }
            Some(last) => {
                let change = ((price - last) / last).abs();
                if change < self.config.price_change_threshold {
                    return TickOutcome::SuppressedNoise;
                }
                state.last_price = Some(price);
            }
        }

        // 3. Append a synthetic candle, trimming the bounded window.
        let volume = tick.volume_24h_usd.unwrap_or(Decimal::ZERO);
        state
            .candles
            .push_back(Candle::from_price(tick.ts, price, volume));
        while state.candles.len() > self.config.max_history {
            state.candles.pop_front();
        }
        let snapshot = MarketSnapshot::new(
            tick.symbol.clone(),
            state.candles.iter().cloned().collect(),
        );
        self.processed += 1;

        // 4. Signal generation.
        let signal = self.generator.generate(&snapshot);

        // 5. Filter chain; a block is an outcome, not an error.
        let verdict = self.filters.evaluate(&snapshot, &signal);
        if !verdict.allowed {
            let filter = verdict.blocked_by.unwrap_or("unknown");
            debug!(symbol = %tick.symbol, side = %signal.side, filter, "signal filtered");
            return TickOutcome::Filtered { filter };
        }

        if signal.side == Side::Flat {
            return TickOutcome::Flat;
        }

        // 6. Stop/target levels and risk-based sizing.
        let stop_fraction = self.config.stop_rule.stop_fraction(&snapshot);
        let (stop, target) = match signal.side {
            Side::Buy => (
                price * (Decimal::ONE - stop_fraction),
                price * (Decimal::ONE + self.config.target_pct),
            ),
            Side::Sell => (
                price * (Decimal::ONE + stop_fraction),
                price * (Decimal::ONE - self.config.target_pct),
            ),
            Side::Flat => unreachable!("flat handled above"),
        };
        let size = self.sizer.size(price, stop);
        if size <= Decimal::ZERO {
            return TickOutcome::Skipped {
                reason: "zero position size".into(),
            };
        }

        // 7. Build the order and hand it to the router.
        let order = match OrderRequest::market(&tick.symbol, signal.side, size) {
            Ok(order) => order
                .with_meta("confidence", json!(signal.confidence))
                .with_meta("entry", json!(price.to_string()))
                .with_meta("stop", json!(stop.to_string()))
                .with_meta("target", json!(target.to_string())),
            Err(err) => {
                return TickOutcome::Failed {
                    error: err.to_string(),
                }
            }
        };

        let request = match ExecutionRequest::from_order(
            &order,
            price,
            Some(signal.confidence),
            Some(self.generator.name()),
            &self.exec_defaults,
        ) {
            Ok(request) => request,
            Err(err) => {
                return TickOutcome::Failed {
                    error: err.to_string(),
                }
            }
        };

        let result = self.router.route(request).await;
        if result.ok {
            self.executed += 1;
        }
        TickOutcome::Executed { result }
    }

    /// Consume the stream until it ends, the shutdown token fires, or the
    /// configured maximum duration elapses. A single tick's failure is
    /// never fatal to the loop.
    pub async fn run(&mut self, source: &mut dyn ObservationStream, shutdown: CancellationToken) {
        let started = tokio::time::Instant::now();
        info!("streaming orchestrator started");

        loop {
            if let Some(max) = self.config.max_duration {
                if started.elapsed() >= max {
                    info!(?max, "maximum run duration reached");
                    break;
                }
            }

            let tick = tokio::select! {
                // Shutdown wins over a ready tick.
                biased;
                _ = shutdown.cancelled() => {
                    info!("shutdown requested, stopping stream");
                    break;
                }
                tick = source.next_tick() => tick,
            };
            let Some(tick) = tick else {
                info!("observation stream ended");
                break;
            };

            match self.process_tick(&tick).await {
                TickOutcome::Executed { result } if result.ok => {
                    info!(
                        symbol = %tick.symbol,
                        provider = %result.provider,
                        tx_sig = result.tx_sig.as_deref().unwrap_or("simulated"),
                        "trade executed"
                    );
                }
                TickOutcome::Executed { result } => {
                    warn!(
                        symbol = %tick.symbol,
                        error = result.error.as_deref().unwrap_or("unknown"),
                        "routing failed"
                    );
                }
                TickOutcome::Filtered { filter } => {
                    debug!(symbol = %tick.symbol, filter, "tick filtered");
                }
                TickOutcome::Failed { error } => {
                    error!(symbol = %tick.symbol, %error, "tick processing failed");
                }
                outcome => {
                    debug!(symbol = %tick.symbol, ?outcome, "tick");
                }
            }
        }

        info!(
            processed = self.processed,
            executed = self.executed,
            "streaming orchestrator stopped"
        );
    }

    pub fn processed_count(&self) -> u64 {
        self.processed
    }

    pub fn executed_count(&self) -> u64 {
        self.executed
    }
}
