use crate::data::TokenTick;
use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tracing::debug;

/// Asynchronous source of market observations: one tick per tracked
/// symbol per polling interval. A tick without a price is valid output.
#[async_trait]
pub trait ObservationStream: Send {
    /// Next tick, or `None` when the stream is exhausted.
    async fn next_tick(&mut self) -> Option<TokenTick>;
}

/// Replays a fixed sequence of ticks. Used by tests and dry runs.
pub struct ReplaySource {
    ticks: VecDeque<TokenTick>,
}

impl ReplaySource {
    pub fn new(ticks: Vec<TokenTick>) -> Self {
        Self {
            ticks: ticks.into(),
        }
    }
}

#[async_trait]
impl ObservationStream for ReplaySource {
    async fn next_tick(&mut self) -> Option<TokenTick> {
        self.ticks.pop_front()
    }
}

/// Random-walk tick generator for paper trading.
///
/// Cycles through the configured symbols on an interval, with a small
/// randomized delay between symbols as a stand-in for the rate-limit
/// courtesy a live poller applies between per-token API calls.
pub struct SimulatedTickSource {
    symbols: Vec<String>,
    interval: Duration,
    jitter: Duration,
    /// Per-step volatility of the walk, as a fraction of price.
    step_volatility: f64,
    /// Probability that a tick arrives without a price.
    missing_price_prob: f64,
    prices: HashMap<String, f64>,
    cursor: usize,
}

impl SimulatedTickSource {
    pub fn new(symbols: Vec<String>, initial_price: f64, interval: Duration) -> Self {
        let prices = symbols
            .iter()
            .map(|s| (s.clone(), initial_price))
            .collect();
        Self {
            symbols,
            interval,
            jitter: Duration::from_millis(50),
            step_volatility: 0.02,
            missing_price_prob: 0.02,
            prices,
            cursor: 0,
        }
    }

    pub fn with_volatility(mut self, step_volatility: f64) -> Self {
        self.step_volatility = step_volatility;
        self
    }

    fn step_price(&mut self, symbol: &str) -> f64 {
        let mut rng = rand::thread_rng();
        let drift: f64 = rng.gen_range(-1.0..1.0) * self.step_volatility;
        let price = self
            .prices
            .get_mut(symbol)
            .expect("symbol registered at construction");
        *price = (*price * (1.0 + drift)).max(f64::MIN_POSITIVE);
        *price
    }
}

#[async_trait]
impl ObservationStream for SimulatedTickSource {
    async fn next_tick(&mut self) -> Option<TokenTick> {
        if self.symbols.is_empty() {
            return None;
        }

        // Full interval at the top of each cycle, jitter between symbols.
        if self.cursor == 0 {
            tokio::time::sleep(self.interval).await;
        } else {
            let jitter_ms = rand::thread_rng().gen_range(0..=self.jitter.as_millis() as u64);
            tokio::time::sleep(Duration::from_millis(jitter_ms)).await;
        }

        let symbol = self.symbols[self.cursor].clone();
        self.cursor = (self.cursor + 1) % self.symbols.len();

        let missing = rand::thread_rng().gen_bool(self.missing_price_prob);
        let price = if missing {
            debug!(%symbol, "simulated tick without price");
            None
        } else {
            Decimal::from_f64_retain(self.step_price(&symbol))
        };

        Some(TokenTick {
            symbol,
            price_usd: price,
            volume_24h_usd: Some(Decimal::from(1_000_000)),
            liquidity_usd: Some(Decimal::from(250_000)),
            ts: Utc::now(),
        })
    }
}
