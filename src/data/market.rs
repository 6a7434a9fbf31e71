use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Single OHLCV bar.
///
/// Candle sequences are always ordered oldest to newest. The streaming
/// pipeline produces synthetic candles where open = high = low = close,
/// since tick sources only deliver a spot price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub ts: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Candle {
    /// Build a synthetic single-price candle from a tick.
    pub fn from_price(ts: DateTime<Utc>, price: Decimal, volume: Decimal) -> Self {
        Self {
            ts,
            open: price,
            high: price,
            low: price,
            close: price,
            volume,
        }
    }
}

/// Rolling market view for one symbol: the symbol plus its candle history.
///
/// One live snapshot exists per symbol, owned and mutated only by the
/// streaming orchestrator. Strategies and filters receive it by reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub candles: Vec<Candle>,
}

impl MarketSnapshot {
    pub fn new(symbol: impl Into<String>, candles: Vec<Candle>) -> Self {
        Self {
            symbol: symbol.into(),
            candles,
        }
    }

    /// Most recent close, if any history exists.
    pub fn last_close(&self) -> Option<Decimal> {
        self.candles.last().map(|c| c.close)
    }

    /// Closes of the most recent `n` candles, oldest first.
    pub fn recent_closes(&self, n: usize) -> Vec<Decimal> {
        let start = self.candles.len().saturating_sub(n);
        self.candles[start..].iter().map(|c| c.close).collect()
    }
}

/// One observation from a market data stream.
///
/// An absent price is a valid, tolerated value: upstream APIs routinely
/// return pairs without a USD quote and the pipeline drops those ticks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenTick {
    pub symbol: String,
    pub price_usd: Option<Decimal>,
    pub volume_24h_usd: Option<Decimal>,
    pub liquidity_usd: Option<Decimal>,
    pub ts: DateTime<Utc>,
}

impl TokenTick {
    pub fn new(symbol: impl Into<String>, price_usd: Option<Decimal>) -> Self {
        Self {
            symbol: symbol.into(),
            price_usd,
            volume_24h_usd: None,
            liquidity_usd: None,
            ts: Utc::now(),
        }
    }
}
