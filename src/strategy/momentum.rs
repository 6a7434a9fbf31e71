use crate::data::{MarketSnapshot, Side, Signal};
use crate::strategy::SignalGenerator;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::json;

/// Moving-average crossover generator.
///
/// Short SMA above the long SMA signals buy, below signals sell, equal or
/// insufficient history signals flat. Confidence scales with the
/// normalized separation between the two averages, capped at 1.0.
pub struct MovingAverageCross {
    short_window: usize,
    long_window: usize,
    /// Separation (as a fraction of the long SMA) that maps to full
    /// confidence. 0.05 means a 5% gap is treated as maximal conviction.
    full_confidence_gap: f64,
}

impl MovingAverageCross {
    pub fn new(short_window: usize, long_window: usize) -> Self {
        Self {
            short_window: short_window.max(1),
            long_window: long_window.max(2),
            full_confidence_gap: 0.05,
        }
    }

    fn sma(closes: &[Decimal]) -> Option<f64> {
        if closes.is_empty() {
            return None;
        }
        let sum: Decimal = closes.iter().copied().sum();
        (sum / Decimal::from(closes.len())).to_f64()
    }
}

impl SignalGenerator for MovingAverageCross {
    fn name(&self) -> &'static str {
        "ma_cross"
    }

    fn generate(&mut self, snapshot: &MarketSnapshot) -> Signal {
        if snapshot.candles.len() < self.long_window {
            return Signal::flat(&snapshot.symbol)
                .with_meta("reason", json!("insufficient_history"));
        }

        let short_closes = snapshot.recent_closes(self.short_window);
        let long_closes = snapshot.recent_closes(self.long_window);
        let (Some(short_sma), Some(long_sma)) =
            (Self::sma(&short_closes), Self::sma(&long_closes))
        else {
            return Signal::flat(&snapshot.symbol).with_meta("reason", json!("no_closes"));
        };

        if long_sma <= 0.0 {
            return Signal::flat(&snapshot.symbol).with_meta("reason", json!("degenerate_prices"));
        }

        let gap = (short_sma - long_sma) / long_sma;
        let side = if gap > 0.0 {
            Side::Buy
        } else if gap < 0.0 {
            Side::Sell
        } else {
            Side::Flat
        };
        let confidence = (gap.abs() / self.full_confidence_gap).min(1.0);

        Signal::new(&snapshot.symbol, side, confidence)
            .with_meta("short_sma", json!(short_sma))
            .with_meta("long_sma", json!(long_sma))
            .with_meta("gap", json!(gap))
    }
}
