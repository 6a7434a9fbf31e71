use crate::data::{MarketSnapshot, Side, Signal};
use chrono::{Timelike, Utc};
use rust_decimal::prelude::ToPrimitive;

/// Pre-trade gate over (snapshot, signal).
///
/// Each filter is an independent boolean predicate. A filter may hold
/// rolling internal state of its own but must not mutate the snapshot or
/// the signal. Whether a flat signal passes is per-filter policy, not a
/// chain rule.
pub trait PreTradeFilter: Send {
    fn name(&self) -> &'static str;

    fn allow(&mut self, snapshot: &MarketSnapshot, signal: &Signal) -> bool;
}

/// Outcome of running a signal through the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterVerdict {
    pub allowed: bool,
    /// First filter that blocked, for diagnostics only. Filter order
    /// never changes the allow/block outcome, only which name lands here.
    pub blocked_by: Option<&'static str>,
}

impl FilterVerdict {
    fn allowed() -> Self {
        Self {
            allowed: true,
            blocked_by: None,
        }
    }
}

/// Ordered set of independent filters combined with pure AND: a signal is
/// allowed iff every filter allows it.
pub struct FilterChain {
    filters: Vec<Box<dyn PreTradeFilter>>,
}

impl FilterChain {
    pub fn new(filters: Vec<Box<dyn PreTradeFilter>>) -> Self {
        Self { filters }
    }

    pub fn empty() -> Self {
        Self { filters: vec![] }
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn evaluate(&mut self, snapshot: &MarketSnapshot, signal: &Signal) -> FilterVerdict {
        for filter in &mut self.filters {
            if !filter.allow(snapshot, signal) {
                return FilterVerdict {
                    allowed: false,
                    blocked_by: Some(filter.name()),
                };
            }
        }
        FilterVerdict::allowed()
    }
}

/// Standard deviation of close-to-close returns over the given closes.
/// Zero with fewer than two usable closes. Shared by the volatility filter
/// and volatility-band stop derivation so the two cannot drift.
pub(crate) fn return_stddev(closes: &[f64]) -> f64 {
    if closes.len() < 2 {
        return 0.0;
    }
    let returns: Vec<f64> = closes
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect();
    if returns.is_empty() {
        return 0.0;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
    variance.sqrt()
}

/// Blocks signals below a minimum confidence. Flat signals always pass.
pub struct ConfidenceFilter {
    min_confidence: f64,
}

impl ConfidenceFilter {
    pub fn new(min_confidence: f64) -> Self {
        Self { min_confidence }
    }
}

impl PreTradeFilter for ConfidenceFilter {
    fn name(&self) -> &'static str {
        "confidence"
    }

    fn allow(&mut self, _snapshot: &MarketSnapshot, signal: &Signal) -> bool {
        if signal.side == Side::Flat {
            return true;
        }
        signal.confidence >= self.min_confidence
    }
}

/// Blocks signals when recent volatility (stddev of close-to-close
/// returns over the lookback) is below a floor. Flat signals always pass.
pub struct VolatilityFilter {
    min_volatility: f64,
    lookback: usize,
}

impl VolatilityFilter {
    pub fn new(min_volatility: f64, lookback: usize) -> Self {
        Self {
            min_volatility,
            lookback: lookback.max(2),
        }
    }

    fn volatility(&self, snapshot: &MarketSnapshot) -> f64 {
        let closes: Vec<f64> = snapshot
            .recent_closes(self.lookback)
            .iter()
            .filter_map(|c| c.to_f64())
            .collect();
        return_stddev(&closes)
    }
}

impl PreTradeFilter for VolatilityFilter {
    fn name(&self) -> &'static str {
        "volatility"
    }

    fn allow(&mut self, snapshot: &MarketSnapshot, signal: &Signal) -> bool {
        if signal.side == Side::Flat {
            return true;
        }
        self.volatility(snapshot) >= self.min_volatility
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trend {
    Up,
    Down,
    Neutral,
}

/// Blocks counter-trend signals: buys in a downtrend, sells in an
/// uptrend. A neutral trend passes everything, as do flat signals.
pub struct TrendFilter {
    trend_window: usize,
    /// Fractional move over the window that qualifies as a trend.
    band: f64,
}

impl TrendFilter {
    pub fn new(trend_window: usize) -> Self {
        Self {
            trend_window: trend_window.max(2),
            band: 0.02,
        }
    }

    fn trend(&self, snapshot: &MarketSnapshot) -> Trend {
        let closes = snapshot.recent_closes(self.trend_window);
        if closes.len() < self.trend_window {
            return Trend::Neutral;
        }
        let (Some(past), Some(current)) = (
            closes.first().and_then(|c| c.to_f64()),
            closes.last().and_then(|c| c.to_f64()),
        ) else {
            return Trend::Neutral;
        };
        if past <= 0.0 {
            return Trend::Neutral;
        }

        let change = (current - past) / past;
        if change > self.band {
            Trend::Up
        } else if change < -self.band {
            Trend::Down
        } else {
            Trend::Neutral
        }
    }
}

impl PreTradeFilter for TrendFilter {
    fn name(&self) -> &'static str {
        "trend"
    }

    fn allow(&mut self, snapshot: &MarketSnapshot, signal: &Signal) -> bool {
        match (self.trend(snapshot), signal.side) {
            (_, Side::Flat) => true,
            (Trend::Neutral, _) => true,
            (Trend::Up, side) => side == Side::Buy,
            (Trend::Down, side) => side == Side::Sell,
        }
    }
}

/// Restricts trading to a UTC hour window `[start, end)`.
pub struct TradingHoursFilter {
    start_hour_utc: u32,
    end_hour_utc: u32,
}

impl TradingHoursFilter {
    pub fn new(start_hour_utc: u32, end_hour_utc: u32) -> Self {
        Self {
            start_hour_utc,
            end_hour_utc: end_hour_utc.min(24),
        }
    }

    fn allows_hour(&self, hour: u32) -> bool {
        self.start_hour_utc <= hour && hour < self.end_hour_utc
    }
}

impl PreTradeFilter for TradingHoursFilter {
    fn name(&self) -> &'static str {
        "trading_hours"
    }

    fn allow(&mut self, _snapshot: &MarketSnapshot, _signal: &Signal) -> bool {
        self.allows_hour(Utc::now().hour())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Candle;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    struct Fixed {
        name: &'static str,
        verdict: bool,
    }

    impl PreTradeFilter for Fixed {
        fn name(&self) -> &'static str {
            self.name
        }
        fn allow(&mut self, _snapshot: &MarketSnapshot, _signal: &Signal) -> bool {
            self.verdict
        }
    }

    fn fixed(name: &'static str, verdict: bool) -> Box<dyn PreTradeFilter> {
        Box::new(Fixed { name, verdict })
    }

    fn snapshot(closes: &[Decimal]) -> MarketSnapshot {
        let candles = closes
            .iter()
            .map(|&c| Candle::from_price(Utc::now(), c, Decimal::ZERO))
            .collect();
        MarketSnapshot::new("BONK", candles)
    }

    #[test]
    fn any_false_filter_blocks_regardless_of_order() {
        let snap = snapshot(&[dec!(1)]);
        let signal = Signal::new("BONK", Side::Buy, 0.9);

        let mut chain_a = FilterChain::new(vec![
            fixed("f1", true),
            fixed("f2", false),
            fixed("f3", true),
        ]);
        let mut chain_b = FilterChain::new(vec![
            fixed("f2", false),
            fixed("f1", true),
            fixed("f3", true),
        ]);

        let a = chain_a.evaluate(&snap, &signal);
        let b = chain_b.evaluate(&snap, &signal);
        assert!(!a.allowed);
        assert!(!b.allowed);
        // Order changes only the diagnostic, never the outcome.
        assert_eq!(a.blocked_by, Some("f2"));
        assert_eq!(b.blocked_by, Some("f2"));
    }

    #[test]
    fn all_true_filters_allow() {
        let snap = snapshot(&[dec!(1)]);
        let signal = Signal::new("BONK", Side::Buy, 0.9);
        let mut chain = FilterChain::new(vec![fixed("f1", true), fixed("f2", true)]);
        assert_eq!(chain.evaluate(&snap, &signal), FilterVerdict::allowed());
    }

    #[test]
    fn empty_chain_allows_everything() {
        let snap = snapshot(&[]);
        let mut chain = FilterChain::empty();
        assert!(chain.evaluate(&snap, &Signal::flat("BONK")).allowed);
    }

    #[test]
    fn confidence_filter_blocks_weak_signals_but_passes_flat() {
        let snap = snapshot(&[dec!(1)]);
        let mut filter = ConfidenceFilter::new(0.6);

        assert!(!filter.allow(&snap, &Signal::new("BONK", Side::Buy, 0.5)));
        assert!(filter.allow(&snap, &Signal::new("BONK", Side::Buy, 0.6)));
        assert!(filter.allow(&snap, &Signal::flat("BONK")));
    }

    #[test]
    fn return_stddev_known_values() {
        assert_eq!(return_stddev(&[]), 0.0);
        assert_eq!(return_stddev(&[1.0]), 0.0);
        assert_eq!(return_stddev(&[1.0, 1.0, 1.0]), 0.0);
        // Returns 0.1 and -0.1: mean 0, stddev 0.1.
        assert!((return_stddev(&[1.0, 1.1, 0.99]) - 0.1).abs() < 1e-9);
    }

    #[test]
    fn volatility_filter_blocks_quiet_markets() {
        let quiet = snapshot(&[dec!(1), dec!(1), dec!(1), dec!(1)]);
        let busy = snapshot(&[dec!(1), dec!(1.1), dec!(0.9), dec!(1.2)]);
        let signal = Signal::new("BONK", Side::Buy, 0.9);
        let mut filter = VolatilityFilter::new(0.01, 10);

        assert!(!filter.allow(&quiet, &signal));
        assert!(filter.allow(&busy, &signal));
    }

    #[test]
    fn trend_filter_blocks_counter_trend() {
        // 10% up move over the window
        let uptrend = snapshot(&[dec!(1.0), dec!(1.02), dec!(1.05), dec!(1.1)]);
        let mut filter = TrendFilter::new(4);

        assert!(filter.allow(&uptrend, &Signal::new("BONK", Side::Buy, 0.9)));
        assert!(!filter.allow(&uptrend, &Signal::new("BONK", Side::Sell, 0.9)));
        assert!(filter.allow(&uptrend, &Signal::flat("BONK")));
    }

    #[test]
    fn trend_filter_is_neutral_without_history() {
        let thin = snapshot(&[dec!(1.0)]);
        let mut filter = TrendFilter::new(50);
        assert!(filter.allow(&thin, &Signal::new("BONK", Side::Sell, 0.9)));
    }

    #[test]
    fn trading_hours_window() {
        let filter = TradingHoursFilter::new(8, 16);
        assert!(!filter.allows_hour(7));
        assert!(filter.allows_hour(8));
        assert!(filter.allows_hour(15));
        assert!(!filter.allows_hour(16));

        let all_day = TradingHoursFilter::new(0, 24);
        assert!(all_day.allows_hour(0));
        assert!(all_day.allows_hour(23));
    }
}
