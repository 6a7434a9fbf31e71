pub mod filters;
pub mod momentum;

pub use filters::{
    ConfidenceFilter, FilterChain, FilterVerdict, PreTradeFilter, TradingHoursFilter, TrendFilter,
    VolatilityFilter,
};
pub use momentum::MovingAverageCross;

use crate::data::{MarketSnapshot, Signal};

/// Contract a signal generator must satisfy: one snapshot in, one signal
/// out. Generators may hold rolling internal state but never mutate the
/// snapshot.
pub trait SignalGenerator: Send {
    fn name(&self) -> &'static str;

    fn generate(&mut self, snapshot: &MarketSnapshot) -> Signal;
}
