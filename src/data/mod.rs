pub mod market;
pub mod order;
pub mod signal;

pub use market::{Candle, MarketSnapshot, TokenTick};
pub use order::{OrderRequest, OrderType};
pub use signal::{Side, Signal};
