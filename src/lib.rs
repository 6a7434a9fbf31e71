pub mod data;
pub mod error;
pub mod provider;
pub mod risk;
pub mod router;
pub mod strategy;
pub mod stream;
pub mod utils;

// Re-export commonly used types
pub use data::{Candle, MarketSnapshot, OrderRequest, OrderType, Side, Signal, TokenTick};
pub use error::{ErrorCode, RouteError};
pub use provider::{
    ExecutionDefaults, ExecutionRequest, ExecutionResult, PaperProvider, Provider, QuoteRequest,
    QuoteResult,
};
pub use risk::RiskSizer;
pub use router::{ExecutionRouter, RouterConfig, RoutingStrategy};
pub use strategy::{FilterChain, MovingAverageCross, SignalGenerator};
pub use stream::{
    ObservationStream, OrchestratorConfig, ReplaySource, SimulatedTickSource, StopRule,
    StreamingOrchestrator, TickOutcome,
};
pub use utils::Config;
