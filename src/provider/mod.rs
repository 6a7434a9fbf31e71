pub mod paper;
pub mod types;

pub use paper::PaperProvider;
pub use types::{
    ExecutionDefaults, ExecutionRequest, ExecutionResult, QuoteRequest, QuoteResult,
};

use async_trait::async_trait;

/// Contract for one concrete execution/quote venue.
///
/// Providers are opaque and interchangeable: the router depends only on
/// this trait, never on venue-specific fields. Failures never escape as
/// panics or `Err` past this boundary; every call returns a well-formed
/// result with `ok = false` on failure. The caller bounds each call with
/// the request's timeout.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    /// Price a swap without side effects. Timeouts, rate limits and
    /// malformed responses come back as `ok = false` with an error.
    async fn quote(&self, req: &QuoteRequest) -> QuoteResult;

    /// Execute a swap. With `simulate_only` the provider quotes and builds
    /// the route but must not broadcast; without signing credentials it
    /// still returns the simulated result with `ok = true`, since
    /// simulate-vs-sign is execution policy, not provider health.
    async fn execute(&self, req: &ExecutionRequest) -> ExecutionResult;

    /// Lightweight liveness probe (e.g. a trivial quote). Must complete
    /// within the caller's bounded timeout and never panic.
    async fn health_check(&self) -> bool;
}

/// Derive the sell request that unwinds a buy: mints swapped, side
/// flipped. Concrete providers without a dedicated sell endpoint call this
/// and reuse their buy path.
pub fn sell_request(req: &ExecutionRequest) -> ExecutionRequest {
    let mut sell = req.clone();
    std::mem::swap(&mut sell.token_in_mint, &mut sell.token_out_mint);
    sell.side = req.side.opposite();
    sell.metadata.insert(
        "original_side".to_string(),
        serde_json::Value::String(req.side.to_string()),
    );
    sell
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Side;

    #[test]
    fn sell_request_swaps_mints_and_flips_side() {
        let req = ExecutionRequest {
            owner_pubkey: "owner".into(),
            token_in_mint: "SOL".into(),
            token_out_mint: "BONK".into(),
            amount_in_atomic: 1_000,
            side: Side::Buy,
            limit_price_usd: None,
            slippage_bps: 50,
            priority_fee_lamports: 0,
            simulate_only: true,
            max_retries: 1,
            timeout_ms: 1_000,
            strategy_name: None,
            confidence: None,
            metadata: Default::default(),
        };

        let sell = sell_request(&req);
        assert_eq!(sell.token_in_mint, "BONK");
        assert_eq!(sell.token_out_mint, "SOL");
        assert_eq!(sell.side, Side::Sell);
        assert_eq!(sell.metadata["original_side"], "buy");
        // Original untouched
        assert_eq!(req.token_in_mint, "SOL");
    }
}
