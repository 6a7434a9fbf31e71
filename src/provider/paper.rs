use crate::data::Side;
use crate::error::RouteError;
use crate::provider::types::{ExecutionRequest, ExecutionResult, QuoteRequest, QuoteResult};
use crate::provider::Provider;
use async_trait::async_trait;
use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};

/// In-process paper venue.
///
/// Fills against a static synthetic price book with configurable latency
/// and price impact, and keeps an atomic-unit balance ledger so fills are
/// observable in tests and paper runs. Quoting never touches the ledger.
pub struct PaperProvider {
    name: String,
    latency: Duration,
    impact_bps: u32,
    healthy: AtomicBool,
    /// USD price per whole token, keyed by mint.
    prices: Mutex<HashMap<String, Decimal>>,
    /// Atomic-unit balances, keyed by mint.
    balances: Mutex<HashMap<String, u64>>,
    fills: AtomicU64,
}

impl PaperProvider {
    pub fn new(name: impl Into<String>, latency: Duration, impact_bps: u32) -> Self {
        Self {
            name: name.into(),
            latency,
            impact_bps,
            healthy: AtomicBool::new(true),
            prices: Mutex::new(HashMap::new()),
            balances: Mutex::new(HashMap::new()),
            fills: AtomicU64::new(0),
        }
    }

    pub fn set_price(&self, mint: &str, price_usd: Decimal) {
        self.prices
            .lock()
            .expect("price book poisoned")
            .insert(mint.to_string(), price_usd);
    }

    pub fn deposit(&self, mint: &str, amount_atomic: u64) {
        *self
            .balances
            .lock()
            .expect("ledger poisoned")
            .entry(mint.to_string())
            .or_insert(0) += amount_atomic;
    }

    pub fn balance(&self, mint: &str) -> u64 {
        self.balances
            .lock()
            .expect("ledger poisoned")
            .get(mint)
            .copied()
            .unwrap_or(0)
    }

    pub fn fill_count(&self) -> u64 {
        self.fills.load(Ordering::Relaxed)
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Relaxed);
    }

    fn price_of(&self, mint: &str) -> Option<Decimal> {
        self.prices
            .lock()
            .expect("price book poisoned")
            .get(mint)
            .copied()
    }

    /// Output amount for a swap at book prices, net of simulated impact.
    fn quote_amount_out(&self, req: &QuoteRequest) -> Result<(u64, Decimal), RouteError> {
        let price_in = self
            .price_of(&req.token_in_mint)
            .ok_or_else(|| RouteError::QuoteRejected {
                provider: self.name.clone(),
                reason: format!("no market for {}", req.token_in_mint),
            })?;
        let price_out = self
            .price_of(&req.token_out_mint)
            .ok_or_else(|| RouteError::QuoteRejected {
                provider: self.name.clone(),
                reason: format!("no market for {}", req.token_out_mint),
            })?;
        if price_out <= Decimal::ZERO {
            return Err(RouteError::QuoteRejected {
                provider: self.name.clone(),
                reason: format!("non-positive price for {}", req.token_out_mint),
            });
        }

        let gross = Decimal::from(req.amount_in_atomic) * price_in / price_out;
        let impact = Decimal::from(self.impact_bps) / dec!(10000);
        let net = gross * (Decimal::ONE - impact);
        let amount_out = net.trunc().to_u64().ok_or_else(|| RouteError::QuoteRejected {
            provider: self.name.clone(),
            reason: "amount out of range".into(),
        })?;
        Ok((amount_out, price_out))
    }

    fn pseudo_tx_sig() -> String {
        let mut rng = rand::thread_rng();
        (0..64)
            .map(|_| {
                let c: u8 = rng.gen_range(0..16);
                char::from_digit(c as u32, 16).unwrap_or('0')
            })
            .collect()
    }

    /// Move atomic balances for a fill. Fails without mutating anything
    /// when the input balance is short.
    fn settle(&self, req: &ExecutionRequest, amount_out: u64) -> Result<(), RouteError> {
        let mut ledger = self.balances.lock().expect("ledger poisoned");
        let held = ledger.get(&req.token_in_mint).copied().unwrap_or(0);
        if held < req.amount_in_atomic {
            return Err(RouteError::QuoteRejected {
                provider: self.name.clone(),
                reason: format!(
                    "insufficient {} balance: have {held}, need {}",
                    req.token_in_mint, req.amount_in_atomic
                ),
            });
        }
        *ledger.entry(req.token_in_mint.clone()).or_insert(0) -= req.amount_in_atomic;
        *ledger.entry(req.token_out_mint.clone()).or_insert(0) += amount_out;
        Ok(())
    }
}

#[async_trait]
impl Provider for PaperProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn quote(&self, req: &QuoteRequest) -> QuoteResult {
        tokio::time::sleep(self.latency).await;

        match self.quote_amount_out(req) {
            Ok((amount_out, price_out)) => QuoteResult {
                ok: true,
                provider: self.name.clone(),
                price_usd: Some(price_out),
                amount_out: Some(amount_out),
                route_id: Some(format!("{}-paper-route", self.name)),
                impact_bps: Some(self.impact_bps),
                fee_usd: None,
                error: None,
                raw: Some(json!({ "venue": "paper", "impact_bps": self.impact_bps })),
            },
            Err(err) => QuoteResult::failure(&self.name, err.to_string()),
        }
    }

    async fn execute(&self, req: &ExecutionRequest) -> ExecutionResult {
        let started = std::time::Instant::now();
        tokio::time::sleep(self.latency).await;

        let (amount_out, price_out) = match self.quote_amount_out(&req.quote_request()) {
            Ok(q) => q,
            Err(err) => return ExecutionResult::failure(&self.name, &err),
        };

        if let Some(limit) = req.limit_price_usd {
            if req.side == Side::Buy && price_out > limit {
                let err = RouteError::QuoteRejected {
                    provider: self.name.clone(),
                    reason: format!("price {price_out} above limit {limit}"),
                };
                return ExecutionResult::failure(&self.name, &err);
            }
        }

        let route_id = format!("{}-paper-route", self.name);
        if req.simulate_only {
            debug!(provider = %self.name, "simulate-only fill, nothing broadcast");
            return ExecutionResult::simulated(&self.name)
                .with_price(price_out, amount_out)
                .with_route(route_id)
                .with_duration(started.elapsed().as_millis() as u64);
        }

        if let Err(err) = self.settle(req, amount_out) {
            return ExecutionResult::failure(&self.name, &err);
        }
        self.fills.fetch_add(1, Ordering::Relaxed);
        let tx_sig = Self::pseudo_tx_sig();
        info!(provider = %self.name, %tx_sig, amount_out, "paper fill settled");

        ExecutionResult::broadcast(&self.name, tx_sig)
            .with_price(price_out, amount_out)
            .with_route(route_id)
            .with_duration(started.elapsed().as_millis() as u64)
    }

    async fn health_check(&self) -> bool {
        tokio::time::sleep(self.latency).await;
        self.healthy.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Side;

    fn provider() -> PaperProvider {
        let p = PaperProvider::new("paper", Duration::ZERO, 0);
        p.set_price("SOL", dec!(100));
        p.set_price("BONK", dec!(0.5));
        p
    }

    fn exec_request(simulate_only: bool) -> ExecutionRequest {
        ExecutionRequest {
            owner_pubkey: "owner".into(),
            token_in_mint: "SOL".into(),
            token_out_mint: "BONK".into(),
            amount_in_atomic: 1_000,
            side: Side::Buy,
            limit_price_usd: None,
            slippage_bps: 100,
            priority_fee_lamports: 0,
            simulate_only,
            max_retries: 1,
            timeout_ms: 1_000,
            strategy_name: None,
            confidence: None,
            metadata: Default::default(),
        }
    }

    #[tokio::test]
    async fn quote_is_idempotent_and_read_only() {
        let p = provider();
        p.deposit("SOL", 5_000);
        let req = QuoteRequest {
            token_in_mint: "SOL".into(),
            token_out_mint: "BONK".into(),
            amount_in_atomic: 1_000,
            slippage_bps: 100,
        };

        let first = p.quote(&req).await;
        let second = p.quote(&req).await;

        assert!(first.ok && second.ok);
        assert_eq!(first.amount_out, second.amount_out);
        // No balance mutation from quoting
        assert_eq!(p.balance("SOL"), 5_000);
        assert_eq!(p.balance("BONK"), 0);
        assert_eq!(p.fill_count(), 0);
    }

    #[tokio::test]
    async fn simulate_only_never_broadcasts() {
        let p = provider();
        p.deposit("SOL", 5_000);

        let result = p.execute(&exec_request(true)).await;

        assert!(result.ok);
        assert!(result.tx_sig.is_none());
        assert_eq!(p.balance("SOL"), 5_000);
        assert_eq!(p.fill_count(), 0);
    }

    #[tokio::test]
    async fn live_fill_settles_and_signs() {
        let p = provider();
        p.deposit("SOL", 5_000);

        let result = p.execute(&exec_request(false)).await;

        assert!(result.ok);
        assert_eq!(result.tx_sig.as_ref().map(String::len), Some(64));
        // 1000 atomic SOL at 100/0.5 = 200000 atomic BONK
        assert_eq!(result.amount_out, Some(200_000));
        assert_eq!(p.balance("SOL"), 4_000);
        assert_eq!(p.balance("BONK"), 200_000);
        assert_eq!(p.fill_count(), 1);
    }

    #[tokio::test]
    async fn insufficient_balance_fails_without_mutation() {
        let p = provider();
        p.deposit("SOL", 10);

        let result = p.execute(&exec_request(false)).await;

        assert!(!result.ok);
        assert!(result.error.as_deref().unwrap().contains("insufficient"));
        assert_eq!(p.balance("SOL"), 10);
        assert_eq!(p.fill_count(), 0);
    }

    #[tokio::test]
    async fn unknown_market_rejects_quote() {
        let p = provider();
        let req = QuoteRequest {
            token_in_mint: "SOL".into(),
            token_out_mint: "UNKNOWN".into(),
            amount_in_atomic: 1_000,
            slippage_bps: 100,
        };
        let result = p.quote(&req).await;
        assert!(!result.ok);
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn buy_limit_price_is_enforced() {
        let p = provider();
        p.deposit("SOL", 5_000);
        let mut req = exec_request(true);
        req.limit_price_usd = Some(dec!(0.4)); // book price for BONK is 0.5

        let result = p.execute(&req).await;
        assert!(!result.ok);
        assert!(result.error.as_deref().unwrap().contains("above limit"));
    }
}
