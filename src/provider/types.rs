use crate::data::{OrderRequest, OrderType, Side};
use crate::error::{ErrorCode, RouteError};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Request for a price quote. Quoting is read-only: it must never mutate
/// balances or any provider-observable state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub token_in_mint: String,
    pub token_out_mint: String,
    /// Amount in atomic units of the input token (lamports for SOL).
    pub amount_in_atomic: u64,
    /// Slippage tolerance in basis points (100 = 1%).
    pub slippage_bps: u32,
}

/// Quote outcome from one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteResult {
    pub ok: bool,
    pub provider: String,
    pub price_usd: Option<Decimal>,
    pub amount_out: Option<u64>,
    /// Opaque identifier for the route the provider will honor.
    pub route_id: Option<String>,
    pub impact_bps: Option<u32>,
    pub fee_usd: Option<Decimal>,
    pub error: Option<String>,
    pub raw: Option<Value>,
}

impl QuoteResult {
    pub fn failure(provider: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            ok: false,
            provider: provider.into(),
            price_usd: None,
            amount_out: None,
            route_id: None,
            impact_bps: None,
            fee_usd: None,
            error: Some(error.into()),
            raw: None,
        }
    }
}

/// Full execution request handed to a provider: the order fields plus
/// ownership, safety, and observability context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub owner_pubkey: String,
    pub token_in_mint: String,
    pub token_out_mint: String,
    /// Must be positive; validated by the router before any provider call.
    pub amount_in_atomic: u64,
    pub side: Side,
    pub limit_price_usd: Option<Decimal>,
    pub slippage_bps: u32,
    pub priority_fee_lamports: u64,
    /// When true, providers build the route and quote but never broadcast,
    /// regardless of capability or credentials.
    pub simulate_only: bool,
    pub max_retries: u32,
    pub timeout_ms: u64,
    pub strategy_name: Option<String>,
    pub confidence: Option<f64>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl ExecutionRequest {
    /// Per-call timeout enforced at the provider contract boundary.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<(), RouteError> {
        if self.amount_in_atomic == 0 {
            return Err(RouteError::Validation(
                "amount_in_atomic must be positive".into(),
            ));
        }
        if !self.side.is_actionable() {
            return Err(RouteError::Validation(
                "flat orders cannot be executed".into(),
            ));
        }
        if self.timeout_ms == 0 {
            return Err(RouteError::Validation("timeout_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn quote_request(&self) -> QuoteRequest {
        QuoteRequest {
            token_in_mint: self.token_in_mint.clone(),
            token_out_mint: self.token_out_mint.clone(),
            amount_in_atomic: self.amount_in_atomic,
            slippage_bps: self.slippage_bps,
        }
    }
}

/// Static per-deployment execution parameters used when converting sized
/// orders into provider requests.
#[derive(Debug, Clone)]
pub struct ExecutionDefaults {
    pub owner_pubkey: String,
    /// Mint spent on buys and received on sells (e.g. wrapped SOL).
    pub quote_mint: String,
    /// Decimal places of the input mint when scaling sizes to atomic units.
    pub atomic_decimals: u32,
    pub slippage_bps: u32,
    pub priority_fee_lamports: u64,
    pub simulate_only: bool,
    pub max_retries: u32,
    pub timeout_ms: u64,
}

impl ExecutionRequest {
    /// Convert a sized order into an execution request.
    ///
    /// Buys spend the quote mint, so the atomic amount is the notional
    /// (size x price); sells spend the base mint, so it is the size itself.
    pub fn from_order(
        order: &OrderRequest,
        price_usd: Decimal,
        signal_confidence: Option<f64>,
        strategy_name: Option<&str>,
        defaults: &ExecutionDefaults,
    ) -> Result<Self, RouteError> {
        let scale = Decimal::from(10u64.pow(defaults.atomic_decimals));
        let (token_in, token_out, amount) = match order.side {
            Side::Buy => (
                defaults.quote_mint.clone(),
                order.symbol.clone(),
                order.size * price_usd * scale,
            ),
            Side::Sell => (
                order.symbol.clone(),
                defaults.quote_mint.clone(),
                order.size * scale,
            ),
            Side::Flat => {
                return Err(RouteError::Validation(
                    "flat orders cannot be executed".into(),
                ))
            }
        };

        let amount_in_atomic = amount
            .trunc()
            .to_u64()
            .ok_or_else(|| RouteError::Validation(format!("atomic amount out of range: {amount}")))?;

        Ok(Self {
            owner_pubkey: defaults.owner_pubkey.clone(),
            token_in_mint: token_in,
            token_out_mint: token_out,
            amount_in_atomic,
            side: order.side,
            limit_price_usd: match order.order_type {
                OrderType::Limit => order.limit_price,
                OrderType::Market => None,
            },
            slippage_bps: defaults.slippage_bps,
            priority_fee_lamports: defaults.priority_fee_lamports,
            simulate_only: defaults.simulate_only,
            max_retries: defaults.max_retries,
            timeout_ms: defaults.timeout_ms,
            strategy_name: strategy_name.map(str::to_string),
            confidence: signal_confidence,
            metadata: order.meta.clone(),
        })
    }
}

/// Outcome of one execution attempt (or of a whole routing decision).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub ok: bool,
    pub provider: String,
    pub route_id: Option<String>,
    pub price_usd: Option<Decimal>,
    pub amount_out: Option<u64>,
    /// Present iff the transaction was actually broadcast.
    pub tx_sig: Option<String>,
    pub error: Option<String>,
    pub error_code: Option<ErrorCode>,
    pub execution_time_ms: Option<u64>,
    /// Sanitized provider payload for debugging. Never contains secrets.
    pub raw: Option<Value>,
    pub timestamp: DateTime<Utc>,
    /// Routing observability: strategy, candidate set, attempt errors.
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl ExecutionResult {
    /// Successful simulated execution: route built, nothing broadcast.
    pub fn simulated(provider: impl Into<String>) -> Self {
        Self {
            ok: true,
            provider: provider.into(),
            route_id: None,
            price_usd: None,
            amount_out: None,
            tx_sig: None,
            error: None,
            error_code: None,
            execution_time_ms: None,
            raw: None,
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    /// Successful broadcast execution. The signature is mandatory: an
    /// `ok` non-simulated result without one violates the data contract.
    pub fn broadcast(provider: impl Into<String>, tx_sig: impl Into<String>) -> Self {
        let mut result = Self::simulated(provider);
        result.tx_sig = Some(tx_sig.into());
        result
    }

    /// Failed execution. `ok = false` always carries a non-empty error.
    pub fn failure(provider: impl Into<String>, error: &RouteError) -> Self {
        Self {
            ok: false,
            provider: provider.into(),
            route_id: None,
            price_usd: None,
            amount_out: None,
            tx_sig: None,
            error: Some(error.to_string()),
            error_code: Some(error.code()),
            execution_time_ms: None,
            raw: None,
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_price(mut self, price: Decimal, amount_out: u64) -> Self {
        self.price_usd = Some(price);
        self.amount_out = Some(amount_out);
        self
    }

    pub fn with_route(mut self, route_id: impl Into<String>) -> Self {
        self.route_id = Some(route_id.into());
        self
    }

    pub fn with_duration(mut self, elapsed_ms: u64) -> Self {
        self.execution_time_ms = Some(elapsed_ms);
        self
    }

    pub fn set_meta(&mut self, key: &str, value: Value) {
        self.metadata.insert(key.to_string(), value);
    }
}
