use crate::data::Side;
use crate::error::RouteError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Market,
    Limit,
}

/// An accepted, sized trading intention.
///
/// Created once per accepted signal, owned exclusively by the routing call
/// that processes it and discarded after a result is obtained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: Side,
    /// Position size in base units. Must be positive for non-flat sides.
    pub size: Decimal,
    pub order_type: OrderType,
    pub limit_price: Option<Decimal>,
    #[serde(default)]
    pub meta: HashMap<String, Value>,
}

impl OrderRequest {
    /// Build a market order, rejecting non-positive sizes for actionable
    /// sides before anything reaches a provider.
    pub fn market(
        symbol: impl Into<String>,
        side: Side,
        size: Decimal,
    ) -> Result<Self, RouteError> {
        if side.is_actionable() && size <= Decimal::ZERO {
            return Err(RouteError::Validation(format!(
                "order size must be positive for {side} orders, got {size}"
            )));
        }
        Ok(Self {
            symbol: symbol.into(),
            side,
            size,
            order_type: OrderType::Market,
            limit_price: None,
            meta: HashMap::new(),
        })
    }

    pub fn with_limit(mut self, price: Decimal) -> Self {
        self.order_type = OrderType::Limit;
        self.limit_price = Some(price);
        self
    }

    pub fn with_meta(mut self, key: &str, value: Value) -> Self {
        self.meta.insert(key.to_string(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rejects_non_positive_size() {
        assert!(OrderRequest::market("BONK", Side::Buy, dec!(0)).is_err());
        assert!(OrderRequest::market("BONK", Side::Sell, dec!(-1)).is_err());
        assert!(OrderRequest::market("BONK", Side::Buy, dec!(0.5)).is_ok());
    }

    #[test]
    fn flat_orders_may_carry_zero_size() {
        let order = OrderRequest::market("BONK", Side::Flat, dec!(0)).unwrap();
        assert_eq!(order.order_type, OrderType::Market);
    }
}
