use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Trade direction. `Flat` means no position change is wanted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
    Flat,
}

impl Side {
    /// Direction that closes a position opened on this side. Flat is its
    /// own opposite.
    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
            Side::Flat => Side::Flat,
        }
    }

    pub fn is_actionable(&self) -> bool {
        !matches!(self, Side::Flat)
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
            Side::Flat => write!(f, "flat"),
        }
    }
}

/// Output of a signal generator for one snapshot.
///
/// Ephemeral: produced per tick, consumed immediately by the filter chain
/// and sizing logic, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub side: Side,
    /// Confidence in [0, 1]. Clamped on construction.
    pub confidence: f64,
    /// Free-form diagnostics from the generator (indicator values etc).
    #[serde(default)]
    pub meta: HashMap<String, Value>,
}

impl Signal {
    pub fn new(symbol: impl Into<String>, side: Side, confidence: f64) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            confidence: confidence.clamp(0.0, 1.0),
            meta: HashMap::new(),
        }
    }

    /// A no-action signal with zero confidence.
    pub fn flat(symbol: impl Into<String>) -> Self {
        Self::new(symbol, Side::Flat, 0.0)
    }

    pub fn with_meta(mut self, key: &str, value: Value) -> Self {
        self.meta.insert(key.to_string(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_is_clamped() {
        assert_eq!(Signal::new("X", Side::Buy, 1.7).confidence, 1.0);
        assert_eq!(Signal::new("X", Side::Sell, -0.2).confidence, 0.0);
    }

    #[test]
    fn opposite_sides() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite(), Side::Buy);
        assert_eq!(Side::Flat.opposite(), Side::Flat);
        assert!(!Side::Flat.is_actionable());
    }
}
