use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Risk-based position sizing.
///
/// `size = (equity x risk_fraction) / |entry - stop|`, clamped to >= 0.
/// The sizer performs no I/O and knows nothing about realized P&L; equity
/// is mutable process-wide state the caller updates between cycles.
pub struct RiskSizer {
    equity: Decimal,
    risk_fraction: Decimal,
}

/// Point-in-time sizing parameters, for logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskStats {
    pub equity: Decimal,
    pub risk_fraction: Decimal,
    pub max_risk_amount: Decimal,
}

impl RiskSizer {
    pub fn new(equity: Decimal, risk_fraction: Decimal) -> Self {
        Self {
            equity,
            risk_fraction: clamp_fraction(risk_fraction),
        }
    }

    /// Position size for an (entry, stop) pair. Returns zero when entry
    /// equals stop: the risk per unit is undefined there.
    pub fn size(&self, entry: Decimal, stop: Decimal) -> Decimal {
        let risk_per_unit = (entry - stop).abs();
        if risk_per_unit <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let size = (self.equity * self.risk_fraction) / risk_per_unit;
        size.max(Decimal::ZERO)
    }

    pub fn update_equity(&mut self, equity: Decimal) {
        self.equity = equity;
    }

    /// Update the per-trade risk fraction, clamped to [0, 1].
    pub fn set_risk_fraction(&mut self, fraction: Decimal) {
        self.risk_fraction = clamp_fraction(fraction);
    }

    pub fn stats(&self) -> RiskStats {
        RiskStats {
            equity: self.equity,
            risk_fraction: self.risk_fraction,
            max_risk_amount: self.equity * self.risk_fraction,
        }
    }
}

fn clamp_fraction(fraction: Decimal) -> Decimal {
    fraction.clamp(Decimal::ZERO, Decimal::ONE)
}
