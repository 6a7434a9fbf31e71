use crate::provider::ExecutionDefaults;
use crate::risk::RiskSizer;
use crate::router::{RouterConfig, RoutingStrategy};
use crate::strategy::{
    ConfidenceFilter, FilterChain, PreTradeFilter, TradingHoursFilter, TrendFilter,
    VolatilityFilter,
};
use crate::stream::{OrchestratorConfig, StopRule};
use anyhow::Result;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub general: GeneralConfig,
    pub stream: StreamConfig,
    pub strategy: StrategyConfig,
    pub filters: FiltersConfig,
    pub risk: RiskConfig,
    pub execution: ExecutionConfig,
    pub router: RouterSection,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    pub environment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    pub symbols: Vec<String>,
    pub initial_price: f64,
    pub tick_interval_ms: u64,
    /// Minimum relative price move for a tick to be processed, e.g. 0.001.
    pub price_change_threshold: Decimal,
    pub max_history: usize,
    /// Optional run-time cap; absent means run until shutdown.
    pub max_duration_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub name: String,
    pub short_window: usize,
    pub long_window: usize,
}

/// Each filter is enabled by the presence of its parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiltersConfig {
    pub min_confidence: Option<f64>,
    pub min_volatility: Option<f64>,
    pub volatility_lookback: Option<usize>,
    pub trend_window: Option<usize>,
    pub trading_hours_utc: Option<[u32; 2]>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    pub equity_usd: Decimal,
    pub risk_fraction: Decimal,
    /// "percent" or "volatility_band".
    pub stop_rule: String,
    pub stop_pct: Decimal,
    pub volatility_lookback: usize,
    pub volatility_width: f64,
    pub target_pct: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    pub owner_pubkey: String,
    pub quote_mint: String,
    pub atomic_decimals: u32,
    pub slippage_bps: u32,
    pub priority_fee_lamports: u64,
    pub simulate_only: bool,
    pub max_retries: u32,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterSection {
    pub strategy: RoutingStrategy,
    pub health_ttl_secs: u64,
    pub probe_timeout_ms: u64,
    pub quote_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub output: String,
    pub file_path: String,
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load from environment variable or default path
    pub fn load() -> Result<Self> {
        let path =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config/paper.toml".to_string());
        Self::from_file(path)
    }
}

impl FiltersConfig {
    pub fn build_chain(&self) -> FilterChain {
        let mut filters: Vec<Box<dyn PreTradeFilter>> = Vec::new();
        if let Some(min) = self.min_confidence {
            filters.push(Box::new(ConfidenceFilter::new(min)));
        }
        if let Some(min) = self.min_volatility {
            let lookback = self.volatility_lookback.unwrap_or(20);
            filters.push(Box::new(VolatilityFilter::new(min, lookback)));
        }
        if let Some(window) = self.trend_window {
            filters.push(Box::new(TrendFilter::new(window)));
        }
        if let Some([start, end]) = self.trading_hours_utc {
            filters.push(Box::new(TradingHoursFilter::new(start, end)));
        }
        FilterChain::new(filters)
    }
}

impl RiskConfig {
    pub fn sizer(&self) -> RiskSizer {
        RiskSizer::new(self.equity_usd, self.risk_fraction)
    }

    pub fn stop_rule(&self) -> StopRule {
        match self.stop_rule.as_str() {
            "volatility_band" => StopRule::VolatilityBand {
                lookback: self.volatility_lookback,
                width: self.volatility_width,
            },
            _ => StopRule::Percent {
                stop_pct: self.stop_pct,
            },
        }
    }
}

impl ExecutionConfig {
    pub fn defaults(&self) -> ExecutionDefaults {
        ExecutionDefaults {
            owner_pubkey: self.owner_pubkey.clone(),
            quote_mint: self.quote_mint.clone(),
            atomic_decimals: self.atomic_decimals,
            slippage_bps: self.slippage_bps,
            priority_fee_lamports: self.priority_fee_lamports,
            simulate_only: self.simulate_only,
            max_retries: self.max_retries,
            timeout_ms: self.timeout_ms,
        }
    }
}

impl RouterSection {
    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            strategy: self.strategy,
            health_ttl: Duration::from_secs(self.health_ttl_secs),
            probe_timeout: Duration::from_millis(self.probe_timeout_ms),
            quote_timeout: Duration::from_millis(self.quote_timeout_ms),
        }
    }
}

impl Config {
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            price_change_threshold: self.stream.price_change_threshold,
            max_history: self.stream.max_history,
            stop_rule: self.risk.stop_rule(),
            target_pct: self.risk.target_pct,
            max_duration: self.stream.max_duration_secs.map(Duration::from_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const SAMPLE: &str = r#"
[general]
environment = "paper"

[stream]
symbols = ["BONK", "WIF"]
initial_price = 1.0
tick_interval_ms = 500
price_change_threshold = "0.001"
max_history = 200

[strategy]
name = "ma_cross"
short_window = 5
long_window = 20

[filters]
min_confidence = 0.3
trend_window = 20

[risk]
equity_usd = "10000"
risk_fraction = "0.01"
stop_rule = "percent"
stop_pct = "0.015"
volatility_lookback = 20
volatility_width = 2.0
target_pct = "0.03"

[execution]
owner_pubkey = "PaperWallet1111111111111111111111111111111"
quote_mint = "So11111111111111111111111111111111111111112"
atomic_decimals = 9
slippage_bps = 100
priority_fee_lamports = 5000
simulate_only = true
max_retries = 2
timeout_ms = 10000

[router]
strategy = "best_price"
health_ttl_secs = 30
probe_timeout_ms = 2000
quote_timeout_ms = 5000

[logging]
level = "info"
output = "pretty"
file_path = ""
"#;

    #[test]
    fn parses_full_config() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.stream.symbols, vec!["BONK", "WIF"]);
        assert_eq!(config.stream.price_change_threshold, dec!(0.001));
        assert_eq!(config.router.strategy, RoutingStrategy::BestPrice);
        assert!(config.stream.max_duration_secs.is_none());
        assert!(config.execution.simulate_only);
    }

    #[test]
    fn filter_chain_respects_optional_sections() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        let chain = config.filters.build_chain();
        // min_confidence and trend_window enabled, the rest absent.
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn stop_rule_falls_back_to_percent() {
        let mut config: Config = toml::from_str(SAMPLE).unwrap();
        config.risk.stop_rule = "volatility_band".into();
        assert!(matches!(
            config.risk.stop_rule(),
            StopRule::VolatilityBand { lookback: 20, .. }
        ));
        config.risk.stop_rule = "percent".into();
        assert!(matches!(config.risk.stop_rule(), StopRule::Percent { .. }));
    }
}
