pub mod health;

pub use health::{HealthRegistry, ProviderHealth};

use crate::error::RouteError;
use crate::provider::{ExecutionRequest, ExecutionResult, Provider, QuoteRequest, QuoteResult};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Name stamped on results the router synthesizes itself (aggregate
/// failures, validation rejections).
const ROUTER_NAME: &str = "router";

/// How the router picks among candidate providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingStrategy {
    /// Try providers in list order, return the first success.
    FirstSuccess,
    /// Quote everyone concurrently, execute only the best quote.
    BestPrice,
    /// Race executions, first success wins, losers are cancelled.
    Fastest,
}

impl RoutingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingStrategy::FirstSuccess => "first_success",
            RoutingStrategy::BestPrice => "best_price",
            RoutingStrategy::Fastest => "fastest",
        }
    }
}

/// Router tuning knobs, independent of any single request.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub strategy: RoutingStrategy,
    /// Maximum age of a cached health reading.
    pub health_ttl: Duration,
    /// Upper bound on one health probe.
    pub probe_timeout: Duration,
    /// Upper bound on one quote call (execute calls use the request's own
    /// timeout).
    pub quote_timeout: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            strategy: RoutingStrategy::FirstSuccess,
            health_ttl: Duration::from_secs(60),
            probe_timeout: Duration::from_secs(5),
            quote_timeout: Duration::from_secs(10),
        }
    }
}

/// Routes each order to one of several competing execution providers.
///
/// Every routing call returns a well-formed `ExecutionResult`; failures of
/// any kind are folded into `ok = false` results and never escape as
/// errors. Result metadata always records the strategy and whether the
/// healthy candidate set or the full fallback set was used.
pub struct ExecutionRouter {
    providers: Vec<Arc<dyn Provider>>,
    strategy: RoutingStrategy,
    health: HealthRegistry,
    quote_timeout: Duration,
}

impl ExecutionRouter {
    /// Zero configured providers is an unrecoverable configuration error.
    pub fn new(providers: Vec<Arc<dyn Provider>>, config: RouterConfig) -> Result<Self, RouteError> {
        if providers.is_empty() {
            return Err(RouteError::Validation(
                "at least one execution provider must be configured".into(),
            ));
        }
        Ok(Self {
            providers,
            strategy: config.strategy,
            health: HealthRegistry::new(config.health_ttl, config.probe_timeout),
            quote_timeout: config.quote_timeout,
        })
    }

    pub fn strategy(&self) -> RoutingStrategy {
        self.strategy
    }

    pub fn health(&self) -> &HealthRegistry {
        &self.health
    }

    /// Route one execution request under the configured strategy.
    pub async fn route(&self, req: ExecutionRequest) -> ExecutionResult {
        if let Err(err) = req.validate() {
            warn!(%err, "rejecting malformed execution request");
            let mut result = ExecutionResult::failure(ROUTER_NAME, &err);
            result.set_meta("strategy", json!(self.strategy.as_str()));
            return result;
        }

        let (candidates, fallback_to_all) = self.candidates().await;
        let candidate_names: Vec<String> =
            candidates.iter().map(|p| p.name().to_string()).collect();
        debug!(
            strategy = self.strategy.as_str(),
            candidates = ?candidate_names,
            fallback_to_all,
            "routing execution request"
        );

        let mut result = match self.strategy {
            RoutingStrategy::FirstSuccess => self.execute_first_success(&req, &candidates).await,
            RoutingStrategy::BestPrice => self.execute_best_price(&req, &candidates).await,
            RoutingStrategy::Fastest => self.execute_fastest(&req, &candidates).await,
        };

        result.set_meta("strategy", json!(self.strategy.as_str()));
        result.set_meta("candidates", json!(candidate_names));
        result.set_meta("fallback_to_all", json!(fallback_to_all));
        result
    }

    /// First-success quote across the candidate set, in list order.
    pub async fn quote(&self, req: &QuoteRequest) -> QuoteResult {
        let (candidates, _) = self.candidates().await;
        let mut last_error = String::from("no providers attempted");

        for provider in &candidates {
            let quote = self.quote_bounded(provider.as_ref(), req).await;
            if quote.ok {
                return quote;
            }
            last_error = quote.error.unwrap_or_else(|| "unknown error".into());
        }

        QuoteResult::failure(
            ROUTER_NAME,
            format!("all providers failed to quote; last error: {last_error}"),
        )
    }

    /// Candidate set for one routing decision: healthy providers in their
    /// configured order, refreshing any stale health reading on the way.
    /// An empty healthy set falls back to the full list so a stale or
    /// overly pessimistic health view cannot cause total lockout.
    async fn candidates(&self) -> (Vec<Arc<dyn Provider>>, bool) {
        let mut healthy = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            if self.health.ensure_fresh(provider.as_ref()).await {
                healthy.push(Arc::clone(provider));
            }
        }

        if healthy.is_empty() {
            warn!("no healthy providers; falling back to full candidate set");
            (self.providers.clone(), true)
        } else {
            (healthy, false)
        }
    }

    async fn execute_bounded(provider: &dyn Provider, req: &ExecutionRequest) -> ExecutionResult {
        match tokio::time::timeout(req.timeout(), provider.execute(req)).await {
            Ok(result) => result,
            Err(_) => ExecutionResult::failure(
                provider.name(),
                &RouteError::ProviderTransient {
                    provider: provider.name().to_string(),
                    message: format!("execute timed out after {}ms", req.timeout_ms),
                },
            ),
        }
    }

    async fn quote_bounded(&self, provider: &dyn Provider, req: &QuoteRequest) -> QuoteResult {
        match tokio::time::timeout(self.quote_timeout, provider.quote(req)).await {
            Ok(quote) => quote,
            Err(_) => QuoteResult::failure(
                provider.name(),
                format!(
                    "quote timed out after {}ms",
                    self.quote_timeout.as_millis()
                ),
            ),
        }
    }

    /// Iterate candidates in list order and return the first `ok` result.
    /// Each failure is recorded and iteration continues; exhaustion
    /// returns an aggregate failure carrying every attempt's error.
    async fn execute_first_success(
        &self,
        req: &ExecutionRequest,
        candidates: &[Arc<dyn Provider>],
    ) -> ExecutionResult {
        let mut attempts: Vec<(String, String)> = Vec::new();

        for provider in candidates {
            let result = Self::execute_bounded(provider.as_ref(), req).await;
            if result.ok {
                let mut result = result;
                result.set_meta("attempts", json!(attempts.len() + 1));
                return result;
            }
            let error = result.error.unwrap_or_else(|| "unknown error".into());
            warn!(provider = provider.name(), %error, "attempt failed, trying next provider");
            attempts.push((provider.name().to_string(), error));
        }

        Self::aggregate_failure(attempts)
    }

    /// Quote every candidate concurrently, keep the ok quotes with an
    /// amount out, execute exactly the best one. Ties go to the earliest
    /// provider in the configured list; quote-phase failures are excluded
    /// from both comparison and execution.
    async fn execute_best_price(
        &self,
        req: &ExecutionRequest,
        candidates: &[Arc<dyn Provider>],
    ) -> ExecutionResult {
        let quote_req = req.quote_request();
        let quotes = futures_util::future::join_all(
            candidates
                .iter()
                .map(|provider| self.quote_bounded(provider.as_ref(), &quote_req)),
        )
        .await;

        let mut failed: Vec<(String, String)> = Vec::new();
        let mut best: Option<(usize, u64)> = None;
        for (idx, quote) in quotes.iter().enumerate() {
            match (quote.ok, quote.amount_out) {
                (true, Some(amount_out)) => {
                    // Strictly-greater keeps the earliest provider on ties.
                    if best.map_or(true, |(_, best_amount)| amount_out > best_amount) {
                        best = Some((idx, amount_out));
                    }
                }
                _ => failed.push((
                    candidates[idx].name().to_string(),
                    quote
                        .error
                        .clone()
                        .unwrap_or_else(|| "quote returned no amount".into()),
                )),
            }
        }

        let Some((winner_idx, winner_amount)) = best else {
            // No viable quotes: fail without touching execute.
            return Self::aggregate_failure(failed);
        };

        let winner = &candidates[winner_idx];
        info!(
            provider = winner.name(),
            amount_out = winner_amount,
            "best price selected"
        );
        let mut result = Self::execute_bounded(winner.as_ref(), req).await;
        result.set_meta("best_quote_amount_out", json!(winner_amount));
        result
    }

    /// Race `execute` across every candidate; the first success wins and
    /// the shared token cancels the rest. Cancellation is cooperative and
    /// best-effort: a call already past its point of no return (broadcast
    /// sent) is not undone, only new broadcasts are prevented. Two
    /// providers racing past cancellation can therefore both broadcast;
    /// that is an accepted risk of this strategy. A success arriving after
    /// the winner was chosen is discarded (its task stops at the cancelled
    /// token) and never surfaced as the routing result.
    async fn execute_fastest(
        &self,
        req: &ExecutionRequest,
        candidates: &[Arc<dyn Provider>],
    ) -> ExecutionResult {
        let token = CancellationToken::new();
        let (tx, mut rx) = mpsc::channel::<(String, ExecutionResult)>(candidates.len().max(1));

        for provider in candidates {
            let provider = Arc::clone(provider);
            let req = req.clone();
            let token = token.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                // A winner may already exist by the time this task runs;
                // never start a new broadcast afterwards.
                if token.is_cancelled() {
                    return;
                }
                let result = tokio::select! {
                    _ = token.cancelled() => {
                        debug!(provider = provider.name(), "cancelled before completion");
                        return;
                    }
                    result = Self::execute_bounded(provider.as_ref(), &req) => result,
                };
                let _ = tx.send((provider.name().to_string(), result)).await;
            });
        }
        drop(tx);

        let mut failures: Vec<(String, String)> = Vec::new();
        while let Some((name, result)) = rx.recv().await {
            if result.ok {
                // Fire-and-forget cancellation of the losers; returning
                // the winner is never blocked on them.
                token.cancel();
                info!(provider = %name, "fastest race won");
                return result;
            }
            failures.push((name, result.error.unwrap_or_else(|| "unknown error".into())));
        }

        Self::aggregate_failure(failures)
    }

    fn aggregate_failure(attempts: Vec<(String, String)>) -> ExecutionResult {
        let error = RouteError::AllProvidersFailed { attempts };
        ExecutionResult::failure(ROUTER_NAME, &error)
    }
}
