use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure taxonomy for the routing layer.
///
/// Provider-level failures are converted into failed results at the
/// provider boundary; these variants classify what happened so callers can
/// distinguish "retry elsewhere" from "give up".
#[derive(Debug, Clone, Error)]
pub enum RouteError {
    /// Malformed request, rejected before any provider is contacted.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Timeout, 5xx, connection failure. Retried only via strategy
    /// fallback, never by blind retry inside a single provider call.
    #[error("provider {provider} transient failure: {message}")]
    ProviderTransient { provider: String, message: String },

    /// Rate limited. Fails the attempt with a backoff hint but does not by
    /// itself mark the provider unhealthy.
    #[error("provider {provider} rate limited (retry after {retry_after_ms}ms)")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    /// No viable route or price beyond the caller's limit. Terminal for
    /// that provider on this attempt.
    #[error("provider {provider} rejected quote: {reason}")]
    QuoteRejected { provider: String, reason: String },

    /// Every candidate in the strategy path failed. Aggregates each
    /// candidate's last error, in attempt order.
    #[error("all {} providers failed: {}", .attempts.len(), format_attempts(.attempts))]
    AllProvidersFailed { attempts: Vec<(String, String)> },
}

fn format_attempts(attempts: &[(String, String)]) -> String {
    attempts
        .iter()
        .map(|(provider, err)| format!("{provider}: {err}"))
        .collect::<Vec<_>>()
        .join("; ")
}

impl RouteError {
    pub fn code(&self) -> ErrorCode {
        match self {
            RouteError::Validation(_) => ErrorCode::Validation,
            RouteError::ProviderTransient { .. } => ErrorCode::ProviderTransient,
            RouteError::RateLimited { .. } => ErrorCode::RateLimited,
            RouteError::QuoteRejected { .. } => ErrorCode::QuoteRejected,
            RouteError::AllProvidersFailed { .. } => ErrorCode::AllProvidersFailed,
        }
    }
}

/// Machine-readable error class carried on `ExecutionResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Validation,
    ProviderTransient,
    RateLimited,
    QuoteRejected,
    AllProvidersFailed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_error_preserves_attempt_order() {
        let err = RouteError::AllProvidersFailed {
            attempts: vec![
                ("photon".into(), "timeout".into()),
                ("gmgn".into(), "no route".into()),
            ],
        };
        let msg = err.to_string();
        let photon_at = msg.find("photon: timeout").unwrap();
        let gmgn_at = msg.find("gmgn: no route").unwrap();
        assert!(photon_at < gmgn_at);
        assert_eq!(err.code(), ErrorCode::AllProvidersFailed);
    }
}
