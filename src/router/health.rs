use crate::provider::Provider;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Cached health reading for one provider.
#[derive(Debug, Clone, Copy)]
pub struct ProviderHealth {
    pub healthy: bool,
    pub last_checked: Instant,
}

/// Per-provider cached health, refreshed on a TTL.
///
/// Readings older than the TTL are stale and must be refreshed before they
/// are used to exclude a provider from routing. The map gives per-key
/// synchronization; contention stays low because refreshes are TTL-gated,
/// not per-request.
pub struct HealthRegistry {
    entries: DashMap<String, ProviderHealth>,
    ttl: Duration,
    /// Upper bound on a single health probe.
    probe_timeout: Duration,
}

impl HealthRegistry {
    pub fn new(ttl: Duration, probe_timeout: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            probe_timeout,
        }
    }

    /// Current reading without refreshing. `None` until the first check.
    pub fn get(&self, provider: &str) -> Option<ProviderHealth> {
        self.entries.get(provider).map(|entry| *entry)
    }

    fn is_stale(&self, provider: &str) -> bool {
        match self.get(provider) {
            Some(health) => health.last_checked.elapsed() > self.ttl,
            None => true,
        }
    }

    /// Return the provider's health, probing first when the cached reading
    /// is missing or older than the TTL. A probe that fails or times out
    /// counts as unhealthy.
    pub async fn ensure_fresh(&self, provider: &dyn Provider) -> bool {
        let name = provider.name();
        if !self.is_stale(name) {
            return self.get(name).map(|h| h.healthy).unwrap_or(true);
        }

        let healthy = match tokio::time::timeout(self.probe_timeout, provider.health_check()).await
        {
            Ok(healthy) => healthy,
            Err(_) => {
                warn!(provider = name, "health probe timed out");
                false
            }
        };

        self.entries.insert(
            name.to_string(),
            ProviderHealth {
                healthy,
                last_checked: Instant::now(),
            },
        );

        if healthy {
            debug!(provider = name, "provider healthy");
        } else {
            warn!(provider = name, "provider unhealthy");
        }
        healthy
    }

    /// Overwrite an entry directly. Test hook and manual override.
    pub fn mark(&self, provider: &str, healthy: bool) {
        self.entries.insert(
            provider.to_string(),
            ProviderHealth {
                healthy,
                last_checked: Instant::now(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ExecutionRequest, ExecutionResult, QuoteRequest, QuoteResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct ProbeCounter {
        name: String,
        healthy: AtomicBool,
        probes: AtomicUsize,
    }

    impl ProbeCounter {
        fn new(name: &str, healthy: bool) -> Self {
            Self {
                name: name.into(),
                healthy: AtomicBool::new(healthy),
                probes: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Provider for ProbeCounter {
        fn name(&self) -> &str {
            &self.name
        }

        async fn quote(&self, _req: &QuoteRequest) -> QuoteResult {
            QuoteResult::failure(&self.name, "not used")
        }

        async fn execute(&self, _req: &ExecutionRequest) -> ExecutionResult {
            ExecutionResult::simulated(&self.name)
        }

        async fn health_check(&self) -> bool {
            self.probes.fetch_add(1, Ordering::SeqCst);
            self.healthy.load(Ordering::SeqCst)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_entry_skips_probe() {
        let registry = HealthRegistry::new(Duration::from_secs(60), Duration::from_secs(5));
        let provider = ProbeCounter::new("photon", true);

        assert!(registry.ensure_fresh(&provider).await);
        assert!(registry.ensure_fresh(&provider).await);
        // Only the initial fill probes; the second call hits the cache.
        assert_eq!(provider.probes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_entry_triggers_exactly_one_recheck() {
        let registry = HealthRegistry::new(Duration::from_secs(60), Duration::from_secs(5));
        let provider = ProbeCounter::new("photon", true);

        registry.ensure_fresh(&provider).await;
        tokio::time::advance(Duration::from_secs(61)).await;
        registry.ensure_fresh(&provider).await;

        assert_eq!(provider.probes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_probe_marks_unhealthy() {
        let registry = HealthRegistry::new(Duration::from_secs(60), Duration::from_secs(5));
        let provider = ProbeCounter::new("gmgn", false);

        assert!(!registry.ensure_fresh(&provider).await);
        assert!(!registry.get("gmgn").unwrap().healthy);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_probe_counts_as_unhealthy() {
        struct HungProvider;

        #[async_trait]
        impl Provider for HungProvider {
            fn name(&self) -> &str {
                "hung"
            }
            async fn quote(&self, _req: &QuoteRequest) -> QuoteResult {
                QuoteResult::failure("hung", "not used")
            }
            async fn execute(&self, _req: &ExecutionRequest) -> ExecutionResult {
                ExecutionResult::simulated("hung")
            }
            async fn health_check(&self) -> bool {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                true
            }
        }

        let registry = HealthRegistry::new(Duration::from_secs(60), Duration::from_millis(100));
        assert!(!registry.ensure_fresh(&HungProvider).await);
    }
}
