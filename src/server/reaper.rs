//! Background eviction of abandoned handles

use super::registry::SourceRegistry;
use crate::config::ServerConfig;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct EvictionPolicy {
    pub idle_timeout: Duration,
    pub max_sources: Option<usize>,
    pub sweep_interval: Duration,
}

impl EvictionPolicy {
    /// Sweep four times per idle period, at least once a second
    pub fn from_config(config: &ServerConfig) -> Self {
        EvictionPolicy {
            idle_timeout: config.idle_timeout,
            max_sources: config.max_sources,
            sweep_interval: (config.idle_timeout / 4).max(Duration::from_secs(1)),
        }
    }
}

/// One eviction pass; returns the number of handles removed
pub fn sweep(registry: &SourceRegistry, policy: &EvictionPolicy, now: Instant) -> usize {
    let mut evicted = registry.evict_idle(now, policy.idle_timeout).len();
    if let Some(max) = policy.max_sources {
        evicted += registry.enforce_capacity(max).len();
    }
    evicted
}

/// Run [`sweep`] on a tokio interval until the task is aborted
pub fn spawn_reaper(registry: SourceRegistry, policy: EvictionPolicy) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(policy.sweep_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let evicted = sweep(&registry, &policy, Instant::now());
            if evicted > 0 {
                debug!(evicted, live = registry.len(), "reaper sweep");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::source::{FrameSource, TableSource};
    use polars::prelude::*;
    use std::sync::Arc;

    fn source() -> Arc<dyn TableSource> {
        Arc::new(FrameSource::new(df!("a" => &[1i64]).unwrap()))
    }

    #[test]
    fn test_policy_from_config() {
        let config = ServerConfig {
            idle_timeout: Duration::from_secs(120),
            max_sources: Some(10),
            ..Default::default()
        };
        let policy = EvictionPolicy::from_config(&config);
        assert_eq!(policy.sweep_interval, Duration::from_secs(30));
        assert_eq!(policy.max_sources, Some(10));
    }

    #[test]
    fn test_sweep_applies_idle_and_capacity() {
        let registry = SourceRegistry::new();
        for _ in 0..3 {
            registry.register(source(), None);
        }
        let policy = EvictionPolicy {
            idle_timeout: Duration::from_secs(3600),
            max_sources: Some(1),
            sweep_interval: Duration::from_secs(1),
        };
        assert_eq!(sweep(&registry, &policy, Instant::now()), 2);
        assert_eq!(registry.len(), 1);

        let much_later = Instant::now() + Duration::from_secs(7200);
        assert_eq!(sweep(&registry, &policy, much_later), 1);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_reaper_task_evicts_idle_handles() {
        let registry = SourceRegistry::new();
        let handle = registry.register(source(), None);
        let policy = EvictionPolicy {
            idle_timeout: Duration::from_millis(20),
            max_sources: None,
            sweep_interval: Duration::from_millis(10),
        };

        let task = spawn_reaper(registry.clone(), policy);
        tokio::time::sleep(Duration::from_millis(150)).await;
        task.abort();

        assert!(!registry.contains(&handle));
    }
}
