//! Engine configuration structs and their defaults.

use std::time::Duration;

use crate::cache::{CacheTierConfig, DEFAULT_PURGE_INTERVAL};
use crate::fetch::LatencyBudget;
use crate::provider::{ProviderSettings, DEFAULT_USER_AGENT, XYZ_TEMPLATE_KIND};
use crate::region::DEFAULT_DEBOUNCE_WINDOW;

/// Default number of block retrievals run concurrently for one build.
pub const DEFAULT_FETCH_CONCURRENCY: usize = 8;

/// Complete engine configuration, as loaded from `config.ini`.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub provider: ProviderSettings,
    pub fetch: FetchSettings,
    pub region: RegionSettings,
    pub cache: CacheSettings,
}

/// `[fetch]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    /// Milliseconds; `> 0` bounded, `0` default, `< 0` unbounded.
    pub latency_budget_ms: i64,
    pub concurrency: usize,
    pub user_agent: String,
}

impl FetchSettings {
    pub fn latency_budget(&self) -> LatencyBudget {
        LatencyBudget::from_millis(self.latency_budget_ms)
    }
}

/// `[region]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionSettings {
    pub debounce: Duration,
}

/// `[cache]` and `[cache.<tier>]` sections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// Tiers in chain order.
    pub tiers: Vec<CacheTierConfig>,
    /// `None` disables the purge daemon.
    pub purge_interval: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            provider: ProviderSettings {
                kind: XYZ_TEMPLATE_KIND.to_string(),
                ..ProviderSettings::default()
            },
            fetch: FetchSettings::default(),
            region: RegionSettings::default(),
            cache: CacheSettings::default(),
        }
    }
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            latency_budget_ms: 0,
            concurrency: DEFAULT_FETCH_CONCURRENCY,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Default for RegionSettings {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE_WINDOW,
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            tiers: vec![CacheTierConfig::default()],
            purge_interval: Some(DEFAULT_PURGE_INTERVAL),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TierStorage;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();

        assert_eq!(config.provider.kind, "xyz-template");
        assert_eq!(config.fetch.latency_budget(), LatencyBudget::Default);
        assert_eq!(config.fetch.concurrency, 8);
        assert_eq!(config.region.debounce, Duration::from_millis(150));
        assert_eq!(config.cache.tiers.len(), 1);
        assert_eq!(config.cache.tiers[0].storage, TierStorage::Memory);
        assert_eq!(config.cache.tiers[0].max_bytes, 256 * 1024 * 1024);
    }

    #[test]
    fn test_negative_budget_is_unbounded() {
        let fetch = FetchSettings {
            latency_budget_ms: -1,
            ..FetchSettings::default()
        };
        assert_eq!(fetch.latency_budget(), LatencyBudget::Unbounded);
    }
}
