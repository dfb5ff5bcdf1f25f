//! Engine configuration with sensible defaults.
//!
//! [`EngineConfig`] controls the provider connection, fan-out limits, retry
//! policy, cache sizing and the ranking policy. The defaults are tuned for
//! constrained hardware: few concurrent provider calls, short deadlines.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SearchError;
use crate::ranking::RankingPolicy;

/// Default Custom Search JSON API endpoint.
pub const DEFAULT_PROVIDER_URL: &str = "https://www.googleapis.com/customsearch/v1";

/// Largest accepted `cache.extend_factor`.
pub const MAX_EXTEND_FACTOR: f64 = 100.0;

/// Configuration for the search engine.
///
/// Use [`Default::default()`] for sensible defaults, or construct with
/// field overrides for custom behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Search provider connection settings.
    pub provider: ProviderConfig,
    /// Maximum number of provider calls in flight at once.
    pub max_concurrent: usize,
    /// Total attempts per variant (first try included).
    pub retry_attempts: u32,
    /// Backoff unit in milliseconds; attempt `n` waits `n` units before retrying.
    pub backoff_unit_ms: u64,
    /// Overall deadline for one query in milliseconds.
    pub deadline_ms: u64,
    /// Tier-1 hit count after which lower tiers are skipped. 0 disables.
    pub min_tier_results: usize,
    /// Maximum number of variants produced per query.
    pub max_variants: usize,
    /// Maximum number of variants per tier.
    pub variants_per_tier: usize,
    /// Hits requested from the provider for each variant.
    pub hits_per_variant: usize,
    /// Largest `max_results` a caller may ask for.
    pub max_results_cap: usize,
    /// Look up failed variants in the knowledge store.
    pub per_variant_offline: bool,
    /// Return a single placeholder when the offline lookup finds nothing.
    pub synthesize_placeholder: bool,
    /// Adaptive cache settings.
    pub cache: CacheConfig,
    /// Merge and ranking weights.
    pub ranking: RankingPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            max_concurrent: 3,
            retry_attempts: 3,
            backoff_unit_ms: 1_000,
            deadline_ms: 10_000,
            min_tier_results: 8,
            max_variants: 9,
            variants_per_tier: 3,
            hits_per_variant: 10,
            max_results_cap: 100,
            per_variant_offline: true,
            synthesize_placeholder: true,
            cache: CacheConfig::default(),
            ranking: RankingPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// The backoff unit as a [`Duration`].
    pub fn backoff_unit(&self) -> Duration {
        Duration::from_millis(self.backoff_unit_ms)
    }

    /// The per-query deadline as a [`Duration`].
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }

    /// Validates this configuration, returning an error if any field is invalid.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.max_concurrent == 0 {
            return Err(SearchError::Config(
                "max_concurrent must be greater than 0".into(),
            ));
        }
        if self.retry_attempts == 0 {
            return Err(SearchError::Config(
                "retry_attempts must be greater than 0".into(),
            ));
        }
        if self.deadline_ms == 0 {
            return Err(SearchError::Config(
                "deadline_ms must be greater than 0".into(),
            ));
        }
        if self.max_variants == 0 || self.variants_per_tier == 0 {
            return Err(SearchError::Config(
                "max_variants and variants_per_tier must be greater than 0".into(),
            ));
        }
        if self.hits_per_variant == 0 {
            return Err(SearchError::Config(
                "hits_per_variant must be greater than 0".into(),
            ));
        }
        if self.max_results_cap == 0 {
            return Err(SearchError::Config(
                "max_results_cap must be greater than 0".into(),
            ));
        }
        self.provider.validate()?;
        self.cache.validate()?;
        self.ranking.validate()
    }
}

/// Connection settings for the Custom Search JSON API provider.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Endpoint URL. Overridable for self-hosted proxies and tests.
    pub base_url: String,
    /// API key. Never logged.
    pub api_key: Option<String>,
    /// Programmable search engine identifier (`cx`).
    pub engine_id: Option<String>,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
    /// Custom User-Agent string.
    pub user_agent: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_PROVIDER_URL.to_owned(),
            api_key: None,
            engine_id: None,
            timeout_seconds: 8,
            user_agent: None,
        }
    }
}

// Hand-written so the API key never reaches logs.
impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("engine_id", &self.engine_id)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl ProviderConfig {
    fn validate(&self) -> Result<(), SearchError> {
        if self.timeout_seconds == 0 {
            return Err(SearchError::Config(
                "provider.timeout_seconds must be greater than 0".into(),
            ));
        }
        if url::Url::parse(&self.base_url).is_err() {
            return Err(SearchError::Config(format!(
                "provider.base_url is not a valid URL: {}",
                self.base_url
            )));
        }
        Ok(())
    }
}

/// Adaptive cache sizing and TTL policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Set to `false` to disable caching entirely.
    pub enabled: bool,
    /// Maximum number of cached result lists.
    pub capacity: u64,
    /// TTL given to a fingerprint the first time it is written.
    pub base_ttl_seconds: u64,
    /// Lower TTL bound.
    pub min_ttl_seconds: u64,
    /// Upper TTL bound.
    pub max_ttl_seconds: u64,
    /// Multiplier applied to stable, valuable entries (>= 1).
    pub extend_factor: f64,
    /// Multiplier applied to volatile or poor entries (in `(0, 1]`).
    pub shrink_factor: f64,
    /// Hit rate at or above which an entry counts as stable.
    pub stable_hit_rate: f64,
    /// Average relevance at or above which an entry counts as valuable.
    pub high_relevance: f64,
    /// Average relevance below which an entry counts as poor.
    pub low_relevance: f64,
    /// Consecutive misses that mark a fingerprint as volatile.
    pub miss_burst: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 256,
            base_ttl_seconds: 600,
            min_ttl_seconds: 60,
            max_ttl_seconds: 6 * 60 * 60,
            extend_factor: 1.5,
            shrink_factor: 0.5,
            stable_hit_rate: 0.6,
            high_relevance: 0.7,
            low_relevance: 0.3,
            miss_burst: 3,
        }
    }
}

impl CacheConfig {
    fn validate(&self) -> Result<(), SearchError> {
        if self.enabled && self.capacity == 0 {
            return Err(SearchError::Config(
                "cache.capacity must be greater than 0".into(),
            ));
        }
        if self.min_ttl_seconds > self.base_ttl_seconds
            || self.base_ttl_seconds > self.max_ttl_seconds
        {
            return Err(SearchError::Config(
                "cache TTLs must satisfy min <= base <= max".into(),
            ));
        }
        if self.min_ttl_seconds == 0 {
            return Err(SearchError::Config(
                "cache.min_ttl_seconds must be greater than 0".into(),
            ));
        }
        if !(1.0..=MAX_EXTEND_FACTOR).contains(&self.extend_factor) {
            return Err(SearchError::Config(format!(
                "cache.extend_factor must be in [1, {MAX_EXTEND_FACTOR}]"
            )));
        }
        if !(self.shrink_factor > 0.0 && self.shrink_factor <= 1.0) {
            return Err(SearchError::Config(
                "cache.shrink_factor must be in (0, 1]".into(),
            ));
        }
        for (name, value) in [
            ("stable_hit_rate", self.stable_hit_rate),
            ("high_relevance", self.high_relevance),
            ("low_relevance", self.low_relevance),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(SearchError::Config(format!(
                    "cache.{name} must be in [0, 1]"
                )));
            }
        }
        if self.low_relevance > self.high_relevance {
            return Err(SearchError::Config(
                "cache.low_relevance must be <= high_relevance".into(),
            ));
        }
        Ok(())
    }
}
