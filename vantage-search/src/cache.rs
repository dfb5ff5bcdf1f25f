//! Result cache with per-entry adaptive expiry.
//!
//! Final ranked lists are cached under a [`Fingerprint`] of the query and
//! the options that change the answer. Storage is a [`moka`] future cache
//! bounded by entry count with LRU eviction; each entry expires after the
//! TTL stored inside it. The TTL itself adapts per fingerprint:
//!
//! - popular, high-relevance answers live longer (`× extend_factor`)
//! - low-relevance answers, empty answers, and fingerprints that keep
//!   missing live shorter (`× shrink_factor`)
//!
//! Hit/miss statistics are kept beside the moka store so they survive
//! eviction and expiry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use moka::future::Cache;
use moka::ops::compute::Op;
use moka::policy::EvictionPolicy;
use moka::Expiry;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::CacheConfig;
use crate::expander::normalize;
use crate::types::{Query, RankedResult, SearchOptions};

/// Statistics for this many fingerprints per unit of cache capacity are
/// retained before the least-used ones are forgotten.
const STATS_PER_SLOT: usize = 4;

/// SHA-256 identity of a query and the options that affect its answer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint `query` under `options`.
    ///
    /// Covers the normalised query text, the effective language, the
    /// freshness window and the result limit. `force_refresh` and
    /// `save_to_knowledge_base` do not change the answer and are ignored.
    pub fn new(query: &Query, options: &SearchOptions) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(normalize(query.text()).as_bytes());
        hasher.update([0x1f]);
        hasher.update(
            options
                .effective_language(query)
                .map(str::to_lowercase)
                .unwrap_or_default()
                .as_bytes(),
        );
        hasher.update([0x1f]);
        hasher.update(
            options
                .freshness_days
                .map(|d| d.to_string())
                .unwrap_or_default()
                .as_bytes(),
        );
        hasher.update([0x1f]);
        hasher.update(options.max_results.to_string().as_bytes());

        let digest = hasher.finalize();
        Self(digest.iter().map(|b| format!("{b:02x}")).collect())
    }

    /// Hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First `len` hex characters, for logs and placeholder links.
    pub fn prefix(&self, len: usize) -> &str {
        &self.0[..len.min(self.0.len())]
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One cached answer.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// Key the entry is stored under.
    pub fingerprint: Fingerprint,
    /// Ranked list as it was written.
    pub results: Vec<RankedResult>,
    /// When the entry was written.
    pub created_at: DateTime<Utc>,
    /// Lifetime assigned at write time.
    pub ttl: Duration,
    /// Lookups that found an entry for this fingerprint.
    pub hits: u64,
    /// Lookups that found nothing for this fingerprint.
    pub misses: u64,
}

/// Adaptive TTL rules.
#[derive(Debug, Clone, PartialEq)]
pub struct TtlPolicy {
    /// TTL for a fingerprint seen for the first time.
    pub base: Duration,
    /// Lower clamp.
    pub min: Duration,
    /// Upper clamp.
    pub max: Duration,
    /// Multiplier for stable, high-relevance answers.
    pub extend_factor: f64,
    /// Multiplier for poor or volatile answers.
    pub shrink_factor: f64,
    /// Hit rate at or above which an answer counts as stable.
    pub stable_hit_rate: f64,
    /// Average relevance at or above which an answer counts as good.
    pub high_relevance: f64,
    /// Average relevance below which an answer counts as poor.
    pub low_relevance: f64,
    /// Consecutive misses that count as volatile.
    pub miss_burst: u32,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self::from(&CacheConfig::default())
    }
}

impl From<&CacheConfig> for TtlPolicy {
    fn from(config: &CacheConfig) -> Self {
        Self {
            base: Duration::from_secs(config.base_ttl_seconds),
            min: Duration::from_secs(config.min_ttl_seconds),
            max: Duration::from_secs(config.max_ttl_seconds),
            extend_factor: config.extend_factor,
            shrink_factor: config.shrink_factor,
            stable_hit_rate: config.stable_hit_rate,
            high_relevance: config.high_relevance,
            low_relevance: config.low_relevance,
            miss_burst: config.miss_burst,
        }
    }
}

impl TtlPolicy {
    /// Next TTL given the current one and what is known about the fingerprint.
    pub fn adjust(&self, current: Duration, signals: &TtlSignals) -> Duration {
        let shrink = signals.result_count == 0
            || signals.avg_relevance < self.low_relevance
            || signals.consecutive_misses >= self.miss_burst;
        let extend = signals.hit_rate >= self.stable_hit_rate
            && signals.avg_relevance >= self.high_relevance;

        let next = if shrink {
            self.scale(current, self.shrink_factor)
        } else if extend {
            self.scale(current, self.extend_factor)
        } else {
            current
        };
        next.max(self.min).min(self.max)
    }

    /// `current × factor`, saturating to `max` when the product is not a
    /// representable duration.
    fn scale(&self, current: Duration, factor: f64) -> Duration {
        Duration::try_from_secs_f64(current.as_secs_f64() * factor).unwrap_or(self.max)
    }
}

/// Inputs to [`TtlPolicy::adjust`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TtlSignals {
    /// `hits / (hits + misses)`, 0 when never looked up.
    pub hit_rate: f64,
    /// Mean relevance of the results being written.
    pub avg_relevance: f64,
    /// Number of results being written.
    pub result_count: usize,
    /// Misses since the last hit.
    pub consecutive_misses: u32,
}

#[derive(Debug, Clone, Default)]
struct KeyStats {
    hits: u64,
    misses: u64,
    consecutive_misses: u32,
    ttl: Option<Duration>,
}

impl KeyStats {
    fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Expiry driven by the TTL stored in each entry.
struct EntryExpiry;

impl Expiry<Fingerprint, Arc<CacheEntry>> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &Fingerprint,
        value: &Arc<CacheEntry>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &Fingerprint,
        value: &Arc<CacheEntry>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// LRU result cache with adaptive per-entry TTL.
#[derive(Clone)]
pub struct AdaptiveCache {
    store: Cache<Fingerprint, Arc<CacheEntry>>,
    stats: Arc<Mutex<HashMap<Fingerprint, KeyStats>>>,
    policy: TtlPolicy,
    stats_capacity: usize,
}

impl AdaptiveCache {
    /// Create a cache holding at most `capacity` entries.
    pub fn new(capacity: u64, policy: TtlPolicy) -> Self {
        let store = Cache::builder()
            .max_capacity(capacity)
            .eviction_policy(EvictionPolicy::lru())
            .expire_after(EntryExpiry)
            .build();
        Self {
            store,
            stats: Arc::new(Mutex::new(HashMap::new())),
            policy,
            stats_capacity: usize::try_from(capacity)
                .unwrap_or(usize::MAX)
                .saturating_mul(STATS_PER_SLOT)
                .max(STATS_PER_SLOT),
        }
    }

    /// Create a cache from configuration.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.capacity, TtlPolicy::from(config))
    }

    /// The TTL rules in force.
    pub fn policy(&self) -> &TtlPolicy {
        &self.policy
    }

    /// Look up a fingerprint, recording a hit or a miss.
    ///
    /// Expired entries read as absent.
    pub async fn get(&self, fingerprint: &Fingerprint) -> Option<Vec<RankedResult>> {
        let found = self.store.get(fingerprint).await;
        let mut stats = self.lock_stats();
        let key_stats = self.stats_for(&mut stats, fingerprint);
        match found {
            Some(entry) => {
                key_stats.hits += 1;
                key_stats.consecutive_misses = 0;
                tracing::trace!(fingerprint = fingerprint.prefix(12), "cache hit");
                Some(entry.results.clone())
            }
            None => {
                key_stats.misses += 1;
                key_stats.consecutive_misses = key_stats.consecutive_misses.saturating_add(1);
                tracing::trace!(fingerprint = fingerprint.prefix(12), "cache miss");
                None
            }
        }
    }

    /// Store `results`, assigning the adapted TTL inside the entry.
    ///
    /// Returns the TTL the entry was written with. Writes to one
    /// fingerprint are serialised with [`update_ttl`](Self::update_ttl).
    pub async fn put(
        &self,
        fingerprint: Fingerprint,
        results: Vec<RankedResult>,
        avg_relevance: f64,
    ) -> Duration {
        let mut assigned = self.policy.base;
        self.store
            .entry(fingerprint.clone())
            .and_compute_with(|_current| {
                let ttl = self.next_ttl(&fingerprint, results.len(), avg_relevance);
                let (hits, misses) = self.counters(&fingerprint);
                assigned = ttl;
                std::future::ready(Op::Put(Arc::new(CacheEntry {
                    fingerprint: fingerprint.clone(),
                    results,
                    created_at: Utc::now(),
                    ttl,
                    hits,
                    misses,
                })))
            })
            .await;
        assigned
    }

    /// Re-evaluate the TTL for a fingerprint.
    ///
    /// A live entry is rewritten in place with the new TTL; otherwise the
    /// TTL is remembered for the next write. The read and the rewrite are
    /// one atomic step, so a concurrent [`put`](Self::put) is never
    /// overwritten with older results.
    pub async fn update_ttl(
        &self,
        fingerprint: &Fingerprint,
        result_count: usize,
        avg_relevance: f64,
    ) -> Duration {
        let mut assigned = self.policy.base;
        self.store
            .entry(fingerprint.clone())
            .and_compute_with(|current| {
                let ttl = self.next_ttl(fingerprint, result_count, avg_relevance);
                assigned = ttl;
                let op = match current {
                    Some(current) => {
                        let mut updated = current.value().as_ref().clone();
                        updated.ttl = ttl;
                        Op::Put(Arc::new(updated))
                    }
                    None => Op::Nop,
                };
                std::future::ready(op)
            })
            .await;
        assigned
    }

    /// Drop the entry for a fingerprint. Statistics are kept.
    pub async fn invalidate(&self, fingerprint: &Fingerprint) {
        self.store.invalidate(fingerprint).await;
    }

    /// Snapshot of the live entry, with current hit/miss counters.
    ///
    /// Hit/miss statistics are left untouched. Like any read of the store
    /// it does refresh the entry's LRU recency; use
    /// [`contains`](Self::contains) to check presence without that.
    pub async fn entry(&self, fingerprint: &Fingerprint) -> Option<CacheEntry> {
        let entry = self.store.get(fingerprint).await?;
        let (hits, misses) = self.counters(fingerprint);
        let mut snapshot = (*entry).clone();
        snapshot.hits = hits;
        snapshot.misses = misses;
        Some(snapshot)
    }

    /// Whether a live entry exists, without touching LRU order or statistics.
    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.store.contains_key(fingerprint)
    }

    /// The TTL most recently assigned to a fingerprint.
    pub fn current_ttl(&self, fingerprint: &Fingerprint) -> Option<Duration> {
        self.lock_stats().get(fingerprint).and_then(|s| s.ttl)
    }

    /// Approximate number of live entries.
    pub fn entry_count(&self) -> u64 {
        self.store.entry_count()
    }

    /// Run moka's pending maintenance (eviction, expiry bookkeeping).
    pub async fn run_pending_tasks(&self) {
        self.store.run_pending_tasks().await;
    }

    fn next_ttl(&self, fingerprint: &Fingerprint, result_count: usize, avg_relevance: f64) -> Duration {
        let mut stats = self.lock_stats();
        let key_stats = self.stats_for(&mut stats, fingerprint);
        let current = key_stats.ttl.unwrap_or(self.policy.base);
        let signals = TtlSignals {
            hit_rate: key_stats.hit_rate(),
            avg_relevance,
            result_count,
            consecutive_misses: key_stats.consecutive_misses,
        };
        let next = self.policy.adjust(current, &signals);
        key_stats.ttl = Some(next);
        if next != current {
            tracing::debug!(
                fingerprint = fingerprint.prefix(12),
                from_secs = current.as_secs_f64(),
                to_secs = next.as_secs_f64(),
                hit_rate = signals.hit_rate,
                avg_relevance,
                "cache TTL adjusted"
            );
        }
        next
    }

    fn counters(&self, fingerprint: &Fingerprint) -> (u64, u64) {
        self.lock_stats()
            .get(fingerprint)
            .map_or((0, 0), |s| (s.hits, s.misses))
    }

    fn lock_stats(&self) -> MutexGuard<'_, HashMap<Fingerprint, KeyStats>> {
        // A poisoned table only holds counters; keep using it.
        self.stats.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn stats_for<'m>(
        &self,
        stats: &'m mut HashMap<Fingerprint, KeyStats>,
        fingerprint: &Fingerprint,
    ) -> &'m mut KeyStats {
        if !stats.contains_key(fingerprint) && stats.len() >= self.stats_capacity {
            let coldest = stats
                .iter()
                .min_by_key(|(_, s)| s.hits + s.misses)
                .map(|(k, _)| k.clone());
            if let Some(coldest) = coldest {
                stats.remove(&coldest);
            }
        }
        stats.entry(fingerprint.clone()).or_default()
    }
}

impl std::fmt::Debug for AdaptiveCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdaptiveCache")
            .field("entries", &self.store.entry_count())
            .field("policy", &self.policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EnrichedResult, ResultOrigin};

    fn ranked(link: &str, relevance: f64) -> RankedResult {
        RankedResult::single(
            EnrichedResult {
                title: "t".into(),
                snippet: "s".into(),
                link: link.into(),
                source: "example.com".into(),
                relevance,
                confidence: 0.5,
                language: "en".into(),
                entities: vec![],
                summary: String::new(),
                categories: vec![],
                published: None,
                tier: 1,
            },
            relevance,
            ResultOrigin::Online,
        )
    }

    fn fp(text: &str) -> Fingerprint {
        Fingerprint::new(&Query::new(text), &SearchOptions::default())
    }

    #[test]
    fn fingerprint_normalises_text() {
        assert_eq!(fp("Rust  Async"), fp("rust async"));
        assert_ne!(fp("rust async"), fp("rust sync"));
        assert_eq!(fp("x").as_str().len(), 64);
    }

    #[test]
    fn fingerprint_ignores_presentation_options() {
        let query = Query::new("rust");
        let plain = SearchOptions::default();
        let noisy = SearchOptions {
            force_refresh: true,
            save_to_knowledge_base: true,
            ..SearchOptions::default()
        };
        assert_eq!(Fingerprint::new(&query, &plain), Fingerprint::new(&query, &noisy));
    }

    #[test]
    fn fingerprint_covers_answer_shaping_options() {
        let query = Query::new("rust");
        let base = Fingerprint::new(&query, &SearchOptions::default());
        let lang = SearchOptions {
            language: Some("de".into()),
            ..SearchOptions::default()
        };
        let fresh = SearchOptions {
            freshness_days: Some(7),
            ..SearchOptions::default()
        };
        let limit = SearchOptions {
            max_results: 5,
            ..SearchOptions::default()
        };
        assert_ne!(base, Fingerprint::new(&query, &lang));
        assert_ne!(base, Fingerprint::new(&query, &fresh));
        assert_ne!(base, Fingerprint::new(&query, &limit));
        // Query locale counts as the effective language.
        assert_eq!(
            Fingerprint::new(&Query::new("rust").with_locale("de"), &SearchOptions::default()),
            Fingerprint::new(&query, &lang)
        );
    }

    #[test]
    fn prefix_is_bounded() {
        let f = fp("x");
        assert_eq!(f.prefix(8).len(), 8);
        assert_eq!(f.prefix(500).len(), 64);
    }

    #[test]
    fn policy_extends_shrinks_and_clamps() {
        let policy = TtlPolicy::default();
        let base = policy.base;
        let good = TtlSignals {
            hit_rate: 0.8,
            avg_relevance: 0.9,
            result_count: 5,
            consecutive_misses: 0,
        };
        assert_eq!(policy.adjust(base, &good), base.mul_f64(1.5));

        let poor = TtlSignals {
            avg_relevance: 0.1,
            ..good
        };
        assert_eq!(policy.adjust(base, &poor), base.mul_f64(0.5));

        let empty = TtlSignals {
            result_count: 0,
            ..good
        };
        assert_eq!(policy.adjust(base, &empty), base.mul_f64(0.5));

        let volatile = TtlSignals {
            consecutive_misses: 3,
            ..good
        };
        assert_eq!(policy.adjust(base, &volatile), base.mul_f64(0.5));

        let middling = TtlSignals {
            hit_rate: 0.3,
            avg_relevance: 0.5,
            ..good
        };
        assert_eq!(policy.adjust(base, &middling), base);

        assert_eq!(policy.adjust(policy.max, &good), policy.max);
        assert_eq!(policy.adjust(policy.min, &poor), policy.min);
    }

    #[test]
    fn non_finite_factor_saturates_to_max() {
        let policy = TtlPolicy {
            extend_factor: f64::INFINITY,
            ..TtlPolicy::default()
        };
        let good = TtlSignals {
            hit_rate: 1.0,
            avg_relevance: 1.0,
            result_count: 3,
            consecutive_misses: 0,
        };
        assert_eq!(policy.adjust(policy.base, &good), policy.max);

        let policy = TtlPolicy {
            shrink_factor: f64::NAN,
            ..TtlPolicy::default()
        };
        let empty = TtlSignals {
            result_count: 0,
            ..good
        };
        assert_eq!(policy.adjust(policy.base, &empty), policy.max);
    }

    #[tokio::test]
    async fn unbounded_extension_does_not_panic_on_write() {
        let policy = TtlPolicy {
            extend_factor: f64::INFINITY,
            ..TtlPolicy::default()
        };
        let max = policy.max;
        let cache = AdaptiveCache::new(16, policy);
        let key = fp("hot answer");
        let results = vec![ranked("https://a.com", 0.9)];

        cache.put(key.clone(), results.clone(), 0.9).await;
        for _ in 0..5 {
            assert!(cache.get(&key).await.is_some());
        }
        let ttl = cache.put(key.clone(), results, 0.9).await;
        assert_eq!(ttl, max);
        assert_eq!(cache.entry(&key).await.map(|e| e.ttl), Some(max));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn ttl_update_never_resurrects_replaced_results() {
        let cache = AdaptiveCache::new(16, TtlPolicy::default());
        let key = fp("contended");

        for round in 0..200 {
            cache.put(key.clone(), vec![ranked("https://old.com", 0.7)], 0.7).await;

            let writer = {
                let cache = cache.clone();
                let key = key.clone();
                tokio::spawn(async move {
                    cache.put(key, vec![ranked("https://new.com", 0.7)], 0.7).await
                })
            };
            let updater = {
                let cache = cache.clone();
                let key = key.clone();
                tokio::spawn(async move { cache.update_ttl(&key, 1, 0.7).await })
            };
            writer.await.expect("writer");
            updater.await.expect("updater");

            let links: Vec<String> = cache
                .get(&key)
                .await
                .expect("entry present")
                .iter()
                .map(|r| r.link().to_owned())
                .collect();
            assert_eq!(links, ["https://new.com"], "round {round}");
        }
    }

    #[tokio::test]
    async fn entry_snapshot_leaves_statistics_alone() {
        let cache = AdaptiveCache::new(16, TtlPolicy::default());
        let key = fp("inspect");
        cache.put(key.clone(), vec![ranked("https://a.com", 0.5)], 0.5).await;
        assert!(cache.get(&key).await.is_some());
        assert!(cache.get(&fp("absent")).await.is_none());

        for _ in 0..3 {
            let snapshot = cache.entry(&key).await.expect("live entry");
            assert_eq!((snapshot.hits, snapshot.misses), (1, 0));
        }
        assert_eq!(cache.counters(&key), (1, 0));
        assert!(cache.entry(&fp("absent")).await.is_none());
        assert_eq!(cache.counters(&fp("absent")), (0, 1));
    }

    #[tokio::test]
    async fn round_trip_within_ttl() {
        let cache = AdaptiveCache::new(16, TtlPolicy::default());
        let key = fp("round trip");
        let results = vec![ranked("https://a.com", 0.8), ranked("https://b.com", 0.6)];

        assert!(cache.get(&key).await.is_none());
        cache.put(key.clone(), results.clone(), 0.7).await;
        assert_eq!(cache.get(&key).await, Some(results));

        let entry = cache.entry(&key).await.expect("entry");
        assert_eq!(entry.hits, 1);
        assert_eq!(entry.misses, 1);
        assert_eq!(entry.fingerprint, key);
    }

    #[tokio::test]
    async fn popular_relevant_answers_live_longer() {
        let cache = AdaptiveCache::new(16, TtlPolicy::default());
        let key = fp("popular");
        let results = vec![ranked("https://a.com", 0.9)];

        assert!(cache.get(&key).await.is_none());
        let initial = cache.put(key.clone(), results, 0.85).await;
        for _ in 0..5 {
            assert!(cache.get(&key).await.is_some());
        }
        let adjusted = cache.update_ttl(&key, 1, 0.85).await;
        assert!(adjusted >= initial);
        assert!(adjusted > initial);
        assert_eq!(cache.entry(&key).await.expect("entry").ttl, adjusted);
    }

    #[tokio::test]
    async fn repeated_misses_shorten_ttl() {
        let cache = AdaptiveCache::new(16, TtlPolicy::default());
        let key = fp("volatile");
        for _ in 0..3 {
            assert!(cache.get(&key).await.is_none());
        }
        let ttl = cache.put(key.clone(), vec![ranked("https://a.com", 0.5)], 0.5).await;
        assert!(ttl <= cache.policy().base);
        assert_eq!(cache.current_ttl(&key), Some(ttl));
    }

    #[tokio::test]
    async fn low_relevance_write_shortens_ttl() {
        let cache = AdaptiveCache::new(16, TtlPolicy::default());
        let key = fp("poor");
        let ttl = cache.put(key, vec![ranked("https://a.com", 0.1)], 0.1).await;
        assert!(ttl < cache.policy().base);
    }

    #[tokio::test]
    async fn expired_entries_read_as_misses() {
        let policy = TtlPolicy {
            base: Duration::from_millis(50),
            min: Duration::from_millis(10),
            max: Duration::from_millis(100),
            ..TtlPolicy::default()
        };
        let cache = AdaptiveCache::new(16, policy);
        let key = fp("short lived");
        cache.put(key.clone(), vec![ranked("https://a.com", 0.5)], 0.5).await;
        assert!(cache.get(&key).await.is_some());

        std::thread::sleep(Duration::from_millis(150));
        assert!(cache.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn invalidate_removes_entry_but_keeps_stats() {
        let cache = AdaptiveCache::new(16, TtlPolicy::default());
        let key = fp("invalidate me");
        cache.put(key.clone(), vec![ranked("https://a.com", 0.5)], 0.5).await;
        cache.invalidate(&key).await;
        assert!(cache.get(&key).await.is_none());
        assert!(cache.current_ttl(&key).is_some());
    }

    #[tokio::test]
    async fn lru_evicts_least_recently_used() {
        let cache = AdaptiveCache::new(2, TtlPolicy::default());
        let (a, b, c) = (fp("a"), fp("b"), fp("c"));

        cache.put(a.clone(), vec![ranked("https://a.com", 0.5)], 0.5).await;
        cache.run_pending_tasks().await;
        cache.put(b.clone(), vec![ranked("https://b.com", 0.5)], 0.5).await;
        cache.run_pending_tasks().await;
        assert!(cache.get(&a).await.is_some());
        cache.run_pending_tasks().await;
        cache.put(c.clone(), vec![ranked("https://c.com", 0.5)], 0.5).await;
        cache.run_pending_tasks().await;

        assert!(cache.contains(&a));
        assert!(!cache.contains(&b));
        assert!(cache.contains(&c));
        assert_eq!(cache.entry_count(), 2);
    }

    #[test]
    fn stats_table_is_bounded() {
        let cache = AdaptiveCache::new(1, TtlPolicy::default());
        for i in 0..20 {
            let key = fp(&format!("q{i}"));
            let _ = cache.next_ttl(&key, 1, 0.5);
        }
        assert!(cache.lock_stats().len() <= STATS_PER_SLOT);
    }
}
