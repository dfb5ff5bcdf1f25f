//! Merge enriched results from every variant into one ranked list.
//!
//! # Pipeline
//!
//! 1. **Group** by canonical link ([`url_normalize::normalize_url`]).
//! 2. **Merge** repeats: relevance becomes
//!    `min(1, max(existing, incoming) × repetition_boost)`.
//! 3. **Score**: composite = relevance × source weight × freshness
//!    (× `offline_weight` for knowledge-store results), clamped to `[0, 1]`.
//! 4. **Sort** stably by composite descending and truncate.
//!
//! All weights live in [`RankingPolicy`], which is plain data.

pub mod url_normalize;

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SearchError;
use crate::types::{clamp_unit, EnrichedResult, RankedResult, ResultOrigin};

use url_normalize::normalize_url;

/// Tunable weights for merging and ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingPolicy {
    /// Multiplier applied when another variant returns the same link. Must be > 1.
    pub repetition_boost: f64,
    /// Host suffix → weight. `.gov` matches any host ending in `.gov`;
    /// `github.com` matches the host and its subdomains.
    pub source_weights: BTreeMap<String, f64>,
    /// Weight for hosts without an entry in `source_weights`.
    pub default_source_weight: f64,
    /// Age in days at which the freshness factor halves.
    pub freshness_half_life_days: f64,
    /// Lowest freshness factor an old result can reach.
    pub freshness_floor: f64,
    /// Freshness factor for results without a timestamp.
    pub undated_freshness: f64,
    /// Extra multiplier for results recalled from the knowledge store.
    pub offline_weight: f64,
}

impl Default for RankingPolicy {
    fn default() -> Self {
        let source_weights = [
            ("wikipedia.org", 1.1),
            (".gov", 1.1),
            (".edu", 1.1),
            ("github.com", 1.05),
            ("docs.rs", 1.05),
            ("pinterest.com", 0.7),
            ("quora.com", 0.8),
        ]
        .into_iter()
        .map(|(host, w)| (host.to_owned(), w))
        .collect();

        Self {
            repetition_boost: 1.2,
            source_weights,
            default_source_weight: 1.0,
            freshness_half_life_days: 365.0,
            freshness_floor: 0.5,
            undated_freshness: 0.85,
            offline_weight: 0.6,
        }
    }
}

impl RankingPolicy {
    /// Check the policy for values that would break the ranking invariants.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] describing the first bad field.
    pub fn validate(&self) -> Result<(), SearchError> {
        if !(self.repetition_boost.is_finite() && self.repetition_boost > 1.0) {
            return Err(SearchError::Config(
                "ranking.repetition_boost must be greater than 1".into(),
            ));
        }
        if let Some((host, _)) = self
            .source_weights
            .iter()
            .find(|(_, w)| !(w.is_finite() && **w >= 0.0))
        {
            return Err(SearchError::Config(format!(
                "ranking.source_weights[{host}] must be a non-negative number"
            )));
        }
        if !(self.default_source_weight.is_finite() && self.default_source_weight >= 0.0) {
            return Err(SearchError::Config(
                "ranking.default_source_weight must be a non-negative number".into(),
            ));
        }
        if !(self.freshness_half_life_days.is_finite() && self.freshness_half_life_days > 0.0) {
            return Err(SearchError::Config(
                "ranking.freshness_half_life_days must be positive".into(),
            ));
        }
        for (name, value) in [
            ("freshness_floor", self.freshness_floor),
            ("undated_freshness", self.undated_freshness),
            ("offline_weight", self.offline_weight),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(SearchError::Config(format!(
                    "ranking.{name} must be within [0, 1]"
                )));
            }
        }
        Ok(())
    }

    /// Weight for a source host; the longest matching suffix wins.
    pub fn source_weight(&self, host: &str) -> f64 {
        self.source_weights
            .iter()
            .filter(|(suffix, _)| host_matches(host, suffix))
            .max_by_key(|(suffix, _)| suffix.len())
            .map_or(self.default_source_weight, |(_, w)| *w)
    }

    /// Freshness factor for a result published at `published`, seen at `now`.
    pub fn freshness(&self, published: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
        let Some(published) = published else {
            return self.undated_freshness;
        };
        let age_days = (now - published).num_seconds().max(0) as f64 / 86_400.0;
        let decay = 0.5_f64.powf(age_days / self.freshness_half_life_days);
        decay.max(self.freshness_floor)
    }

    fn composite(&self, result: &EnrichedResult, origin: ResultOrigin, now: DateTime<Utc>) -> f64 {
        let origin_weight = match origin {
            ResultOrigin::Online => 1.0,
            ResultOrigin::Offline => self.offline_weight,
            // Placeholders are never ranked; they carry a fixed score.
            ResultOrigin::Placeholder => 0.0,
        };
        clamp_unit(
            result.relevance
                * self.source_weight(&result.source)
                * self.freshness(result.published, now)
                * origin_weight,
        )
    }
}

/// Whether `host` falls under `suffix`: a leading-dot suffix matches any
/// host ending in it, otherwise the host itself or one of its subdomains.
pub(crate) fn host_matches(host: &str, suffix: &str) -> bool {
    if suffix.starts_with('.') {
        host.ends_with(suffix)
    } else {
        host == suffix
            || host
                .strip_suffix(suffix)
                .is_some_and(|rest| rest.ends_with('.'))
    }
}

/// Accumulates results from several variants, merging repeats.
///
/// Entries keep first-seen order until [`Merger::finish`] sorts them.
pub struct Merger<'a> {
    policy: &'a RankingPolicy,
    entries: Vec<RankedResult>,
    by_link: HashMap<String, usize>,
}

impl<'a> Merger<'a> {
    /// Start an empty merge under `policy`.
    pub fn new(policy: &'a RankingPolicy) -> Self {
        Self {
            policy,
            entries: Vec::new(),
            by_link: HashMap::new(),
        }
    }

    /// Number of distinct canonical links seen so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been added.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add one result. A repeated canonical link boosts the existing entry
    /// instead of creating a new one.
    pub fn add(&mut self, result: EnrichedResult, origin: ResultOrigin) {
        let key = normalize_url(&result.link);
        if let Some(&idx) = self.by_link.get(&key) {
            let entry = &mut self.entries[idx];
            let best = entry.result.relevance.max(result.relevance);
            entry.result.relevance = (best * self.policy.repetition_boost).min(1.0);
            entry.result.confidence = entry.result.confidence.max(result.confidence);
            if entry.result.published.is_none() {
                entry.result.published = result.published;
            }
            if origin == ResultOrigin::Online {
                entry.origin = ResultOrigin::Online;
            }
            entry.duplicate_count += 1;
            entry.merged_duplicate = true;
            return;
        }
        self.by_link.insert(key, self.entries.len());
        self.entries.push(RankedResult::single(result, 0.0, origin));
    }

    /// Add every result from one origin.
    pub fn extend(&mut self, results: impl IntoIterator<Item = EnrichedResult>, origin: ResultOrigin) {
        for result in results {
            self.add(result, origin);
        }
    }

    /// Score, sort and truncate, with freshness measured against `now`.
    pub fn finish_at(self, limit: usize, now: DateTime<Utc>) -> Vec<RankedResult> {
        let policy = self.policy;
        let mut ranked: Vec<RankedResult> = self
            .entries
            .into_iter()
            .map(|mut entry| {
                entry.composite_score = policy.composite(&entry.result, entry.origin, now);
                entry
            })
            .collect();
        // `sort_by` is stable, so equal scores keep first-seen order.
        ranked.sort_by(|a, b| b.composite_score.total_cmp(&a.composite_score));
        ranked.truncate(limit);
        ranked
    }

    /// Score, sort and truncate against the current time.
    pub fn finish(self, limit: usize) -> Vec<RankedResult> {
        self.finish_at(limit, Utc::now())
    }
}

/// Merge online results from all variants and return at most `limit`,
/// best first.
///
/// `original_query` is only logged: ranking is lexical and structural.
pub fn merge_and_rank(
    policy: &RankingPolicy,
    enriched: Vec<EnrichedResult>,
    original_query: &str,
    limit: usize,
) -> Vec<RankedResult> {
    let input = enriched.len();
    let mut merger = Merger::new(policy);
    merger.extend(enriched, ResultOrigin::Online);
    let ranked = merger.finish(limit);
    tracing::trace!(query = original_query, input, output = ranked.len(), "merged results");
    ranked
}
