//! Core data model: queries, variants, hits, enriched and ranked results.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user query as issued by the caller.
///
/// Immutable once constructed: the engine only ever reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    text: String,
    locale: Option<String>,
    session_id: Option<String>,
}

impl Query {
    /// Create a query from raw text with no locale or session.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            locale: None,
            session_id: None,
        }
    }

    /// Attach a locale hint such as `"en"` or `"fa"`.
    #[must_use]
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    /// Attach a user or session identifier.
    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// The raw query text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The locale hint, if any.
    pub fn locale(&self) -> Option<&str> {
        self.locale.as_deref()
    }

    /// The session identifier, if any.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }
}

impl From<&str> for Query {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Query {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

/// The expansion strategy that produced a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    /// Near-verbatim reformulations of the original text.
    Direct,
    /// Keyword and domain specialisations.
    Conceptual,
    /// Reformulations inferred from related concepts in the knowledge store.
    Operational,
}

impl Intent {
    /// The tier number (1..=3) this intent belongs to.
    pub fn tier(self) -> u8 {
        match self {
            Self::Direct => 1,
            Self::Conceptual => 2,
            Self::Operational => 3,
        }
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Conceptual => "conceptual",
            Self::Operational => "operational",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One reformulated query sent independently to the search provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryVariant {
    /// Text sent to the provider.
    pub text: String,
    /// Expansion strategy; also determines the tier.
    pub intent: Intent,
}

impl QueryVariant {
    /// Create a variant.
    pub fn new(text: impl Into<String>, intent: Intent) -> Self {
        Self {
            text: text.into(),
            intent,
        }
    }

    /// Tier number (1 = direct, 2 = conceptual, 3 = operational).
    pub fn tier(&self) -> u8 {
        self.intent.tier()
    }
}

/// A hit exactly as returned by the search provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawHit {
    /// Page title, possibly containing markup.
    pub title: String,
    /// Snippet text, possibly containing markup.
    pub snippet: String,
    /// Target link.
    pub link: String,
    /// When the source was published, if the provider knows.
    pub published: Option<DateTime<Utc>>,
}

/// Kind of an extracted entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// Capitalised word run (person, place, product...).
    Name,
    /// A four-digit year.
    Date,
    /// Any other number.
    Number,
}

/// An entity mentioned in a result's title or snippet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Entity text as it appeared.
    pub text: String,
    /// Entity kind.
    pub kind: EntityKind,
    /// Salience in `[0, 1]`.
    pub score: f64,
}

/// A provider hit after cleaning and annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedResult {
    /// Cleaned title.
    pub title: String,
    /// Cleaned snippet.
    pub snippet: String,
    /// Target link, never empty.
    pub link: String,
    /// Source host (lowercase, without `www.`), used for trust weighting.
    pub source: String,
    /// Estimated relevance to the original query, in `[0, 1]`.
    pub relevance: f64,
    /// Confidence in the result's quality, in `[0, 1]`.
    pub confidence: f64,
    /// Detected language code (`und` when unknown).
    pub language: String,
    /// Entities extracted from title and snippet.
    pub entities: Vec<Entity>,
    /// Short summary.
    pub summary: String,
    /// Category tags.
    pub categories: Vec<String>,
    /// Source publication time, if known.
    pub published: Option<DateTime<Utc>>,
    /// Tier of the variant that found this result.
    pub tier: u8,
}

impl EnrichedResult {
    /// Clamp relevance and confidence back into `[0, 1]`.
    pub fn clamp_scores(&mut self) {
        self.relevance = clamp_unit(self.relevance);
        self.confidence = clamp_unit(self.confidence);
    }
}

/// Where a ranked result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultOrigin {
    /// The online search provider.
    Online,
    /// The local knowledge store.
    Offline,
    /// Synthesised because nothing else was available.
    Placeholder,
}

/// A result in the final ranked list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    /// The underlying enriched result.
    pub result: EnrichedResult,
    /// Relevance × source weight × freshness, in `[0, 1]`.
    pub composite_score: f64,
    /// Whether several variants converged on this link.
    pub merged_duplicate: bool,
    /// How many times this link was seen across variants (at least 1).
    pub duplicate_count: u32,
    /// Where the result came from.
    pub origin: ResultOrigin,
}

impl RankedResult {
    /// Wrap an enriched result that has not been merged with anything.
    pub fn single(result: EnrichedResult, composite_score: f64, origin: ResultOrigin) -> Self {
        Self {
            result,
            composite_score: clamp_unit(composite_score),
            merged_duplicate: false,
            duplicate_count: 1,
            origin,
        }
    }

    /// Shorthand for the link.
    pub fn link(&self) -> &str {
        &self.result.link
    }
}

/// Caller-supplied options for one search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// Preferred result language; falls back to the query locale.
    pub language: Option<String>,
    /// Only accept sources published within this many days.
    pub freshness_days: Option<u32>,
    /// Upper bound on the number of returned results.
    pub max_results: usize,
    /// Skip the cache read (the refreshed result is still written back).
    pub force_refresh: bool,
    /// Hand the final results to the knowledge store in the background.
    pub save_to_knowledge_base: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            language: None,
            freshness_days: None,
            max_results: 10,
            force_refresh: false,
            save_to_knowledge_base: false,
        }
    }
}

impl SearchOptions {
    /// Language used for the search: explicit option first, then the query locale.
    pub fn effective_language<'a>(&'a self, query: &'a Query) -> Option<&'a str> {
        self.language.as_deref().or_else(|| query.locale())
    }
}

/// Options forwarded to the search provider for one variant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderOptions {
    /// Preferred language code.
    pub language: Option<String>,
    /// Freshness window in days.
    pub freshness_days: Option<u32>,
    /// How many hits to ask for.
    pub num_results: usize,
}

/// The answer to one [`crate::SearchEngine::search`] call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    /// The query text that was answered.
    pub query: String,
    /// Ranked results, best first.
    pub results: Vec<RankedResult>,
    /// Whether the results were served from the cache.
    pub cache_hit: bool,
    /// Whether the results came from the offline fallback.
    pub offline: bool,
    /// Number of variant tiers that were actually dispatched.
    pub tier_count: usize,
    /// Number of variants that ended in failure, cancellation included.
    pub failed_variants: usize,
    /// Wall-clock time spent answering.
    pub elapsed: Duration,
}

/// Clamp a score into `[0, 1]`, mapping NaN to 0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
