//! Offline answers from the knowledge store.
//!
//! Used when connectivity is absent or every variant failed, and per
//! variant to backfill failed variants. Never returns an error: a broken
//! or missing knowledge store just means "nothing known".

use std::sync::Arc;

use crate::cache::Fingerprint;
use crate::knowledge::KnowledgeStore;
use crate::ranking::{Merger, RankingPolicy};
use crate::types::{
    EnrichedResult, Query, QueryVariant, RankedResult, ResultOrigin, SearchOptions,
};

/// Score given to a synthesised placeholder.
pub const PLACEHOLDER_SCORE: f64 = 0.01;

/// Scheme and path prefix of placeholder links.
pub const PLACEHOLDER_LINK_PREFIX: &str = "offline://placeholder/";

/// Knowledge-store backed fallback search.
#[derive(Clone)]
pub struct OfflineFallback {
    knowledge: Option<Arc<dyn KnowledgeStore>>,
    policy: RankingPolicy,
    synthesize_placeholder: bool,
}

impl OfflineFallback {
    /// Create a fallback over `knowledge` (or over nothing).
    pub fn new(
        knowledge: Option<Arc<dyn KnowledgeStore>>,
        policy: RankingPolicy,
        synthesize_placeholder: bool,
    ) -> Self {
        Self {
            knowledge,
            policy,
            synthesize_placeholder,
        }
    }

    /// Answer `query` from the knowledge store alone.
    ///
    /// Returns at most `options.max_results` results, best first. When
    /// nothing matches and placeholders are enabled, returns exactly one
    /// placeholder result.
    pub async fn search_offline(&self, query: &Query, options: &SearchOptions) -> Vec<RankedResult> {
        let found = self.lookup(query.text(), options.max_results).await;

        let mut merger = Merger::new(&self.policy);
        merger.extend(found, ResultOrigin::Offline);
        let results = merger.finish(options.max_results);

        if results.is_empty() && self.synthesize_placeholder {
            tracing::debug!("no offline knowledge, returning placeholder");
            return vec![placeholder(query, options)];
        }
        tracing::debug!(count = results.len(), "offline answer");
        results
    }

    /// Knowledge-store matches for one failed variant. Never synthesises a
    /// placeholder.
    pub async fn lookup_variant(&self, variant: &QueryVariant, limit: usize) -> Vec<EnrichedResult> {
        let mut found = self.lookup(&variant.text, limit).await;
        for result in &mut found {
            result.tier = variant.tier();
        }
        found
    }

    async fn lookup(&self, text: &str, limit: usize) -> Vec<EnrichedResult> {
        let Some(knowledge) = &self.knowledge else {
            return Vec::new();
        };
        match knowledge.lookup_offline(text, limit).await {
            Ok(mut found) => {
                found.retain(|r| !r.link.trim().is_empty());
                for result in &mut found {
                    result.clamp_scores();
                }
                found
            }
            Err(e) => {
                tracing::warn!(error = %e, "knowledge lookup failed");
                Vec::new()
            }
        }
    }
}

impl std::fmt::Debug for OfflineFallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineFallback")
            .field("has_knowledge", &self.knowledge.is_some())
            .field("synthesize_placeholder", &self.synthesize_placeholder)
            .finish()
    }
}

/// The single result returned when nothing at all is known.
pub fn placeholder(query: &Query, options: &SearchOptions) -> RankedResult {
    let fingerprint = Fingerprint::new(query, options);
    let result = EnrichedResult {
        title: format!("No offline results for \"{}\"", query.text().trim()),
        snippet: "Search is offline and nothing matching this query is stored locally.".into(),
        link: format!("{PLACEHOLDER_LINK_PREFIX}{}", fingerprint.prefix(16)),
        source: "offline".into(),
        relevance: PLACEHOLDER_SCORE,
        confidence: PLACEHOLDER_SCORE,
        language: options
            .effective_language(query)
            .unwrap_or("und")
            .to_owned(),
        entities: vec![],
        summary: String::new(),
        categories: vec!["offline".into()],
        published: None,
        tier: 1,
    };
    RankedResult::single(result, PLACEHOLDER_SCORE, ResultOrigin::Placeholder)
}
