//! The search engine: cache, expansion, parallel execution, merging and
//! offline fallback behind one `search` call.
//!
//! # Pipeline
//!
//! 1. Validate the query and options (the only error source).
//! 2. Serve from the cache unless `force_refresh` is set.
//! 3. Probe connectivity; when offline, answer from the knowledge store.
//! 4. Expand the query into tiered variants (seeded with related concepts).
//! 5. Run the variants in parallel under one deadline.
//! 6. Enrich and merge every successful variant's hits; backfill failed
//!    variants from the knowledge store.
//! 7. Cache the ranked list and, if asked, hand it to the knowledge store.

use std::sync::Arc;

use tokio::time::Instant;

use crate::cache::{AdaptiveCache, Fingerprint};
use crate::config::EngineConfig;
use crate::connectivity::{ConnectivityProbe, StaticConnectivity};
use crate::error::{Result, SearchError};
use crate::executor::{ExecutionReport, ExecutorSettings, ParallelExecutor};
use crate::expander::QueryExpander;
use crate::knowledge::KnowledgeStore;
use crate::offline::OfflineFallback;
use crate::processor::ResultProcessor;
use crate::provider::SearchProvider;
use crate::providers::CustomSearchProvider;
use crate::ranking::Merger;
use crate::stats::{AnswerSource, SearchStats, StatsRecorder};
use crate::types::{ProviderOptions, Query, RankedResult, ResultOrigin, SearchOptions, SearchResponse};

/// Multi-query parallel search engine.
///
/// Cheap to share behind an [`Arc`]; every method takes `&self`.
pub struct SearchEngine {
    config: EngineConfig,
    expander: QueryExpander,
    processor: ResultProcessor,
    executor: ParallelExecutor,
    cache: Option<AdaptiveCache>,
    offline: OfflineFallback,
    knowledge: Option<Arc<dyn KnowledgeStore>>,
    connectivity: Arc<dyn ConnectivityProbe>,
    stats: StatsRecorder,
}

/// Builder for [`SearchEngine`].
pub struct SearchEngineBuilder {
    config: EngineConfig,
    provider: Option<Arc<dyn SearchProvider>>,
    knowledge: Option<Arc<dyn KnowledgeStore>>,
    connectivity: Option<Arc<dyn ConnectivityProbe>>,
}

impl SearchEngineBuilder {
    /// Use `provider` instead of the Custom Search API client.
    pub fn provider(mut self, provider: Arc<dyn SearchProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Attach a knowledge store for related concepts, offline answers and
    /// persistence.
    pub fn knowledge(mut self, knowledge: Arc<dyn KnowledgeStore>) -> Self {
        self.knowledge = Some(knowledge);
        self
    }

    /// Use `probe` to decide whether to go online. Defaults to always online.
    pub fn connectivity(mut self, probe: Arc<dyn ConnectivityProbe>) -> Self {
        self.connectivity = Some(probe);
        self
    }

    /// Validate the configuration and assemble the engine.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] for an invalid configuration and
    /// [`SearchError::Http`] if the default provider's client cannot be built.
    pub fn build(self) -> Result<SearchEngine> {
        self.config.validate()?;

        let provider: Arc<dyn SearchProvider> = match self.provider {
            Some(provider) => provider,
            None => Arc::new(CustomSearchProvider::new(self.config.provider.clone())?),
        };
        let connectivity = self
            .connectivity
            .unwrap_or_else(|| Arc::new(StaticConnectivity::online()));
        let cache = self
            .config
            .cache
            .enabled
            .then(|| AdaptiveCache::from_config(&self.config.cache));
        let offline = OfflineFallback::new(
            self.knowledge.clone(),
            self.config.ranking.clone(),
            self.config.synthesize_placeholder,
        );

        tracing::debug!(
            provider = provider.name(),
            max_concurrent = self.config.max_concurrent,
            cache = cache.is_some(),
            knowledge = self.knowledge.is_some(),
            "search engine ready"
        );

        Ok(SearchEngine {
            expander: QueryExpander::new(self.config.max_variants, self.config.variants_per_tier),
            processor: ResultProcessor::new(),
            executor: ParallelExecutor::new(provider, ExecutorSettings::from(&self.config)),
            cache,
            offline,
            knowledge: self.knowledge,
            connectivity,
            stats: StatsRecorder::new(),
            config: self.config,
        })
    }
}

impl SearchEngine {
    /// Start building an engine from `config`.
    pub fn builder(config: EngineConfig) -> SearchEngineBuilder {
        SearchEngineBuilder {
            config,
            provider: None,
            knowledge: None,
            connectivity: None,
        }
    }

    /// The configuration in force.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The result cache, if enabled.
    pub fn cache(&self) -> Option<&AdaptiveCache> {
        self.cache.as_ref()
    }

    /// Snapshot of the query counters.
    pub fn stats(&self) -> SearchStats {
        self.stats.snapshot()
    }

    /// Drop the cached answer for `query` under `options`.
    pub async fn invalidate(&self, query: &Query, options: &SearchOptions) {
        if let Some(cache) = &self.cache {
            cache.invalidate(&Fingerprint::new(query, options)).await;
        }
    }

    /// Answer a query.
    ///
    /// Provider and knowledge-store failures never surface here: they
    /// shrink the answer, switch it to the offline fallback, or leave it
    /// empty.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::InvalidQuery`] for empty query text and
    /// [`SearchError::InvalidOptions`] for a zero or oversized
    /// `max_results` or a zero freshness window.
    pub async fn search(
        &self,
        query: impl Into<Query>,
        options: &SearchOptions,
    ) -> Result<SearchResponse> {
        self.answer(query.into(), options, None).await
    }

    /// Answer a query, finishing by `deadline` at the latest.
    ///
    /// The configured deadline still applies; whichever comes first cuts
    /// the provider fan-out short. A deadline already in the past leaves
    /// only the cache and the offline fallback.
    ///
    /// # Errors
    ///
    /// As for [`search`](Self::search).
    pub async fn search_with_deadline(
        &self,
        query: impl Into<Query>,
        options: &SearchOptions,
        deadline: Instant,
    ) -> Result<SearchResponse> {
        self.answer(query.into(), options, Some(deadline)).await
    }

    async fn answer(
        &self,
        query: Query,
        options: &SearchOptions,
        caller_deadline: Option<Instant>,
    ) -> Result<SearchResponse> {
        let started = Instant::now();
        let configured = started + self.config.deadline();
        let deadline = caller_deadline.map_or(configured, |d| d.min(configured));
        self.validate(&query, options)?;

        tracing::debug!(query = query.text(), "search received");
        let fingerprint = Fingerprint::new(&query, options);

        if let Some(cache) = &self.cache {
            if options.force_refresh {
                tracing::debug!("cache read bypassed");
            } else if let Some(results) = cache.get(&fingerprint).await {
                return Ok(self.finish(
                    &query,
                    results,
                    AnswerSource::Cache,
                    Outcome::default(),
                    started,
                ));
            }
        }

        if !self.connectivity.is_online().await {
            tracing::info!("offline, answering from local knowledge");
            let results = self.offline.search_offline(&query, options).await;
            return Ok(self.finish(
                &query,
                results,
                AnswerSource::Offline,
                Outcome::default(),
                started,
            ));
        }

        let concepts = self.related_concepts(query.text()).await;
        let variants = self.expander.expand(query.text(), &concepts);
        let provider_options = ProviderOptions {
            language: options.effective_language(&query).map(str::to_owned),
            freshness_days: options.freshness_days,
            num_results: self.config.hits_per_variant,
        };

        let report = self
            .executor
            .execute(variants, &provider_options, deadline)
            .await;
        let outcome = Outcome::of(&report);

        if report.success_count() == 0 {
            tracing::warn!(
                failed = outcome.failed_variants,
                deadline_exceeded = report.deadline_exceeded,
                "no variant succeeded, falling back to local knowledge"
            );
            let results = self.offline.search_offline(&query, options).await;
            return Ok(self.finish(&query, results, AnswerSource::Offline, outcome, started));
        }

        let results = self.merge(&query, options, &report).await;

        if let Some(cache) = &self.cache {
            let ttl = cache
                .put(fingerprint, results.clone(), average_relevance(&results))
                .await;
            tracing::trace!(ttl_secs = ttl.as_secs(), "results cached");
        }
        if options.save_to_knowledge_base {
            self.save_in_background(query.text(), &results);
        }

        Ok(self.finish(&query, results, AnswerSource::Online, outcome, started))
    }

    fn validate(&self, query: &Query, options: &SearchOptions) -> Result<()> {
        if query.text().trim().is_empty() {
            return Err(SearchError::InvalidQuery("query must not be empty".into()));
        }
        if options.max_results == 0 {
            return Err(SearchError::InvalidOptions(
                "max_results must be greater than 0".into(),
            ));
        }
        if options.max_results > self.config.max_results_cap {
            return Err(SearchError::InvalidOptions(format!(
                "max_results must not exceed {}",
                self.config.max_results_cap
            )));
        }
        if options.freshness_days == Some(0) {
            return Err(SearchError::InvalidOptions(
                "freshness_days must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    async fn related_concepts(&self, text: &str) -> Vec<String> {
        let Some(knowledge) = &self.knowledge else {
            return Vec::new();
        };
        match knowledge
            .related_concepts(text, self.config.variants_per_tier)
            .await
        {
            Ok(concepts) => concepts,
            Err(e) => {
                tracing::warn!(error = %e, "related concept lookup failed");
                Vec::new()
            }
        }
    }

    async fn merge(
        &self,
        query: &Query,
        options: &SearchOptions,
        report: &ExecutionReport,
    ) -> Vec<RankedResult> {
        let mut merger = Merger::new(&self.config.ranking);
        for (variant, hits) in report.successes() {
            let enriched = self.processor.process(hits, variant, query.text());
            merger.extend(enriched, ResultOrigin::Online);
        }
        let online = merger.len();

        if self.config.per_variant_offline {
            for variant in report.provider_failures() {
                let recalled = self
                    .offline
                    .lookup_variant(variant, self.config.hits_per_variant)
                    .await;
                merger.extend(recalled, ResultOrigin::Offline);
            }
        }

        tracing::debug!(
            online,
            with_offline = merger.len(),
            "merged variant results"
        );
        merger.finish(options.max_results)
    }

    fn save_in_background(&self, text: &str, results: &[RankedResult]) {
        let Some(knowledge) = self.knowledge.clone() else {
            return;
        };
        let text = text.to_owned();
        let results = results.to_vec();
        tokio::spawn(async move {
            if let Err(e) = knowledge.store_search(&text, &results).await {
                tracing::warn!(error = %e, "saving results to knowledge store failed");
            }
        });
    }

    fn finish(
        &self,
        query: &Query,
        results: Vec<RankedResult>,
        source: AnswerSource,
        outcome: Outcome,
        started: Instant,
    ) -> SearchResponse {
        let elapsed = started.elapsed();
        self.stats.record(source, elapsed);
        tracing::info!(
            results = results.len(),
            source = ?source,
            tiers = outcome.tier_count,
            failed = outcome.failed_variants,
            elapsed_ms = elapsed.as_millis() as u64,
            "search complete"
        );
        SearchResponse {
            query: query.text().to_owned(),
            results,
            cache_hit: source == AnswerSource::Cache,
            offline: source == AnswerSource::Offline,
            tier_count: outcome.tier_count,
            failed_variants: outcome.failed_variants,
            elapsed,
        }
    }
}

impl std::fmt::Debug for SearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchEngine")
            .field("executor", &self.executor)
            .field("cache", &self.cache)
            .field("offline", &self.offline)
            .finish()
    }
}

/// Execution summary carried into the response.
#[derive(Debug, Clone, Copy, Default)]
struct Outcome {
    tier_count: usize,
    failed_variants: usize,
}

impl Outcome {
    fn of(report: &ExecutionReport) -> Self {
        Self {
            tier_count: report.tiers_dispatched(),
            failed_variants: report.failure_count(),
        }
    }
}

fn average_relevance(results: &[RankedResult]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    results.iter().map(|r| r.result.relevance).sum::<f64>() / results.len() as f64
}
