//! # vantage-search
//!
//! Multi-query parallel web search with adaptive caching and an offline
//! fallback.
//!
//! One user query is expanded into up to three tiers of reformulated
//! variants, which run concurrently against a search provider under a
//! single deadline. Successful answers are cleaned, annotated, merged by
//! canonical link and ranked; the ranked list is cached with a TTL that
//! adapts to how useful and how popular the answer turned out to be.
//! Without connectivity, or when every variant fails, answers come from a
//! local knowledge store.
//!
//! ## Design
//!
//! - Bounded fan-out: a semaphore caps in-flight provider calls
//! - Transient provider errors retry with linear backoff; terminal ones stop
//! - Deadline expiry cancels outstanding variants instead of waiting
//! - Variant outcomes are kept in submission order, so ranking never
//!   depends on which call finished first
//! - Only caller-input problems are errors; provider trouble degrades the
//!   answer instead
//!
//! ## Security
//!
//! - The provider API key is redacted from `Debug` output and error text
//! - Query text is logged only at `debug`/`trace` level
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vantage_search::{EngineConfig, InMemoryKnowledge, SearchEngine, SearchOptions};
//!
//! # async fn example() -> vantage_search::Result<()> {
//! let engine = SearchEngine::builder(EngineConfig::default())
//!     .knowledge(Arc::new(InMemoryKnowledge::new()))
//!     .build()?;
//! let response = engine.search("rust async runtime", &SearchOptions::default()).await?;
//! for ranked in &response.results {
//!     println!("{:.2} {}", ranked.composite_score, ranked.result.link);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod connectivity;
pub mod engine;
pub mod error;
pub mod executor;
pub mod expander;
pub mod http;
pub mod knowledge;
pub mod offline;
pub mod processor;
pub mod provider;
pub mod providers;
pub mod ranking;
pub mod stats;
pub mod types;

pub use cache::{AdaptiveCache, CacheEntry, Fingerprint, TtlPolicy};
pub use config::{CacheConfig, EngineConfig, ProviderConfig};
pub use connectivity::{ConnectivityProbe, StaticConnectivity, TcpConnectivity};
pub use engine::{SearchEngine, SearchEngineBuilder};
pub use error::{KnowledgeError, ProviderError, ProviderErrorKind, Result, SearchError};
pub use executor::{ExecutionReport, ParallelExecutor, VariantOutcome, VariantReport};
pub use expander::QueryExpander;
pub use knowledge::{InMemoryKnowledge, KnowledgeSnapshot, KnowledgeStore};
pub use offline::OfflineFallback;
pub use processor::ResultProcessor;
pub use provider::SearchProvider;
pub use providers::CustomSearchProvider;
pub use ranking::{merge_and_rank, RankingPolicy};
pub use stats::SearchStats;
pub use types::{
    EnrichedResult, Entity, EntityKind, Intent, Query, QueryVariant, RankedResult, RawHit,
    ResultOrigin, SearchOptions, SearchResponse,
};
