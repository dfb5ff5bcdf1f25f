//! Engine-wide query statistics.

use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Snapshot of the counters kept by a [`crate::SearchEngine`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchStats {
    /// Queries answered (cache hits and offline answers included).
    pub total_queries: u64,
    /// Queries answered from the cache.
    pub cache_hits: u64,
    /// Queries answered by the offline fallback.
    pub offline_answers: u64,
    /// Sum of all query durations.
    pub total_duration: Duration,
    /// `total_duration / total_queries`, zero before the first query.
    pub average_duration: Duration,
}

impl SearchStats {
    /// Fraction of queries served from the cache.
    pub fn cache_hit_rate(&self) -> f64 {
        if self.total_queries == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.total_queries as f64
        }
    }
}

/// How a query was answered, for [`StatsRecorder::record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerSource {
    /// Fresh online search.
    Online,
    /// Served from the cache.
    Cache,
    /// Offline fallback.
    Offline,
}

/// Thread-safe accumulator behind [`SearchStats`].
#[derive(Debug, Default)]
pub struct StatsRecorder {
    inner: Mutex<SearchStats>,
}

impl StatsRecorder {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one answered query.
    pub fn record(&self, source: AnswerSource, elapsed: Duration) {
        let mut stats = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        stats.total_queries += 1;
        match source {
            AnswerSource::Cache => stats.cache_hits += 1,
            AnswerSource::Offline => stats.offline_answers += 1,
            AnswerSource::Online => {}
        }
        stats.total_duration += elapsed;
        let divisor = u32::try_from(stats.total_queries).unwrap_or(u32::MAX);
        stats.average_duration = stats.total_duration / divisor;
    }

    /// Current counters.
    pub fn snapshot(&self) -> SearchStats {
        self.inner.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}
