//! Error types for the vantage-search crate.
//!
//! [`SearchError`] is the only error a caller of
//! [`crate::SearchEngine::search`] can see, and it is reserved for problems
//! with the caller's own input. Provider failures are expressed as
//! [`ProviderError`] and never escape the engine.

use std::fmt;

/// Errors surfaced to callers of the search engine.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The query text is unusable (empty or whitespace only).
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The per-search options are malformed.
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// Invalid engine configuration.
    #[error("config error: {0}")]
    Config(String),

    /// The HTTP client could not be constructed.
    #[error("HTTP error: {0}")]
    Http(String),
}

/// Convenience type alias for vantage-search results.
pub type Result<T> = std::result::Result<T, SearchError>;

/// Whether a provider failure is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Timeouts, rate limiting, server errors: retry with backoff.
    Transient,
    /// Bad requests, auth failures, exhausted quota: give up at once.
    Terminal,
}

/// A failure reported by a [`crate::provider::SearchProvider`].
///
/// The provider classifies the failure; the executor never guesses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    /// Retry classification.
    pub kind: ProviderErrorKind,
    /// Human-readable detail, free of credentials.
    pub message: String,
}

impl ProviderError {
    /// A retryable failure.
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Transient,
            message: message.into(),
        }
    }

    /// A non-retryable failure.
    pub fn terminal(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Terminal,
            message: message.into(),
        }
    }

    /// Returns `true` if the executor may retry.
    pub fn is_transient(&self) -> bool {
        self.kind == ProviderErrorKind::Transient
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ProviderErrorKind::Transient => write!(f, "transient provider error: {}", self.message),
            ProviderErrorKind::Terminal => write!(f, "terminal provider error: {}", self.message),
        }
    }
}

impl std::error::Error for ProviderError {}

/// A failure reported by a [`crate::knowledge::KnowledgeStore`].
///
/// Knowledge failures are logged and treated as "nothing known"; they never
/// fail a search.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KnowledgeError {
    /// The store could not be reached.
    #[error("knowledge store unavailable: {0}")]
    Unavailable(String),

    /// The store refused the request.
    #[error("knowledge store rejected request: {0}")]
    Rejected(String),
}
