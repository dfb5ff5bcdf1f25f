//! Error types for the vantage host.

/// Top-level error type for the command-line host.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Configuration file could not be parsed or serialised.
    #[error("config error: {0}")]
    Config(String),

    /// Knowledge file could not be parsed or serialised.
    #[error("knowledge file error: {0}")]
    Knowledge(String),

    /// The search engine rejected the request or configuration.
    #[error(transparent)]
    Search(#[from] vantage_search::SearchError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, AppError>;
