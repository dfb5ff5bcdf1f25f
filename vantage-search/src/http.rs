//! Shared HTTP client construction for the search provider.
//!
//! Builds a [`reqwest::Client`] with the provider's timeout, a stable
//! User-Agent, and compressed-response support.

use std::time::Duration;

use crate::config::ProviderConfig;
use crate::error::SearchError;

/// Default User-Agent sent with provider requests.
pub const DEFAULT_USER_AGENT: &str = concat!("vantage-search/", env!("CARGO_PKG_VERSION"));

/// Build a [`reqwest::Client`] configured for provider API calls.
///
/// The client has:
/// - Request timeout from `config.timeout_seconds`
/// - The configured User-Agent, or [`DEFAULT_USER_AGENT`]
/// - Brotli and gzip decompression
/// - A short redirect limit (APIs should not redirect much)
///
/// # Errors
///
/// Returns [`SearchError::Http`] if the client cannot be constructed.
pub fn build_client(config: &ProviderConfig) -> Result<reqwest::Client, SearchError> {
    let ua = config
        .user_agent
        .clone()
        .unwrap_or_else(|| DEFAULT_USER_AGENT.to_owned());

    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .connect_timeout(Duration::from_secs(config.timeout_seconds.min(5)))
        .user_agent(ua)
        .redirect(reqwest::redirect::Policy::limited(3))
        .build()
        .map_err(|e| SearchError::Http(format!("failed to build HTTP client: {e}")))
}
