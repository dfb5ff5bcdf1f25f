//! Custom Search JSON API provider.
//!
//! Talks to a Google Programmable Search Engine (`customsearch/v1`) or any
//! proxy speaking the same JSON shape. Requires an API key and an engine id.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;

use crate::config::ProviderConfig;
use crate::error::{ProviderError, SearchError};
use crate::http;
use crate::provider::SearchProvider;
use crate::types::{ProviderOptions, RawHit};

/// The API returns at most this many items per request.
const MAX_ITEMS_PER_REQUEST: usize = 10;

/// Metatag keys checked, in order, for a publication timestamp.
const PUBLISHED_KEYS: &[&str] = &[
    "article:published_time",
    "og:updated_time",
    "date",
    "dc.date",
];

/// Custom Search JSON API client.
pub struct CustomSearchProvider {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl CustomSearchProvider {
    /// Create a provider from connection settings.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Http`] if the HTTP client cannot be built.
    pub fn new(config: ProviderConfig) -> Result<Self, SearchError> {
        let client = http::build_client(&config)?;
        Ok(Self { client, config })
    }

    /// Whether both the API key and engine id are present.
    pub fn has_credentials(&self) -> bool {
        self.config.api_key.as_deref().is_some_and(|k| !k.is_empty())
            && self.config.engine_id.as_deref().is_some_and(|c| !c.is_empty())
    }
}

#[async_trait]
impl SearchProvider for CustomSearchProvider {
    async fn search(
        &self,
        query: &str,
        options: &ProviderOptions,
    ) -> Result<Vec<RawHit>, ProviderError> {
        tracing::trace!(query, "custom search request");

        let (Some(key), Some(cx)) = (
            self.config.api_key.as_deref(),
            self.config.engine_id.as_deref(),
        ) else {
            return Err(ProviderError::terminal(
                "provider credentials not configured",
            ));
        };

        let num = options.num_results.clamp(1, MAX_ITEMS_PER_REQUEST).to_string();
        let mut params: Vec<(&str, String)> = vec![
            ("key", key.to_owned()),
            ("cx", cx.to_owned()),
            ("q", query.to_owned()),
            ("num", num),
        ];
        if let Some(lang) = options.language.as_deref() {
            params.push(("lr", format!("lang_{lang}")));
        }
        if let Some(days) = options.freshness_days {
            params.push(("dateRestrict", format!("d{days}")));
        }

        let response = self
            .client
            .get(&self.config.base_url)
            .query(&params)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::transient(format!("response read failed: {e}")))?;

        tracing::trace!(bytes = body.len(), "custom search response received");

        parse_response(&body)
    }

    fn name(&self) -> &str {
        "custom-search"
    }
}

/// Map a non-success HTTP status to a classified provider error.
fn status_error(status: StatusCode) -> ProviderError {
    let message = format!("HTTP {}", status.as_u16());
    if status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
    {
        ProviderError::transient(message)
    } else {
        ProviderError::terminal(message)
    }
}

/// Network-level failures are worth retrying; builder/decode bugs are not.
fn classify_transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        // `without_url` keeps the API key out of the message.
        ProviderError::transient(format!("request failed: {}", err.without_url()))
    } else {
        ProviderError::terminal(format!("request failed: {}", err.without_url()))
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    items: Vec<ApiItem>,
}

#[derive(Debug, Deserialize)]
struct ApiItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    pagemap: Option<PageMap>,
}

#[derive(Debug, Deserialize)]
struct PageMap {
    #[serde(default)]
    metatags: Vec<serde_json::Map<String, serde_json::Value>>,
}

/// Parse a JSON API response body into raw hits.
///
/// Items without a link are skipped. A body that is not valid JSON is a
/// terminal error: retrying would return the same body.
fn parse_response(body: &str) -> Result<Vec<RawHit>, ProviderError> {
    let parsed: ApiResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::terminal(format!("malformed response: {e}")))?;

    Ok(parsed
        .items
        .into_iter()
        .filter(|item| !item.link.trim().is_empty())
        .map(|item| {
            let published = item.pagemap.as_ref().and_then(published_time);
            RawHit {
                title: item.title,
                snippet: item.snippet,
                link: item.link,
                published,
            }
        })
        .collect())
}

fn published_time(pagemap: &PageMap) -> Option<DateTime<Utc>> {
    pagemap.metatags.iter().find_map(|tags| {
        PUBLISHED_KEYS.iter().find_map(|key| {
            tags.get(*key)
                .and_then(|v| v.as_str())
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc))
        })
    })
}
