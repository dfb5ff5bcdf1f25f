//! Canonical link form used to detect duplicate results.
//!
//! Two links that differ only in scheme/host case, a default port, a
//! leading `www.`, tracking parameters, query-parameter order, a fragment
//! or a trailing slash canonicalise to the same string.

use url::Url;

/// Query parameters that never change page content.
const TRACKING_PARAMS: &[&str] = &[
    "fbclid", "gclid", "dclid", "msclkid", "mc_cid", "mc_eid", "yclid", "igshid", "ref", "ref_src",
    "si", "feature", "_hsenc", "_hsmi",
];

/// Prefixes of tracking parameter families.
const TRACKING_PREFIXES: &[&str] = &["utm_", "pk_", "mtm_"];

/// Canonicalise `raw` for duplicate detection.
///
/// Unparseable input (and non-hierarchical links such as `offline:`
/// placeholders) is returned trimmed but otherwise unchanged.
///
/// ```
/// use vantage_search::ranking::url_normalize::normalize_url;
///
/// assert_eq!(
///     normalize_url("HTTPS://www.Example.com:443/docs/?b=2&utm_source=x&a=1#intro"),
///     normalize_url("https://example.com/docs?a=1&b=2"),
/// );
/// ```
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let Ok(mut url) = Url::parse(trimmed) else {
        return trimmed.to_owned();
    };
    if url.cannot_be_a_base() {
        return trimmed.to_owned();
    }

    url.set_fragment(None);

    if let Some(host) = url.host_str().and_then(|h| h.strip_prefix("www.")).map(str::to_owned) {
        // Fails only for hosts that are not valid once stripped; keep the original then.
        let _ = url.set_host(Some(&host));
    }
    if matches!((url.scheme(), url.port()), ("http", Some(80)) | ("https", Some(443))) {
        let _ = url.set_port(None);
    }

    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    params.sort();
    if params.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(&params);
    }

    let path = url.path().to_owned();
    if path.len() > 1 && path.ends_with('/') {
        url.set_path(path.trim_end_matches('/'));
    }

    url.to_string()
}

fn is_tracking_param(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    TRACKING_PARAMS.contains(&key.as_str()) || TRACKING_PREFIXES.iter().any(|p| key.starts_with(p))
}
