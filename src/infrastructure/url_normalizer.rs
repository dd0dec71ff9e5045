//! URL normalization and link resolution helpers
//!
//! Every URL that is checked against or inserted into a visited set goes through
//! [`normalize`] first: default ports and fragments are dropped, session-like query
//! parameters are removed, the remaining parameters are sorted by key and a trailing
//! slash is stripped from non-root paths.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// Query parameters that change per visit without changing the page
const VOLATILE_PARAMS: &[&str] = &[
    "sid",
    "sessionid",
    "session_id",
    "session",
    "jsessionid",
    "phpsessid",
    "aspsessionid",
    "cfid",
    "cftoken",
    "token",
    "csrf",
    "_",
    "fbclid",
    "gclid",
    "msclkid",
];

static PATH_SESSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i);(jsessionid|phpsessid|sid)=[^/?#]*").expect("static regex"));

/// Whether a query parameter is session/tracking noise
pub fn is_volatile_param(name: &str) -> bool {
    let lowered = name.to_ascii_lowercase();
    lowered.starts_with("utm_") || VOLATILE_PARAMS.contains(&lowered.as_str())
}

/// Normalize an already-parsed URL
pub fn normalize(url: &Url) -> Url {
    let mut normalized = url.clone();
    normalized.set_fragment(None);

    if normalized.port().is_some() && normalized.port() == default_port(normalized.scheme()) {
        // Only fails for cannot-be-a-base URLs, which have no port to begin with
        let _ = normalized.set_port(None);
    }

    if !normalized.cannot_be_a_base() {
        let path = PATH_SESSION.replace_all(normalized.path(), "").into_owned();
        let trimmed = path.trim_end_matches('/');
        let path = if trimmed.is_empty() { "/" } else { trimmed };
        normalized.set_path(path);
    }

    let mut pairs: Vec<(String, String)> = normalized
        .query_pairs()
        .filter(|(key, _)| !key.is_empty() && !is_volatile_param(key))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    if pairs.is_empty() {
        normalized.set_query(None);
    } else {
        normalized.query_pairs_mut().clear().extend_pairs(pairs.iter());
    }

    normalized
}

/// Parse and normalize a URL string
pub fn normalize_str(raw: &str) -> Result<String, url::ParseError> {
    Url::parse(raw.trim()).map(|url| normalize(&url).to_string())
}

const fn default_port_for(scheme_is_https: bool) -> u16 {
    if scheme_is_https { 443 } else { 80 }
}

fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" | "ws" => Some(default_port_for(false)),
        "https" | "wss" => Some(default_port_for(true)),
        _ => None,
    }
}

/// Resolve an `href` against the page URL, keeping only http(s) targets.
///
/// `javascript:`, `mailto:`, `tel:` and bare fragment links resolve to `None`.
pub fn resolve_href(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let resolved = base.join(href).ok()?;
    is_http(&resolved).then_some(resolved)
}

pub fn is_http(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https") && url.host_str().is_some()
}

fn bare_host(url: &Url) -> Option<String> {
    url.host_str()
        .map(|host| host.trim_start_matches("www.").to_ascii_lowercase())
}

/// Same host, ignoring a leading `www.`
pub fn same_site(a: &Url, b: &Url) -> bool {
    match (bare_host(a), bare_host(b)) {
        (Some(left), Some(right)) => left == right,
        _ => false,
    }
}

/// Scheme, host and path are identical (query may differ)
pub fn same_resource(a: &Url, b: &Url) -> bool {
    same_site(a, b) && a.scheme() == b.scheme() && a.path() == b.path()
}

/// Value of the first occurrence of a query parameter
pub fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// Copy of `url` with `name` set to `value` (replacing existing occurrences)
pub fn with_query_param(url: &Url, name: &str, value: &str) -> Url {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != name)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    pairs.push((name.to_string(), value.to_string()));

    let mut updated = url.clone();
    updated.query_pairs_mut().clear().extend_pairs(pairs.iter());
    updated
}

/// Names of query parameters whose values differ between two URLs of the same resource.
///
/// Parameters present in only one of the URLs count as changed. Volatile parameters are ignored.
pub fn changed_query_params(previous: &Url, current: &Url) -> Vec<String> {
    if !same_resource(previous, current) {
        return Vec::new();
    }

    let collect = |url: &Url| -> Vec<(String, String)> {
        url.query_pairs()
            .filter(|(key, _)| !is_volatile_param(key))
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect()
    };
    let before = collect(previous);
    let after = collect(current);

    let mut changed: Vec<String> = Vec::new();
    for (key, value) in &after {
        let old = before.iter().find(|(k, _)| k == key).map(|(_, v)| v);
        if old != Some(value) && !changed.contains(key) {
            changed.push(key.clone());
        }
    }
    for (key, _) in &before {
        if !after.iter().any(|(k, _)| k == key) && !changed.contains(key) {
            changed.push(key.clone());
        }
    }
    changed
}
