//! Field resolvers: per-type validation and normalization of raw extracted values
//!
//! Every function here is pure. A raw value either normalizes to its canonical form or
//! is rejected with a [`Rejection`] that ends up in drop events.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::domain::schema::FieldType;

/// Why a raw value was refused by its resolver
#[derive(Error, Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum Rejection {
    #[error("value is empty")]
    Empty,

    #[error("not a valid email address")]
    MalformedEmail,

    #[error("domain has no top-level domain")]
    MissingTld,

    #[error("phone number has {0} digits, expected 7-15")]
    PhoneDigitCount(usize),

    #[error("'{0}' is not shaped like a phone number")]
    NotPhoneShaped(String),

    #[error("URL is relative and no base URL is available")]
    NotAbsolute,

    #[error("unsupported URL scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("unparseable value: {0}")]
    Unparseable(String),
}

pub const MIN_PHONE_DIGITS: usize = 7;
pub const MAX_PHONE_DIGITS: usize = 15;

static EMAIL_STRICT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9](?:[a-z0-9._%+\-]*[a-z0-9_%+\-])?@(?:[a-z0-9](?:[a-z0-9\-]*[a-z0-9])?\.)+[a-z]{2,24}$")
        .expect("static regex")
});

static EMAIL_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[a-z0-9.\-]+$").expect("static regex"));

/// Year ranges and calendar dates, e.g. `2019 - 2024` or `2024.01.15`
static DATE_LIKE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(?:1[89]|20)\d{2}\s*[-–./]\s*(?:1[89]|20)\d{2}|\d{4}[-./]\d{1,2}[-./]\d{1,2}|\d{1,2}[-./]\d{1,2}[-./]\d{4})$")
        .expect("static regex")
});

/// Normalize `raw` according to `field_type`.
///
/// `base` is the URL of the page the value came from; relative URLs are resolved against it.
pub fn normalize(raw: &str, field_type: FieldType, base: Option<&Url>) -> Result<String, Rejection> {
    match field_type {
        FieldType::Email => normalize_email(raw),
        FieldType::Phone => normalize_phone(raw),
        FieldType::Url => normalize_url(raw, base),
        FieldType::Str | FieldType::Text => normalize_text(raw),
    }
}

/// Lowercased `local@domain` with a real TLD
pub fn normalize_email(raw: &str) -> Result<String, Rejection> {
    let trimmed = raw.trim();
    let without_scheme = trimmed
        .get(..7)
        .filter(|prefix| prefix.eq_ignore_ascii_case("mailto:"))
        .map_or(trimmed, |_| &trimmed[7..]);
    let address = without_scheme
        .split('?')
        .next()
        .unwrap_or_default()
        .trim()
        .trim_end_matches(['.', ',', ';'])
        .to_lowercase();

    if address.is_empty() {
        return Err(Rejection::Empty);
    }
    if address.contains("..") {
        return Err(Rejection::MalformedEmail);
    }
    if EMAIL_STRICT.is_match(&address) {
        return Ok(address);
    }

    // Right shape but no usable TLD, e.g. `jane@localhost` or `jane@example.1`
    if EMAIL_SHAPE.is_match(&address) {
        let domain = address.rsplit('@').next().unwrap_or_default();
        let tld_ok = domain
            .rsplit_once('.')
            .is_some_and(|(_, tld)| tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic()));
        if !tld_ok {
            return Err(Rejection::MissingTld);
        }
    }
    Err(Rejection::MalformedEmail)
}

/// Digits only, with a leading `+` preserved
pub fn normalize_phone(raw: &str) -> Result<String, Rejection> {
    let trimmed = raw.trim();
    let without_scheme = trimmed
        .get(..4)
        .filter(|prefix| prefix.eq_ignore_ascii_case("tel:"))
        .map_or(trimmed, |_| &trimmed[4..])
        .trim();

    if without_scheme.is_empty() {
        return Err(Rejection::Empty);
    }

    let plus = without_scheme.starts_with('+');
    let digits: String = without_scheme.chars().filter(char::is_ascii_digit).collect();

    if !(MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits.len()) {
        return Err(Rejection::PhoneDigitCount(digits.len()));
    }
    if without_scheme.chars().any(char::is_alphabetic) || DATE_LIKE.is_match(without_scheme) {
        return Err(Rejection::NotPhoneShaped(without_scheme.to_string()));
    }

    Ok(if plus { format!("+{digits}") } else { digits })
}

/// Absolute http(s) URL, resolving relative input against `base`
pub fn normalize_url(raw: &str, base: Option<&Url>) -> Result<String, Rejection> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Rejection::Empty);
    }

    let parsed = match Url::parse(trimmed) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = base.ok_or(Rejection::NotAbsolute)?;
            base.join(trimmed)
                .map_err(|e| Rejection::Unparseable(e.to_string()))?
        }
        Err(e) => return Err(Rejection::Unparseable(e.to_string())),
    };

    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(Rejection::UnsupportedScheme(other.to_string())),
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(Rejection::Unparseable(format!("no host in '{trimmed}'")));
    }

    Ok(parsed.to_string())
}

/// Trimmed text with internal whitespace runs collapsed to one space
pub fn normalize_text(raw: &str) -> Result<String, Rejection> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        Err(Rejection::Empty)
    } else {
        Ok(collapsed)
    }
}

/// Whether the resolver for `field_type` would accept `raw`
pub fn accepts(raw: &str, field_type: FieldType, base: Option<&Url>) -> bool {
    normalize(raw, field_type, base).is_ok()
}
