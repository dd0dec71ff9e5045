//! Heuristic field extraction for detail pages
//!
//! For every schema field, sources are tried in priority order and the first candidate
//! that clears its source floor wins:
//!
//! 1. hint selector for the field (0.9)
//! 2. label proximity: `Label: value` inline (0.8), or the nearest following text or
//!    link inside the label's container (0.8 minus 0.05 per extra segment, floor 0.6)
//! 3. semantic markup defaults such as `h1`, `itemprop` or `mailto:` links (0.55)
//! 4. type-specific regex over the visible page text (0.5)
//!
//! Every candidate is pre-checked with the field resolver, so a source only "hits" when its
//! value would validate. Required fields that end up below the fallback threshold go to the
//! injected [`FallbackExtractor`] exactly once, with its confidence capped at 0.7.

use std::collections::HashMap;
use std::iter;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;

use super::config::ParsingConfig;
use super::dom::{self, Segment};
use crate::domain::extraction::{
    ExtractionOutcome, ExtractionResult, ExtractionSource, FieldResults, FALLBACK_CONFIDENCE_CAP, select_best,
    HINT_SELECTOR_CONFIDENCE, LABEL_DISTANCE_STEP, LABEL_INLINE_CONFIDENCE, LABEL_MIN_CONFIDENCE,
    REGEX_CONFIDENCE, SEMANTIC_SELECTOR_CONFIDENCE,
};
use crate::domain::hints::SiteHints;
use crate::domain::page::Page;
use crate::domain::ports::FallbackExtractor;
use crate::domain::schema::{FieldSchema, FieldSpec, FieldType};
use crate::infrastructure::field_resolvers;

static EMAIL_IN_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:mailto:)?[a-z0-9][a-z0-9._%+\-]*@[a-z0-9.\-]+\.[a-z]{2,24}").expect("static regex")
});

/// `+CC` international, `(555) 123-4567` or `555-123-4567`
static PHONE_IN_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"\+\d{1,3}[\s.\-]?\(?\d{1,4}\)?(?:[\s.\-]?\d{1,4}){1,4}\b",
        r"|\(\d{3}\)\s*\d{3}[\s.\-]?\d{4}\b",
        r"|\b\d{3}[\s.\-]?\d{3}[\s.\-]?\d{4}\b",
    ))
    .expect("static regex")
});

static URL_IN_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^\s<>"'()]+"#).expect("static regex"));

/// Start of another `Label:` inside an inline remainder
static NEXT_INLINE_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+\p{Lu}[\p{L} .\-]{0,30}:\s").expect("static regex"));

/// Label patterns for one field
struct LabelPattern {
    /// Whole segment is the label, e.g. `E-mail:`
    standalone: Regex,
    /// Label followed by its value in the same text, capture 1 is the value
    inline: Regex,
}

impl LabelPattern {
    fn new(labels: &[String]) -> Option<Self> {
        if labels.is_empty() {
            return None;
        }
        let alternation = labels
            .iter()
            .map(|label| regex::escape(label))
            .collect::<Vec<_>>()
            .join("|");

        let standalone = Regex::new(&format!(r"(?i)^(?:{alternation})\s*[:：]?$"));
        let inline = Regex::new(&format!(r"(?i)(?:^|[^\p{{L}}\p{{N}}])(?:{alternation})\s*[:：]\s*(\S.*)$"));
        match (standalone, inline) {
            (Ok(standalone), Ok(inline)) => Some(Self { standalone, inline }),
            (Err(e), _) | (_, Err(e)) => {
                warn!("Failed to build label pattern: {}", e);
                None
            }
        }
    }

    fn is_label(&self, text: &str) -> bool {
        self.standalone.is_match(text)
    }

    fn inline_value<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.inline
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }
}

/// Extracts schema fields from detail pages without per-site code
pub struct FieldExtractor {
    config: ParsingConfig,
    semantic: HashMap<String, Vec<Selector>>,
    semantic_by_type: HashMap<FieldType, Vec<Selector>>,
}

impl Default for FieldExtractor {
    fn default() -> Self {
        Self::with_config(ParsingConfig::default())
    }
}

impl FieldExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ParsingConfig) -> Self {
        let semantic = config
            .semantic_selectors
            .iter()
            .map(|(field, selectors)| (field.clone(), dom::compile_selector_list(selectors)))
            .collect();
        let semantic_by_type = config
            .type_selectors
            .iter()
            .map(|(field_type, selectors)| (*field_type, dom::compile_selector_list(selectors)))
            .collect();
        Self {
            config,
            semantic,
            semantic_by_type,
        }
    }

    /// Heuristic phase only: selector, label proximity, semantic markup and regex
    pub fn extract_heuristic(
        &self,
        page: &Page,
        schema: &FieldSchema,
        hints: Option<&SiteHints>,
    ) -> FieldResults {
        let document = page.document();
        self.extract_from_document(&document, page.url(), schema, hints)
    }

    pub fn extract_from_document(
        &self,
        document: &Html,
        base: &Url,
        schema: &FieldSchema,
        hints: Option<&SiteHints>,
    ) -> FieldResults {
        let text = dom::visible_text(document);
        let mut results = FieldResults::new();

        for field in schema.fields() {
            let result = self.extract_field(document, &text, base, field, hints);
            debug!(
                "Field '{}' -> {:?} (confidence {:.2}, source {:?})",
                field.name, result.value, result.confidence, result.source
            );
            results.insert(field.name.clone(), result);
        }
        results
    }

    /// Full extraction: heuristics, then the fallback for uncertain required fields
    pub async fn extract(
        &self,
        page: &Page,
        schema: &FieldSchema,
        hints: Option<&SiteHints>,
        fallback: &dyn FallbackExtractor,
    ) -> FieldResults {
        let mut results = self.extract_heuristic(page, schema, hints);

        let pending: Vec<&FieldSpec> = schema
            .required_fields()
            .filter(|field| {
                results
                    .get(&field.name)
                    .is_none_or(|result| ExtractionOutcome::of(result).needs_fallback())
            })
            .collect();

        if pending.is_empty() || !fallback.is_enabled() {
            return results;
        }

        let text = page.text();
        for field in pending {
            let outcome = results
                .get(&field.name)
                .map_or(ExtractionOutcome::Missing, ExtractionOutcome::of);
            debug!(
                "{:?} for required field '{}' on {}, asking fallback",
                outcome,
                field.name,
                page.url()
            );
            let result = match fallback.extract_field(&text, &field.name, field.field_type).await {
                Ok(answer) => match answer.value.filter(|v| !v.trim().is_empty()) {
                    Some(value) => ExtractionResult::new(
                        value,
                        answer.confidence.min(FALLBACK_CONFIDENCE_CAP),
                        ExtractionSource::LlmFallback,
                    ),
                    None => ExtractionResult::failed(ExtractionSource::LlmFallback),
                },
                Err(e) => {
                    warn!("Fallback failed for field '{}' on {}: {}", field.name, page.url(), e);
                    ExtractionResult::failed(ExtractionSource::LlmFallback)
                }
            };
            results.insert(field.name.clone(), result);
        }
        results
    }

    fn extract_field(
        &self,
        document: &Html,
        text: &str,
        base: &Url,
        field: &FieldSpec,
        hints: Option<&SiteHints>,
    ) -> ExtractionResult {
        let hinted = iter::once_with(|| {
            let selector = hints.and_then(|h| h.field_selector(&field.name))?;
            let value = Self::from_selectors(document, std::slice::from_ref(selector), field, base)?;
            Some(ExtractionResult::new(value, HINT_SELECTOR_CONFIDENCE, ExtractionSource::Selector))
        });
        let labelled = iter::once_with(|| {
            let hint_synonyms = hints.map_or(&[][..], |h| h.label_synonyms(&field.name));
            let pattern = LabelPattern::new(&self.config.labels_for(field, hint_synonyms))?;
            let (value, confidence) = self.from_label_proximity(document, &pattern, field, base)?;
            Some(ExtractionResult::new(value, confidence, ExtractionSource::LabelProximity))
        });
        let semantic = iter::once_with(|| {
            let value = self.from_semantic_markup(document, field, base)?;
            Some(ExtractionResult::new(value, SEMANTIC_SELECTOR_CONFIDENCE, ExtractionSource::Selector))
        });
        let matched = iter::once_with(|| {
            let value = Self::from_regex(text, field, base)?;
            Some(ExtractionResult::new(value, REGEX_CONFIDENCE, ExtractionSource::Regex))
        });

        // Sources are only evaluated until one is accepted
        select_best(hinted.chain(labelled).chain(semantic).chain(matched).flatten())
    }

    /// First element across `selectors` whose value passes the resolver
    fn from_selectors(document: &Html, selectors: &[Selector], field: &FieldSpec, base: &Url) -> Option<String> {
        let prefer_href = matches!(field.field_type, FieldType::Email | FieldType::Phone | FieldType::Url);
        selectors
            .iter()
            .flat_map(|selector| document.select(selector))
            .filter_map(|element| dom::element_value(element, prefer_href))
            .find(|value| field_resolvers::accepts(value, field.field_type, Some(base)))
    }

    fn from_semantic_markup(&self, document: &Html, field: &FieldSpec, base: &Url) -> Option<String> {
        let by_name = self.semantic.get(&field.name.to_lowercase());
        if let Some(value) = by_name.and_then(|selectors| Self::from_selectors(document, selectors, field, base)) {
            return Some(value);
        }

        let by_type = self.semantic_by_type.get(&field.field_type)?;
        Self::from_selectors(document, by_type, field, base)
    }

    fn from_regex(text: &str, field: &FieldSpec, base: &Url) -> Option<String> {
        let pattern: &Regex = match field.field_type {
            FieldType::Email => &EMAIL_IN_TEXT,
            FieldType::Phone => &PHONE_IN_TEXT,
            FieldType::Url => &URL_IN_TEXT,
            FieldType::Str | FieldType::Text => return None,
        };
        pattern
            .find_iter(text)
            .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ':']).to_string())
            .find(|candidate| field_resolvers::accepts(candidate, field.field_type, Some(base)))
    }

    /// Best label-proximity hit over all label occurrences; earliest wins ties
    fn from_label_proximity(
        &self,
        document: &Html,
        pattern: &LabelPattern,
        field: &FieldSpec,
        base: &Url,
    ) -> Option<(String, f32)> {
        let mut best: Option<(String, f32)> = None;

        for node in document.root_element().descendants() {
            let Some(raw_text) = node.value().as_text() else {
                continue;
            };
            let hidden = node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .is_some_and(|el| dom::is_skipped_tag(el.name()))
            });
            if hidden {
                continue;
            }
            let text = dom::collapse_whitespace(raw_text);
            if text.is_empty() {
                continue;
            }

            if let Some(remainder) = pattern.inline_value(&text) {
                if let Some(value) = Self::value_from_text(remainder, field, base, true) {
                    // Nothing can beat an inline hit
                    return Some((value, LABEL_INLINE_CONFIDENCE));
                }
            }

            if !pattern.is_label(&text) {
                continue;
            }
            let Some(label_element) = node.parent().and_then(ElementRef::wrap) else {
                continue;
            };
            if let Some(hit) = self.search_containers(label_element, &text, pattern, field, base) {
                if best.as_ref().is_none_or(|(_, confidence)| hit.1 > *confidence) {
                    best = Some(hit);
                }
            }
        }
        best
    }

    /// Walk up from the label's parent container until one has content after the label
    fn search_containers(
        &self,
        label_element: ElementRef<'_>,
        label_text: &str,
        pattern: &LabelPattern,
        field: &FieldSpec,
        base: &Url,
    ) -> Option<(String, f32)> {
        let mut container = dom::parent_element(label_element);

        for _ in 0..3 {
            let current = container?;
            let segments = dom::segments(current);
            let Some(label_index) = segments
                .iter()
                .position(|segment| matches!(segment, Segment::Text(t) if t == label_text))
            else {
                container = dom::parent_element(current);
                continue;
            };

            let following = &segments[label_index + 1..];
            if following.is_empty() {
                container = dom::parent_element(current);
                continue;
            }

            for (offset, segment) in following.iter().take(self.config.max_label_distance).enumerate() {
                if let Segment::Text(candidate) = segment {
                    if pattern.is_label(candidate) || looks_like_label(candidate) {
                        break;
                    }
                }
                if let Some(value) = Self::value_from_segment(segment, field, base) {
                    #[allow(clippy::cast_precision_loss)]
                    let confidence = (LABEL_INLINE_CONFIDENCE - LABEL_DISTANCE_STEP * offset as f32)
                        .max(LABEL_MIN_CONFIDENCE);
                    return Some((value, confidence));
                }
            }
            return None;
        }
        None
    }

    fn value_from_segment(segment: &Segment, field: &FieldSpec, base: &Url) -> Option<String> {
        match segment {
            Segment::Text(text) => Self::value_from_text(text, field, base, false),
            Segment::Link(href) => {
                let lowered = href.to_ascii_lowercase();
                let usable = match field.field_type {
                    FieldType::Email => lowered.starts_with("mailto:"),
                    FieldType::Phone => lowered.starts_with("tel:"),
                    FieldType::Url => !lowered.starts_with("mailto:")
                        && !lowered.starts_with("tel:")
                        && !lowered.starts_with("javascript:")
                        && !lowered.starts_with('#'),
                    FieldType::Str | FieldType::Text => false,
                };
                (usable && field_resolvers::accepts(href, field.field_type, Some(base))).then(|| href.clone())
            }
        }
    }

    /// Typed token inside `text`, or the text itself for free-text fields
    fn value_from_text(text: &str, field: &FieldSpec, base: &Url, inline: bool) -> Option<String> {
        let accepted = |candidate: &str| field_resolvers::accepts(candidate, field.field_type, Some(base));

        let typed: Option<&Regex> = match field.field_type {
            FieldType::Email => Some(&EMAIL_IN_TEXT),
            FieldType::Phone => Some(&PHONE_IN_TEXT),
            FieldType::Url => Some(&URL_IN_TEXT),
            FieldType::Str | FieldType::Text => None,
        };

        if let Some(pattern) = typed {
            let token = pattern
                .find_iter(text)
                .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ':']))
                .find(|candidate| accepted(candidate));
            if let Some(token) = token {
                return Some(token.to_string());
            }
            // Bare relative link text such as `/people/jane/cv`
            let whole = text.trim();
            return (field.field_type == FieldType::Url && !whole.contains(char::is_whitespace) && accepted(whole))
                .then(|| whole.to_string());
        }

        let value = if inline {
            NEXT_INLINE_LABEL
                .find(text)
                .map_or(text, |m| &text[..m.start()])
        } else {
            text
        };
        let value = value.trim();
        accepted(value).then(|| value.to_string())
    }
}

/// Short text ending in a colon, such as `Office:`
fn looks_like_label(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.len() <= 40 && trimmed.ends_with([':', '：']) && !trimmed.contains('@')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::FallbackAnswer;
    use crate::error::FallbackError;
    use async_trait::async_trait;
    use rstest::rstest;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn page(body: &str) -> Page {
        Page::new(
            "https://example.edu/people/jane",
            format!("<html><head><title>Profile</title></head><body>{body}</body></html>"),
            false,
        )
        .unwrap()
    }

    fn schema(raw: &str) -> FieldSchema {
        FieldSchema::from_json_str(raw).unwrap()
    }

    struct CountingFallback {
        calls: AtomicUsize,
        answer: Result<FallbackAnswer, FallbackError>,
    }

    #[async_trait]
    impl FallbackExtractor for CountingFallback {
        async fn extract_field(&self, _: &str, _: &str, _: FieldType) -> Result<FallbackAnswer, FallbackError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer.clone()
        }
    }

    #[test]
    fn test_inline_label_scores_high() {
        let results = FieldExtractor::new().extract_heuristic(
            &page("<p>Email: jane@example.edu</p>"),
            &schema(r#"{"email": "email"}"#),
            None,
        );
        let email = results.get("email").unwrap();
        assert_eq!(email.value.as_deref(), Some("jane@example.edu"));
        assert_eq!(email.source, Some(ExtractionSource::LabelProximity));
        assert!(email.confidence >= 0.6);
    }

    #[test]
    fn test_label_in_definition_list_uses_distance() {
        let body = r#"<dl class="contact">
            <dt>Phone</dt><dd>Office hours vary</dd><dd>(555) 123-4567</dd>
        </dl>"#;
        let results =
            FieldExtractor::new().extract_heuristic(&page(body), &schema(r#"{"phone": "phone"}"#), None);
        let phone = results.get("phone").unwrap();
        assert_eq!(phone.value.as_deref(), Some("(555) 123-4567"));
        assert_eq!(phone.source, Some(ExtractionSource::LabelProximity));
        assert!((phone.confidence - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_label_search_stops_at_next_label() {
        let body = r#"<div class="row"><span>Website:</span><span>Office:</span><span>Room 5</span>
            <span>see https://jane.example.edu/home for more</span></div>"#;
        let results =
            FieldExtractor::new().extract_heuristic(&page(body), &schema(r#"{"website": "url"}"#), None);
        let website = results.get("website").unwrap();
        // the label hit is blocked by "Office:", so the regex finds the URL
        assert_eq!(website.source, Some(ExtractionSource::Regex));
        assert_eq!(website.value.as_deref(), Some("https://jane.example.edu/home"));
    }

    #[test]
    fn test_mailto_link_after_label() {
        let body = r#"<li><strong>Contact:</strong> <a href="mailto:Jane@Example.edu">write to Jane</a></li>"#;
        let results =
            FieldExtractor::new().extract_heuristic(&page(body), &schema(r#"{"email": "email"}"#), None);
        let email = results.get("email").unwrap();
        assert_eq!(email.value.as_deref(), Some("mailto:Jane@Example.edu"));
        assert!((email.confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_hint_selector_wins() {
        let hints = crate::domain::hints::SiteHintsConfig {
            fields: [("name".to_string(), ".profile-name".to_string())].into(),
            ..Default::default()
        }
        .compile()
        .unwrap();
        let body = r#"<h1>Faculty Directory</h1><span class="profile-name"> Jane   Doe </span><p>Name: Someone Else</p>"#;
        let results =
            FieldExtractor::new().extract_heuristic(&page(body), &schema(r#"{"name": "str"}"#), Some(&hints));
        let name = results.get("name").unwrap();
        assert_eq!(name.value.as_deref(), Some("Jane Doe"));
        assert_eq!(name.source, Some(ExtractionSource::Selector));
        assert!((name.confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_semantic_defaults_then_regex() {
        let body = r#"<h1>Jane Doe</h1><p>Reach me at jane.doe@example.edu or +1 (555) 987-6543.</p>"#;
        let results = FieldExtractor::new().extract_heuristic(
            &page(body),
            &schema(r#"{"name": "str", "email": "email", "phone": "phone?"}"#),
            None,
        );
        let name = results.get("name").unwrap();
        assert_eq!(name.value.as_deref(), Some("Jane Doe"));
        assert!((name.confidence - 0.55).abs() < 1e-6);

        let email = results.get("email").unwrap();
        assert_eq!(email.source, Some(ExtractionSource::Regex));
        assert_eq!(email.value.as_deref(), Some("jane.doe@example.edu"));

        let phone = results.get("phone").unwrap();
        assert_eq!(phone.source, Some(ExtractionSource::Regex));
        assert!(field_resolvers::accepts(phone.value.as_deref().unwrap(), FieldType::Phone, None));
    }

    #[rstest]
    #[case::year_range_in_bio("<p>Board member 2019 - 2024.</p>")]
    #[case::labelled_year_range("<p>Phone: Years of service 2010-2024</p>")]
    #[case::date("<p>Last updated 2024.01.15</p>")]
    #[case::isbn("<p>ISBN 978-3-16-148410-0</p>")]
    #[case::postal_code("<p>Cambridge, MA 02139-4307</p>")]
    fn test_digit_runs_are_not_phone_numbers(#[case] body: &str) {
        let results =
            FieldExtractor::new().extract_heuristic(&page(body), &schema(r#"{"phone": "phone"}"#), None);
        let phone = results.get("phone").unwrap();
        assert_eq!(phone.value, None);
        assert!(ExtractionOutcome::of(phone).needs_fallback());
    }

    #[rstest]
    #[case("<p>Call 555-123-4567 today</p>", "555-123-4567")]
    #[case("<p>Office (555) 123 4567</p>", "(555) 123 4567")]
    #[case("<p>London +44 20 7946 0958</p>", "+44 20 7946 0958")]
    fn test_phone_shapes_in_text(#[case] body: &str, #[case] expected: &str) {
        let results =
            FieldExtractor::new().extract_heuristic(&page(body), &schema(r#"{"phone": "phone"}"#), None);
        let phone = results.get("phone").unwrap();
        assert_eq!(phone.value.as_deref(), Some(expected));
        assert_eq!(phone.source, Some(ExtractionSource::Regex));
    }

    #[tokio::test]
    async fn test_fallback_runs_when_phone_label_holds_years() {
        let fallback = CountingFallback {
            calls: AtomicUsize::new(0),
            answer: Ok(FallbackAnswer {
                value: Some("555-123-4567".into()),
                confidence: 0.9,
            }),
        };
        let results = FieldExtractor::new()
            .extract(
                &page("<p>Phone: Years of service 2010-2024</p>"),
                &schema(r#"{"phone": "phone"}"#),
                None,
                &fallback,
            )
            .await;
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 1);
        assert_eq!(results.get("phone").unwrap().source, Some(ExtractionSource::LlmFallback));
    }

    #[tokio::test]
    async fn test_fallback_called_once_for_missing_required_field() {
        let fallback = CountingFallback {
            calls: AtomicUsize::new(0),
            answer: Ok(FallbackAnswer {
                value: Some("jane@example.edu".into()),
                confidence: 0.95,
            }),
        };
        let results = FieldExtractor::new()
            .extract(
                &page("<p>No contact details here.</p>"),
                &schema(r#"{"email": "email", "phone": "phone?"}"#),
                None,
                &fallback,
            )
            .await;

        assert_eq!(fallback.calls.load(Ordering::SeqCst), 1);
        let email = results.get("email").unwrap();
        assert_eq!(email.source, Some(ExtractionSource::LlmFallback));
        assert!((email.confidence - 0.7).abs() < 1e-6);
        assert!(results.get("phone").unwrap().value.is_none());
    }

    #[tokio::test]
    async fn test_fallback_error_is_missing_value() {
        let fallback = CountingFallback {
            calls: AtomicUsize::new(0),
            answer: Err(FallbackError::Provider("timeout".into())),
        };
        let results = FieldExtractor::new()
            .extract(&page("<p>Nothing</p>"), &schema(r#"{"email": "email"}"#), None, &fallback)
            .await;
        let email = results.get("email").unwrap();
        assert!(email.value.is_none());
        assert_eq!(email.confidence, 0.0);
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fallback_skipped_when_heuristics_succeed() {
        let fallback = CountingFallback {
            calls: AtomicUsize::new(0),
            answer: Err(FallbackError::Disabled),
        };
        let _ = FieldExtractor::new()
            .extract(&page("<p>Email: jane@example.edu</p>"), &schema(r#"{"email": "email"}"#), None, &fallback)
            .await;
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 0);
    }
}
