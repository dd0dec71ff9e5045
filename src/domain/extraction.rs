//! Extraction results tagged by source, and the priority-ordered selection over them

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a field value came from, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionSource {
    Selector,
    LabelProximity,
    Regex,
    LlmFallback,
}

impl ExtractionSource {
    /// Minimum confidence for a candidate from this source to be accepted
    pub const fn floor(self) -> f32 {
        match self {
            Self::Selector | Self::Regex => 0.5,
            Self::LabelProximity => 0.6,
            Self::LlmFallback => 0.0,
        }
    }
}

impl fmt::Display for ExtractionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Selector => "selector",
            Self::LabelProximity => "label-proximity",
            Self::Regex => "regex",
            Self::LlmFallback => "llm-fallback",
        })
    }
}

pub const HINT_SELECTOR_CONFIDENCE: f32 = 0.9;
pub const SEMANTIC_SELECTOR_CONFIDENCE: f32 = 0.55;
pub const LABEL_INLINE_CONFIDENCE: f32 = 0.8;
pub const LABEL_MIN_CONFIDENCE: f32 = 0.6;
pub const LABEL_DISTANCE_STEP: f32 = 0.05;
pub const REGEX_CONFIDENCE: f32 = 0.5;
/// Heuristic confidence below which a required field goes to the fallback
pub const FALLBACK_THRESHOLD: f32 = 0.5;
pub const FALLBACK_CONFIDENCE_CAP: f32 = 0.7;

/// Per-field extraction outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub value: Option<String>,
    pub confidence: f32,
    pub source: Option<ExtractionSource>,
}

impl ExtractionResult {
    pub fn new(value: impl Into<String>, confidence: f32, source: ExtractionSource) -> Self {
        Self {
            value: Some(value.into()),
            confidence: confidence.clamp(0.0, 1.0),
            source: Some(source),
        }
    }

    /// No source produced a value
    pub const fn missing() -> Self {
        Self {
            value: None,
            confidence: 0.0,
            source: None,
        }
    }

    /// A source was tried and failed (e.g. the fallback errored)
    pub const fn failed(source: ExtractionSource) -> Self {
        Self {
            value: None,
            confidence: 0.0,
            source: Some(source),
        }
    }

    pub fn has_value(&self) -> bool {
        self.value.as_deref().is_some_and(|v| !v.trim().is_empty())
    }

    /// Value present and confidence at or above its source's floor
    pub fn is_accepted(&self) -> bool {
        self.has_value() && self.source.is_some_and(|source| self.confidence >= source.floor())
    }
}

/// Signal for the fallback decision. Not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionOutcome {
    Confident,
    LowConfidence,
    Missing,
}

impl ExtractionOutcome {
    pub fn of(result: &ExtractionResult) -> Self {
        if !result.has_value() {
            Self::Missing
        } else if result.confidence < FALLBACK_THRESHOLD {
            Self::LowConfidence
        } else {
            Self::Confident
        }
    }

    pub const fn needs_fallback(self) -> bool {
        !matches!(self, Self::Confident)
    }
}

/// Pick the first candidate, in source priority order, that clears its floor.
///
/// Candidates must already be in the order the sources were tried; a later
/// candidate never overrides an earlier accepted one, whatever its confidence.
pub fn select_best<I>(candidates: I) -> ExtractionResult
where
    I: IntoIterator<Item = ExtractionResult>,
{
    candidates
        .into_iter()
        .find(ExtractionResult::is_accepted)
        .unwrap_or_else(ExtractionResult::missing)
}

/// Results for every schema field, in schema order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldResults {
    entries: Vec<(String, ExtractionResult)>,
}

impl FieldResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, result: ExtractionResult) {
        let field = field.into();
        if let Some(slot) = self.entries.iter_mut().find(|(name, _)| *name == field) {
            slot.1 = result;
        } else {
            self.entries.push((field, result));
        }
    }

    pub fn get(&self, field: &str) -> Option<&ExtractionResult> {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, result)| result)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ExtractionResult)> {
        self.entries.iter().map(|(name, result)| (name.as_str(), result))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_best_respects_priority_over_confidence() {
        let picked = select_best(vec![
            ExtractionResult::new("a@x.org", 0.6, ExtractionSource::LabelProximity),
            ExtractionResult::new("b@x.org", 0.9, ExtractionSource::Selector),
        ]);
        assert_eq!(picked.value.as_deref(), Some("a@x.org"));
    }

    #[test]
    fn test_select_best_skips_candidates_below_floor() {
        let picked = select_best(vec![
            ExtractionResult::new("weak", 0.55, ExtractionSource::LabelProximity),
            ExtractionResult::new("strong", 0.5, ExtractionSource::Regex),
        ]);
        assert_eq!(picked.source, Some(ExtractionSource::Regex));

        let none = select_best(vec![ExtractionResult::new("  ", 0.9, ExtractionSource::Selector)]);
        assert_eq!(none, ExtractionResult::missing());
    }

    #[test]
    fn test_outcome_classification() {
        assert_eq!(ExtractionOutcome::of(&ExtractionResult::missing()), ExtractionOutcome::Missing);
        assert_eq!(
            ExtractionOutcome::of(&ExtractionResult::new("x", 0.3, ExtractionSource::LlmFallback)),
            ExtractionOutcome::LowConfidence
        );
        assert!(!ExtractionOutcome::of(&ExtractionResult::new("x", 0.8, ExtractionSource::LabelProximity))
            .needs_fallback());
    }

    #[test]
    fn test_field_results_keep_insertion_order() {
        let mut results = FieldResults::new();
        results.insert("name", ExtractionResult::missing());
        results.insert("email", ExtractionResult::new("a@b.org", 0.5, ExtractionSource::Regex));
        results.insert("name", ExtractionResult::new("Jane", 0.9, ExtractionSource::Selector));
        let names: Vec<_> = results.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["name", "email"]);
        assert_eq!(results.get("name").unwrap().value.as_deref(), Some("Jane"));
    }
}
