//! Fallback extractor implementations
//!
//! [`DisabledFallback`] is the default: the engine runs fully offline and uncertain
//! required fields simply stay missing. [`BudgetedFallback`] wraps a real provider,
//! caps the number of calls per run and truncates the page text it forwards.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::domain::ports::{FallbackAnswer, FallbackExtractor};
use crate::domain::schema::FieldType;
use crate::error::FallbackError;
use crate::infrastructure::config::FallbackConfig;

/// No-op fallback
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledFallback;

#[async_trait]
impl FallbackExtractor for DisabledFallback {
    async fn extract_field(&self, _: &str, _: &str, _: FieldType) -> Result<FallbackAnswer, FallbackError> {
        Err(FallbackError::Disabled)
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Call budget and input truncation around another fallback
pub struct BudgetedFallback<F> {
    inner: F,
    budget: u32,
    max_text_chars: usize,
    calls: AtomicU32,
}

impl<F: FallbackExtractor> BudgetedFallback<F> {
    pub const fn new(inner: F, budget: u32, max_text_chars: usize) -> Self {
        Self {
            inner,
            budget,
            max_text_chars,
            calls: AtomicU32::new(0),
        }
    }

    pub const fn from_config(inner: F, config: &FallbackConfig) -> Self {
        Self::new(inner, config.budget, config.max_text_chars)
    }

    /// Calls forwarded (or refused for budget) so far
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::Relaxed).min(self.budget)
    }

    pub fn remaining(&self) -> u32 {
        self.budget.saturating_sub(self.calls.load(Ordering::Relaxed))
    }
}

/// At most `max_chars` characters, cut on a char boundary
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    text.char_indices()
        .nth(max_chars)
        .map_or(text, |(index, _)| &text[..index])
}

#[async_trait]
impl<F: FallbackExtractor> FallbackExtractor for BudgetedFallback<F> {
    async fn extract_field(
        &self,
        page_text: &str,
        field_name: &str,
        field_type: FieldType,
    ) -> Result<FallbackAnswer, FallbackError> {
        let previous = self.calls.fetch_add(1, Ordering::SeqCst);
        if previous >= self.budget {
            if previous == self.budget {
                warn!("Fallback budget of {} calls exhausted", self.budget);
            }
            return Err(FallbackError::BudgetExhausted { budget: self.budget });
        }

        let text = truncate_chars(page_text, self.max_text_chars);
        debug!(
            "Fallback call {}/{} for field '{}' ({} chars)",
            previous + 1,
            self.budget,
            field_name,
            text.len()
        );

        let answer = self.inner.extract_field(text, field_name, field_type).await?;
        if !answer.confidence.is_finite() {
            return Err(FallbackError::Unusable(format!(
                "non-finite confidence for '{field_name}'"
            )));
        }
        Ok(FallbackAnswer {
            value: answer.value,
            confidence: answer.confidence.clamp(0.0, 1.0),
        })
    }

    fn is_enabled(&self) -> bool {
        self.inner.is_enabled() && self.budget > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingFallback {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl FallbackExtractor for RecordingFallback {
        async fn extract_field(&self, text: &str, _: &str, _: FieldType) -> Result<FallbackAnswer, FallbackError> {
            self.seen.lock().unwrap().push(text.to_string());
            Ok(FallbackAnswer {
                value: Some("x".into()),
                confidence: 3.0,
            })
        }
    }

    #[test]
    fn test_disabled_fallback_refuses() {
        let fallback = DisabledFallback;
        assert!(!fallback.is_enabled());
        let result = tokio_test::block_on(fallback.extract_field("text", "email", FieldType::Email));
        assert_eq!(result, Err(FallbackError::Disabled));
    }

    #[tokio::test]
    async fn test_budget_is_enforced_and_text_truncated() {
        let fallback = BudgetedFallback::new(RecordingFallback::default(), 2, 5);
        assert!(fallback.is_enabled());

        let first = fallback.extract_field("héllo world", "name", FieldType::Str).await.unwrap();
        assert_eq!(first.confidence, 1.0);
        fallback.extract_field("abc", "name", FieldType::Str).await.unwrap();
        let third = fallback.extract_field("abc", "name", FieldType::Str).await;

        assert_eq!(third, Err(FallbackError::BudgetExhausted { budget: 2 }));
        assert_eq!(fallback.calls(), 2);
        assert_eq!(fallback.remaining(), 0);
        assert_eq!(*fallback.inner.seen.lock().unwrap(), vec!["héllo".to_string(), "abc".to_string()]);
    }

    #[test]
    fn test_zero_budget_disables() {
        let fallback = BudgetedFallback::new(RecordingFallback::default(), 0, 100);
        assert!(!fallback.is_enabled());
    }
}
