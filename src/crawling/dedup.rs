//! Dedup and idempotency tracking
//!
//! Owns the visited detail-URL set and the composite-key index for a run. Workers only
//! touch them through [`DedupTracker::should_process`] and [`DedupTracker::admit`], both
//! serialized behind one lock.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

use crate::domain::ports::ResumeSnapshot;
use crate::domain::record::Record;
use crate::domain::schema::FieldSchema;
use crate::error::ConfigurationError;
use crate::infrastructure::url_normalizer;

/// Separator between composite-key components
pub const KEY_SEPARATOR: char = '|';

/// One component of the composite dedup key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyField {
    DetailUrl,
    Name,
    Email,
    /// Any other schema field
    Field(String),
}

impl KeyField {
    /// Schema field this component reads, if any
    pub fn field_name(&self) -> Option<&str> {
        match self {
            Self::DetailUrl => None,
            Self::Name => Some("name"),
            Self::Email => Some("email"),
            Self::Field(name) => Some(name),
        }
    }

    fn component(&self, record: &Record) -> String {
        match self {
            Self::DetailUrl => url_normalizer::normalize_str(&record.detail_url)
                .unwrap_or_else(|_| record.detail_url.trim().to_string()),
            Self::Email => record
                .get("email")
                .map(|email| email.trim().to_lowercase())
                .unwrap_or_default(),
            Self::Name | Self::Field(_) => self
                .field_name()
                .and_then(|name| record.get(name))
                .map(|value| value.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase())
                .unwrap_or_default(),
        }
    }
}

impl FromStr for KeyField {
    type Err = ConfigurationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "" => Err(ConfigurationError::invalid_value(
                "crawl.dedup_key_fields",
                "key field names cannot be empty",
            )),
            "detail_url" | "url" => Ok(Self::DetailUrl),
            "name" => Ok(Self::Name),
            "email" => Ok(Self::Email),
            other => Ok(Self::Field(other.to_string())),
        }
    }
}

impl fmt::Display for KeyField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DetailUrl => f.write_str("detail_url"),
            other => f.write_str(other.field_name().unwrap_or_default()),
        }
    }
}

/// Parse configured key names and check them against the schema
pub fn parse_key_fields(names: &[String], schema: &FieldSchema) -> Result<Vec<KeyField>, ConfigurationError> {
    if names.is_empty() {
        return Err(ConfigurationError::invalid_value(
            "crawl.dedup_key_fields",
            "at least one key field is required",
        ));
    }
    names
        .iter()
        .map(|name| {
            let field: KeyField = name.parse()?;
            match field.field_name() {
                Some(schema_name) if schema.get(schema_name).is_none() => Err(ConfigurationError::invalid_value(
                    "crawl.dedup_key_fields",
                    format!("'{schema_name}' is not a schema field"),
                )),
                _ => Ok(field),
            }
        })
        .collect()
}

/// Composite key of a record: normalized components joined with `|`
pub fn composite_key(key_fields: &[KeyField], record: &Record) -> String {
    key_fields
        .iter()
        .map(|field| field.component(record))
        .collect::<Vec<_>>()
        .join(&KEY_SEPARATOR.to_string())
}

#[derive(Debug, Default)]
struct DedupIndex {
    visited_urls: HashSet<String>,
    keys: HashSet<String>,
}

/// Visited detail URLs and admitted record keys for one run
#[derive(Debug)]
pub struct DedupTracker {
    key_fields: Vec<KeyField>,
    index: Mutex<DedupIndex>,
}

impl Default for DedupTracker {
    fn default() -> Self {
        Self::new(vec![KeyField::DetailUrl])
    }
}

impl DedupTracker {
    pub fn new(key_fields: Vec<KeyField>) -> Self {
        Self {
            key_fields,
            index: Mutex::new(DedupIndex::default()),
        }
    }

    pub fn key_fields(&self) -> &[KeyField] {
        &self.key_fields
    }

    /// Claim a detail URL. `true` the first time a (normalized) URL is seen.
    pub async fn should_process(&self, url: &Url) -> bool {
        let key = url_normalizer::normalize(url).to_string();
        let claimed = self.index.lock().await.visited_urls.insert(key);
        if !claimed {
            debug!("Already visited: {}", url);
        }
        claimed
    }

    /// Give a claimed URL back, so a resumed run fetches it again
    pub async fn release(&self, url: &Url) {
        let key = url_normalizer::normalize(url).to_string();
        self.index.lock().await.visited_urls.remove(&key);
    }

    /// Admit a record. `true` when its composite key is new.
    pub async fn admit(&self, record: &Record) -> bool {
        self.try_admit(record).await.is_ok()
    }

    /// Like [`admit`](Self::admit), but hands back the key of a rejected duplicate
    pub async fn try_admit(&self, record: &Record) -> Result<String, String> {
        let key = self.key_for(record);
        if self.index.lock().await.keys.insert(key.clone()) {
            Ok(key)
        } else {
            debug!("Duplicate record key '{}' from {}", key, record.detail_url);
            Err(key)
        }
    }

    pub fn key_for(&self, record: &Record) -> String {
        composite_key(&self.key_fields, record)
    }

    /// Sorted copy of both sets, for persistence
    pub async fn snapshot(&self) -> ResumeSnapshot {
        let index = self.index.lock().await;
        let mut visited_urls: Vec<String> = index.visited_urls.iter().cloned().collect();
        let mut dedup_keys: Vec<String> = index.keys.iter().cloned().collect();
        visited_urls.sort_unstable();
        dedup_keys.sort_unstable();
        ResumeSnapshot {
            visited_urls,
            dedup_keys,
        }
    }

    /// Merge a persisted snapshot into the current sets
    pub async fn restore(&self, snapshot: ResumeSnapshot) {
        let mut index = self.index.lock().await;
        index.visited_urls.extend(snapshot.visited_urls);
        index.keys.extend(snapshot.dedup_keys);
        debug!(
            "Dedup state restored: {} URLs, {} keys",
            index.visited_urls.len(),
            index.keys.len()
        );
    }

    pub async fn key_count(&self) -> usize {
        self.index.lock().await.keys.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::extraction::ExtractionSource;
    use crate::domain::record::FieldValue;
    use chrono::Utc;
    use proptest::prelude::*;

    fn record(url: &str, name: &str, email: &str) -> Record {
        let field = |name: &str, value: &str| FieldValue {
            name: name.to_string(),
            value: value.to_string(),
            confidence: 0.9,
            source: ExtractionSource::Selector,
        };
        Record {
            detail_url: url.to_string(),
            fields: vec![field("name", name), field("email", email)],
            warnings: Vec::new(),
            extracted_at: Utc::now(),
        }
    }

    fn url_name_email() -> Vec<KeyField> {
        vec![KeyField::DetailUrl, KeyField::Name, KeyField::Email]
    }

    #[tokio::test]
    async fn test_identical_composite_keys_are_rejected() {
        let tracker = DedupTracker::new(url_name_email());
        let first = record("https://example.org/p/jane", "Jane  Doe", "jane@example.edu");
        let second = record("https://example.org/p/jane/?utm_source=x", "jane doe", "JANE@example.edu");

        assert_eq!(tracker.key_for(&first), tracker.key_for(&second));
        assert!(tracker.admit(&first).await);
        assert!(!tracker.admit(&second).await);
        assert_eq!(tracker.key_count().await, 1);
    }

    #[tokio::test]
    async fn test_detail_urls_are_claimed_once() {
        let tracker = DedupTracker::default();
        let url = Url::parse("https://example.org/p/1").unwrap();
        let variant = Url::parse("https://example.org:443/p/1/#bio").unwrap();
        assert!(tracker.should_process(&url).await);
        assert!(!tracker.should_process(&variant).await);

        tracker.release(&variant).await;
        assert!(tracker.should_process(&url).await);
    }

    #[tokio::test]
    async fn test_restore_is_a_superset() {
        let tracker = DedupTracker::default();
        tracker
            .should_process(&Url::parse("https://example.org/p/new").unwrap())
            .await;
        tracker
            .restore(ResumeSnapshot {
                visited_urls: vec!["https://example.org/p/old".into()],
                dedup_keys: vec!["https://example.org/p/old".into()],
            })
            .await;

        let snapshot = tracker.snapshot().await;
        assert_eq!(
            snapshot.visited_urls,
            vec!["https://example.org/p/new".to_string(), "https://example.org/p/old".to_string()]
        );
        assert!(!tracker.admit(&record("https://example.org/p/old", "x", "x@y.org")).await);
    }

    #[test]
    fn test_key_fields_are_checked_against_schema() {
        let schema = FieldSchema::from_json_str(r#"{"name": "str", "title": "str?"}"#).unwrap();
        let fields = parse_key_fields(&["detail_url".into(), "title".into()], &schema).unwrap();
        assert_eq!(fields, vec![KeyField::DetailUrl, KeyField::Field("title".into())]);
        assert!(parse_key_fields(&["email".into()], &schema).is_err());
        assert!(parse_key_fields(&[], &schema).is_err());
    }

    proptest! {
        #[test]
        fn prop_admit_is_true_once_per_key(names in proptest::collection::vec("[a-d]{1,2}", 1..40)) {
            let tracker = DedupTracker::new(vec![KeyField::Name]);
            let mut admitted = 0;
            for name in &names {
                let rec = record("https://example.org/p", name, "a@b.org");
                if tokio_test::block_on(tracker.admit(&rec)) {
                    admitted += 1;
                }
            }
            let distinct: HashSet<&String> = names.iter().collect();
            prop_assert_eq!(admitted, distinct.len());
        }
    }
}
