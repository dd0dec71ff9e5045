//! Records and the events the engine emits for each detail page

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::extraction::ExtractionSource;
use crate::error::{FetchError, ValidationError};

/// A validated field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValue {
    pub name: String,
    pub value: String,
    pub confidence: f32,
    pub source: ExtractionSource,
}

/// Schema-conformant entity. Every required field is present and resolver-approved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub detail_url: String,
    /// Present fields in schema order
    pub fields: Vec<FieldValue>,
    /// Optional fields that were found but rejected
    pub warnings: Vec<String>,
    pub extracted_at: DateTime<Utc>,
}

impl Record {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| field.value.as_str())
    }

    /// Flat JSON object: `detail_url` followed by the fields in schema order
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert("detail_url".into(), Value::String(self.detail_url.clone()));
        for field in &self.fields {
            map.insert(field.name.clone(), Value::String(field.value.clone()));
        }
        Value::Object(map)
    }
}

/// Why a record was not emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// At least one required field had no value
    MissingRequired,
    /// Every required field had a value but at least one failed its resolver
    InvalidRequired,
}

impl DropReason {
    pub const fn code(self) -> &'static str {
        match self {
            Self::MissingRequired => "missing_required",
            Self::InvalidRequired => "invalid_required",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropEvent {
    pub detail_url: String,
    pub missing: Vec<String>,
    pub invalid: Vec<ValidationError>,
}

impl DropEvent {
    pub fn reason(&self) -> DropReason {
        if self.missing.is_empty() {
            DropReason::InvalidRequired
        } else {
            DropReason::MissingRequired
        }
    }
}

/// Why a detail URL produced neither a record nor a drop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    AlreadyVisited,
    FetchFailed { error: FetchError },
    DuplicateRecord { key: String },
    Cancelled,
}

impl SkipReason {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::AlreadyVisited => "already_visited",
            Self::FetchFailed { .. } => "fetch_failed",
            Self::DuplicateRecord { .. } => "duplicate_record",
            Self::Cancelled => "cancelled",
        }
    }
}

/// One item of the produced stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CrawlEvent {
    Record(Record),
    Dropped(DropEvent),
    Skipped { url: String, reason: SkipReason },
}

impl CrawlEvent {
    pub const fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record(record) => Some(record),
            _ => None,
        }
    }
}
