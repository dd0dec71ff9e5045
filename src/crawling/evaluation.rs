//! Output quality report
//!
//! Completeness per schema field, validity of email and URL fields, duplicate rate over
//! a composite key, and warnings for anything that looks off.

use std::collections::HashSet;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::crawling::dedup::{KeyField, composite_key};
use crate::domain::record::Record;
use crate::domain::schema::{FieldSchema, FieldType};
use crate::infrastructure::field_resolvers;

/// Required fields below this completeness (percent) get a warning
pub const REQUIRED_COMPLETENESS_WARNING: f64 = 90.0;
/// Email validity below this (percent) gets a warning
pub const EMAIL_VALIDITY_WARNING: f64 = 95.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCompleteness {
    pub field: String,
    pub required: bool,
    pub present: usize,
    /// Percent of records with a non-empty value
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValidity {
    pub field: String,
    pub valid: usize,
    pub checked: usize,
    pub percent: f64,
}

/// Expected record count range, for sanity warnings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedCount {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub total_records: usize,
    pub unique_records: usize,
    pub duplicates: usize,
    /// Fraction (0-1) of records repeating an earlier composite key
    pub duplicate_rate: f64,
    pub completeness: Vec<FieldCompleteness>,
    pub validity: Vec<FieldValidity>,
    pub warnings: Vec<String>,
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let ratio = part as f64 / whole as f64;
    ratio * 100.0
}

/// Evaluate emitted records
pub fn evaluate(
    records: &[Record],
    schema: &FieldSchema,
    key_fields: &[KeyField],
    expected: ExpectedCount,
) -> QualityReport {
    let total = records.len();
    let mut warnings = Vec::new();

    let mut seen = HashSet::new();
    let duplicates = records
        .iter()
        .filter(|record| !seen.insert(composite_key(key_fields, record)))
        .count();
    if duplicates > 0 {
        let keys: Vec<String> = key_fields.iter().map(ToString::to_string).collect();
        warnings.push(format!(
            "Found {} duplicates ({:.1}%) based on [{}]",
            duplicates,
            percent(duplicates, total),
            keys.join(", ")
        ));
    }

    let completeness: Vec<FieldCompleteness> = schema
        .fields()
        .iter()
        .map(|spec| {
            let present = records
                .iter()
                .filter(|record| record.get(&spec.name).is_some_and(|v| !v.trim().is_empty()))
                .count();
            FieldCompleteness {
                field: spec.name.clone(),
                required: spec.required,
                present,
                percent: percent(present, total),
            }
        })
        .collect();

    if total > 0 {
        for entry in completeness.iter().filter(|c| c.required && c.percent < REQUIRED_COMPLETENESS_WARNING) {
            warnings.push(format!("Low completeness for '{}': {:.1}%", entry.field, entry.percent));
        }
    }

    let validity: Vec<FieldValidity> = schema
        .fields()
        .iter()
        .filter(|spec| matches!(spec.field_type, FieldType::Email | FieldType::Url))
        .filter_map(|spec| {
            let values: Vec<(&Record, &str)> = records
                .iter()
                .filter_map(|record| record.get(&spec.name).map(|value| (record, value)))
                .filter(|(_, value)| !value.trim().is_empty())
                .collect();
            if values.is_empty() {
                return None;
            }
            let valid = values
                .iter()
                .filter(|(record, value)| {
                    let base = url::Url::parse(&record.detail_url).ok();
                    field_resolvers::accepts(value, spec.field_type, base.as_ref())
                })
                .count();
            Some(FieldValidity {
                field: spec.name.clone(),
                valid,
                checked: values.len(),
                percent: percent(valid, values.len()),
            })
        })
        .collect();

    for entry in &validity {
        let is_email = schema
            .get(&entry.field)
            .is_some_and(|spec| spec.field_type == FieldType::Email);
        if is_email && entry.percent < EMAIL_VALIDITY_WARNING {
            warnings.push(format!(
                "Email validity for '{}': {:.1}% ({}/{})",
                entry.field, entry.percent, entry.valid, entry.checked
            ));
        }
    }

    if let Some(min) = expected.min.filter(|min| total < *min) {
        let gap = min - total;
        warnings.push(format!(
            "Record count {} is below expected minimum {} (difference: {}, {:.1}%)",
            total,
            min,
            gap,
            percent(gap, min)
        ));
    }
    if let Some(max) = expected.max.filter(|max| total > *max) {
        let gap = total - max;
        warnings.push(format!(
            "Record count {} is above expected maximum {} (difference: {}, {:.1}%)",
            total,
            max,
            gap,
            percent(gap, max)
        ));
    }

    QualityReport {
        total_records: total,
        unique_records: total - duplicates,
        duplicates,
        duplicate_rate: percent(duplicates, total) / 100.0,
        completeness,
        validity,
        warnings,
    }
}

impl QualityReport {
    /// Markdown rendering for humans
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Directory Crawl Quality Report\n");
        let _ = writeln!(out, "- **Total Records**: {}", self.total_records);
        let _ = writeln!(out, "- **Unique Records**: {}", self.unique_records);
        let _ = writeln!(out, "- **Duplicates**: {}", self.duplicates);
        let _ = writeln!(out, "- **Duplicate Rate**: {:.2}%\n", self.duplicate_rate * 100.0);

        let _ = writeln!(out, "## Field Completeness\n");
        let _ = writeln!(out, "| Field | Required | Completeness |");
        let _ = writeln!(out, "|-------|----------|--------------|");
        for entry in &self.completeness {
            let status = if entry.percent >= 90.0 {
                "✅"
            } else if entry.percent >= 50.0 {
                "⚠️"
            } else {
                "❌"
            };
            let _ = writeln!(
                out,
                "| {} | {} | {:.1}% {} |",
                entry.field,
                if entry.required { "yes" } else { "no" },
                entry.percent,
                status
            );
        }

        if !self.validity.is_empty() {
            let _ = writeln!(out, "\n## Field Validity\n");
            let _ = writeln!(out, "| Field | Validity |");
            let _ = writeln!(out, "|-------|----------|");
            for entry in &self.validity {
                let _ = writeln!(out, "| {} | {:.1}% ({}/{}) |", entry.field, entry.percent, entry.valid, entry.checked);
            }
        }

        if !self.warnings.is_empty() {
            let _ = writeln!(out, "\n## Warnings\n");
            for warning in &self.warnings {
                let _ = writeln!(out, "- ⚠️ {warning}");
            }
        }
        out
    }
}
