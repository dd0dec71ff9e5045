//! Record assembly and validation
//!
//! Turns per-field extraction results into a [`Record`] when every required field has an
//! accepted value that passes its field resolver. Anything else becomes a [`DropEvent`]
//! listing what was missing or invalid. Optional fields that fail their resolver are left
//! out of the record and noted in its warnings.

use chrono::Utc;
use tracing::debug;
use url::Url;

use crate::domain::extraction::FieldResults;
use crate::domain::record::{DropEvent, FieldValue, Record};
use crate::domain::schema::FieldSchema;
use crate::error::ValidationError;
use crate::infrastructure::field_resolvers;

/// Validate extraction results against the schema
pub fn assemble(schema: &FieldSchema, detail_url: &Url, results: &FieldResults) -> Result<Record, DropEvent> {
    let mut fields = Vec::with_capacity(schema.len());
    let mut warnings = Vec::new();
    let mut missing = Vec::new();
    let mut invalid = Vec::new();

    for spec in schema.fields() {
        let accepted = results
            .get(&spec.name)
            .filter(|result| result.is_accepted())
            .and_then(|result| Some((result.value.as_deref()?, result.confidence, result.source?)));

        let Some((raw, confidence, source)) = accepted else {
            if spec.required {
                missing.push(spec.name.clone());
            }
            continue;
        };

        match field_resolvers::normalize(raw, spec.field_type, Some(detail_url)) {
            Ok(value) => fields.push(FieldValue {
                name: spec.name.clone(),
                value,
                confidence,
                source,
            }),
            Err(rejection) if spec.required => invalid.push(ValidationError {
                field: spec.name.clone(),
                rejection,
            }),
            Err(rejection) => warnings.push(format!("{}: {}", spec.name, rejection)),
        }
    }

    if !missing.is_empty() || !invalid.is_empty() {
        let event = DropEvent {
            detail_url: detail_url.to_string(),
            missing,
            invalid,
        };
        debug!(
            "Dropping {} ({}): missing {:?}, invalid {:?}",
            event.detail_url,
            event.reason().code(),
            event.missing,
            event.invalid.iter().map(|e| e.field.as_str()).collect::<Vec<_>>()
        );
        return Err(event);
    }

    Ok(Record {
        detail_url: detail_url.to_string(),
        fields,
        warnings,
        extracted_at: Utc::now(),
    })
}
