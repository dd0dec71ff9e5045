//! Field schema supplied by the caller: ordered field definitions with semantic types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigurationError;

/// Semantic type of a field, selecting its resolver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Str,
    Email,
    Phone,
    Url,
    Text,
}

impl FieldType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Str => "str",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Url => "url",
            Self::Text => "text",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "str" | "string" => Ok(Self::Str),
            "email" => Ok(Self::Email),
            "phone" => Ok(Self::Phone),
            "url" => Ok(Self::Url),
            "text" => Ok(Self::Text),
            other => Err(other.to_string()),
        }
    }
}

/// One field definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,
    pub required: bool,
    /// Extra label texts that identify this field on a page
    #[serde(default)]
    pub synonyms: Vec<String>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, field_type: FieldType, required: bool) -> Self {
        Self {
            name: name.into(),
            field_type,
            required,
            synonyms: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_synonyms<I, S>(mut self, synonyms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.synonyms = synonyms.into_iter().map(Into::into).collect();
        self
    }

    /// Parse a type string such as `email` or `phone?` (trailing `?` = optional)
    pub fn from_type_string(name: &str, type_str: &str) -> Result<Self, ConfigurationError> {
        let trimmed = type_str.trim();
        let (base, required) = trimmed
            .strip_suffix('?')
            .map_or((trimmed, true), |base| (base, false));
        let field_type = base
            .parse::<FieldType>()
            .map_err(|type_name| ConfigurationError::UnknownFieldType {
                field: name.to_string(),
                type_name,
            })?;
        Ok(Self::new(name, field_type, required))
    }
}

/// Ordered, validated field definitions. Immutable for the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    fields: Vec<FieldSpec>,
}

impl FieldSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Result<Self, ConfigurationError> {
        if fields.is_empty() {
            return Err(ConfigurationError::InvalidSchema(
                "schema declares no fields".into(),
            ));
        }
        for (i, field) in fields.iter().enumerate() {
            if field.name.trim().is_empty() {
                return Err(ConfigurationError::InvalidSchema(format!(
                    "field #{} has an empty name",
                    i + 1
                )));
            }
            if fields[..i].iter().any(|earlier| earlier.name == field.name) {
                return Err(ConfigurationError::DuplicateField(field.name.clone()));
            }
        }
        Ok(Self { fields })
    }

    /// Parse a schema document.
    ///
    /// Accepted shapes:
    /// - `{"name": "str", "email": "email?"}` (declaration order is kept)
    /// - `[{"name": "email", "type": "email", "required": false, "synonyms": ["mail"]}]`
    /// - `{"fields": [...]}` wrapping the list form
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigurationError> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| ConfigurationError::InvalidSchema(format!("not valid JSON: {e}")))?;
        Self::from_json_value(&value)
    }

    pub fn from_json_value(value: &Value) -> Result<Self, ConfigurationError> {
        match value {
            Value::Array(items) => Self::from_list(items),
            Value::Object(map) => {
                if let Some(Value::Array(items)) = map.get("fields") {
                    return Self::from_list(items);
                }
                let mut fields = Vec::with_capacity(map.len());
                for (name, type_value) in map {
                    let Value::String(type_str) = type_value else {
                        return Err(ConfigurationError::InvalidSchema(format!(
                            "type of field '{name}' must be a string"
                        )));
                    };
                    fields.push(FieldSpec::from_type_string(name, type_str)?);
                }
                Self::new(fields)
            }
            _ => Err(ConfigurationError::InvalidSchema(
                "expected a JSON object or array".into(),
            )),
        }
    }

    fn from_list(items: &[Value]) -> Result<Self, ConfigurationError> {
        let mut fields = Vec::with_capacity(items.len());
        for item in items {
            let name = item
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| ConfigurationError::InvalidSchema("field entry without a 'name'".into()))?;
            let type_str = item.get("type").and_then(Value::as_str).unwrap_or("str");
            let mut spec = FieldSpec::from_type_string(name, type_str)?;

            // An explicit `required` wins over the `?` suffix
            if let Some(required) = item.get("required").and_then(Value::as_bool) {
                spec.required = required;
            }
            if let Some(synonyms) = item.get("synonyms").and_then(Value::as_array) {
                spec.synonyms = synonyms
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect();
            }
            fields.push(spec);
        }
        Self::new(fields)
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|field| field.required)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
