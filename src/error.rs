//! Error taxonomy for the crawl engine
//!
//! Per-item errors (`FetchError`, `ValidationError`, `FallbackError`, loop detection) are
//! contained at the item level and surface as skip/drop events. Only `EngineError`
//! (configuration or resume-store load failures) aborts a run.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::infrastructure::field_resolvers::Rejection;

/// Transport-level failure reported by the fetching collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchError {
    #[error("HTTP request failed with status {status}: {url}")]
    Http { status: u16, url: String },

    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("Request timed out: {url}")]
    Timeout { url: String },

    #[error("Expected HTML from {url}, got '{content_type}'")]
    NotHtml { url: String, content_type: String },

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Giving up on {url} after {attempts} attempts: {last}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        last: String,
    },

    #[error("Fetch cancelled: {url}")]
    Cancelled { url: String },
}

impl FetchError {
    /// Whether another attempt may succeed (timeouts, network errors, 5xx, 429)
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { status, .. } => *status >= 500 || *status == 429,
            Self::Network { .. } | Self::Timeout { .. } => true,
            Self::NotHtml { .. }
            | Self::InvalidUrl { .. }
            | Self::RetriesExhausted { .. }
            | Self::Cancelled { .. } => false,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Self::Http { url, .. }
            | Self::Network { url, .. }
            | Self::Timeout { url }
            | Self::NotHtml { url, .. }
            | Self::InvalidUrl { url, .. }
            | Self::RetriesExhausted { url, .. }
            | Self::Cancelled { url } => url,
        }
    }
}

/// Failure of the language-model fallback collaborator. Always treated as confidence 0.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FallbackError {
    #[error("Fallback extraction is disabled")]
    Disabled,

    #[error("Fallback budget of {budget} calls exhausted")]
    BudgetExhausted { budget: u32 },

    #[error("Fallback provider error: {0}")]
    Provider(String),

    #[error("Fallback returned an unusable answer: {0}")]
    Unusable(String),
}

/// A required field failed normalization
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("Field '{field}' rejected: {rejection}")]
pub struct ValidationError {
    pub field: String,
    pub rejection: Rejection,
}

/// Malformed schema, hints or engine settings. Fatal before a run begins.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Unknown field type '{type_name}' for field '{field}'")]
    UnknownFieldType { field: String, type_name: String },

    #[error("Field '{0}' is declared more than once")]
    DuplicateField(String),

    #[error("Invalid selector for hint '{hint}': {selector} - {reason}")]
    InvalidSelector {
        hint: String,
        selector: String,
        reason: String,
    },

    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    #[error("Invalid start URL '{url}': {reason}")]
    InvalidStartUrl { url: String, reason: String },

    #[error("Failed to load configuration: {0}")]
    Load(String),
}

impl ConfigurationError {
    pub fn invalid_value(field: &str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn invalid_selector(hint: &str, selector: &str, reason: impl ToString) -> Self {
        Self::InvalidSelector {
            hint: hint.to_string(),
            selector: selector.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<config::ConfigError> for ConfigurationError {
    fn from(err: config::ConfigError) -> Self {
        Self::Load(err.to_string())
    }
}

/// Resume-state persistence failure
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Resume store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Resume store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Per-item failure. Logged and reported, never fatal.
#[derive(Error, Debug, Clone)]
pub enum CrawlError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Pagination loop detected at {url}")]
    PaginationLoopDetected { url: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Fallback(#[from] FallbackError),
}

/// Run-level failure. The run does not begin (or cannot be resumed).
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type EngineResult<T> = Result<T, EngineError>;
