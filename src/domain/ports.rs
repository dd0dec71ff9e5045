//! Collaborator interfaces consumed by the engine
//!
//! The engine performs no network or file I/O itself: pages come from a
//! [`PageFetcher`], uncertain fields may go to a [`FallbackExtractor`], and resume
//! state goes through a [`ResumeStore`]. Implementations live in `infrastructure`
//! and are injected when the engine is built.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::domain::page::{Page, RenderHint};
use crate::domain::schema::FieldType;
use crate::error::{FallbackError, FetchError, StoreError};

/// Fetching collaborator
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch one page. Retries for transient failures happen in here, never in the engine.
    async fn fetch(&self, url: &Url, hint: RenderHint) -> Result<Page, FetchError>;

    /// Whether scroll-triggered loading can be rendered on request
    fn supports_scroll_loading(&self) -> bool {
        false
    }
}

/// Value proposed by the fallback extractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackAnswer {
    pub value: Option<String>,
    pub confidence: f32,
}

/// Language-model fallback, invoked per field
#[async_trait]
pub trait FallbackExtractor: Send + Sync {
    async fn extract_field(
        &self,
        page_text: &str,
        field_name: &str,
        field_type: FieldType,
    ) -> Result<FallbackAnswer, FallbackError>;

    fn is_enabled(&self) -> bool {
        true
    }
}

/// Persisted idempotency state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeSnapshot {
    /// Normalized detail-page URLs already claimed
    pub visited_urls: Vec<String>,
    /// Composite keys of records already admitted
    pub dedup_keys: Vec<String>,
}

impl ResumeSnapshot {
    pub fn is_empty(&self) -> bool {
        self.visited_urls.is_empty() && self.dedup_keys.is_empty()
    }
}

/// Resume persistence
#[async_trait]
pub trait ResumeStore: Send + Sync {
    /// Previously saved state; an empty snapshot when nothing was saved yet
    async fn load(&self) -> Result<ResumeSnapshot, StoreError>;

    async fn save(&self, snapshot: &ResumeSnapshot) -> Result<(), StoreError>;
}
