//! Domain module - pages, schemas, hints, extraction results and traversal state
//!
//! Everything here is plain data plus the pure pagination state machine.
//! Collaborator interfaces the engine depends on are declared in [`ports`].

pub mod page;
pub mod schema;
pub mod hints;
pub mod extraction;
pub mod record;
pub mod pagination;
pub mod ports;

pub use page::{Page, RenderHint};
pub use schema::{FieldSchema, FieldSpec, FieldType};
pub use hints::{SiteHints, SiteHintsCatalog, SiteHintsConfig};
pub use extraction::{ExtractionOutcome, ExtractionResult, ExtractionSource, FieldResults};
pub use record::{CrawlEvent, DropEvent, DropReason, FieldValue, Record, SkipReason};
pub use pagination::{
    ExhaustionReason, PaginationState, PaginationStrategy, Position, ResolverEvent, ResolverPhase,
};
pub use ports::{FallbackAnswer, FallbackExtractor, PageFetcher, ResumeSnapshot, ResumeStore};
