//! HTML parsing for listing and detail pages
//!
//! `item_detector` finds directory entries on listing pages, `field_extractor` turns a
//! detail page into per-field extraction results. Both share the DOM helpers in `dom`
//! and the tunables in `config`.

pub mod config;
pub mod dom;
pub mod item_detector;
pub mod field_extractor;

pub use config::{PaginationCues, ParsingConfig};
pub use field_extractor::FieldExtractor;
pub use item_detector::{CandidateItem, ItemDetector};
