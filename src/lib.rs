//! Directory Crawler - pagination resolution and heuristic field extraction
//!
//! Walks a multi-page people/company directory from a start URL, discovers detail pages
//! on every listing page and turns each one into a schema-shaped record.
//!
//! ```no_run
//! use std::sync::Arc;
//! use directory_crawler::{CrawlEngine, FieldSchema, HttpFetcher, HttpSettings};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let schema = FieldSchema::from_json_str(r#"{"name": "str", "email": "email", "title": "str?"}"#)?;
//! let fetcher = Arc::new(HttpFetcher::new(HttpSettings::default())?);
//! let engine = Arc::new(CrawlEngine::builder(schema, fetcher).build()?);
//!
//! let (events, report) = engine.stream("https://example.edu/people");
//! # drop(events);
//! let report = report.await??;
//! println!("{} records", report.records);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod domain;
pub mod infrastructure;
pub mod crawling;

pub use crawling::{CrawlEngine, CrawlEngineBuilder, QualityReport, RunReport, Termination};
pub use domain::{
    CrawlEvent, DropEvent, FieldSchema, Page, PageFetcher, Record, RenderHint, ResumeStore, SiteHints,
    SiteHintsCatalog,
};
pub use error::{ConfigurationError, CrawlError, EngineError, EngineResult, FetchError};
pub use infrastructure::{EngineConfig, HttpFetcher, HttpSettings};
