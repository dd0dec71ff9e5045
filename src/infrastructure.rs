//! Infrastructure layer: URL handling, field resolvers, HTML parsing and the
//! collaborator implementations (HTTP fetcher, fallback, resume store), plus
//! configuration and logging bootstrap.

pub mod url_normalizer;
pub mod field_resolvers;
pub mod parsing;  // Listing and detail page heuristics
pub mod http_client;
pub mod llm_fallback;
pub mod resume_store;
pub mod config;  // Engine settings, file + environment
pub mod logging;

// Re-export commonly used items
pub use config::{CrawlSettings, EngineConfig, FallbackConfig, HttpSettings, LoggingConfig};
pub use field_resolvers::Rejection;
pub use http_client::HttpFetcher;
pub use llm_fallback::{BudgetedFallback, DisabledFallback};
pub use parsing::{CandidateItem, FieldExtractor, ItemDetector, ParsingConfig};
pub use resume_store::{JsonFileResumeStore, MemoryResumeStore};
