//! # Crawling
//!
//! Run-level machinery on top of the domain and parsing layers:
//! - `pagination`: decides which listing page comes next
//! - `assembler`: validates extraction results into records
//! - `dedup`: visited detail URLs and composite record keys
//! - `rate_gate`: the token bucket every fetch waits on
//! - `orchestrator`: the run loop and detail worker pool
//! - `evaluation`: quality report over emitted records

pub mod pagination;
pub mod assembler;
pub mod dedup;
pub mod rate_gate;
pub mod orchestrator;
pub mod evaluation;

pub use assembler::assemble;
pub use dedup::{DedupTracker, KeyField, composite_key, parse_key_fields};
pub use evaluation::{ExpectedCount, QualityReport, evaluate};
pub use orchestrator::{CrawlEngine, CrawlEngineBuilder, RunReport, Termination};
pub use pagination::{PaginationResolver, Resolution};
pub use rate_gate::RateGate;
