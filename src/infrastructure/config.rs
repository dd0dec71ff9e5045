//! Engine configuration
//!
//! Every setting has a default, so an empty file (or no file) is a valid configuration.
//! Files are loaded through the `config` crate and can be overridden by environment
//! variables: `DIRCRAWL_CRAWL__MAX_PAGES=20`, `DIRCRAWL_HTTP__TIMEOUT_SECONDS=10`, ...

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

pub const ENV_PREFIX: &str = "DIRCRAWL";
pub const APP_DIR_NAME: &str = "directory-crawler";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub crawl: CrawlSettings,
    pub http: HttpSettings,
    pub fallback: FallbackConfig,
    pub logging: LoggingConfig,
}

/// Traversal, concurrency and idempotency settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlSettings {
    /// Listing pages to visit before stopping; unlimited when absent
    pub max_pages: Option<u32>,
    /// Wall-clock limit for a run
    pub max_runtime_secs: Option<u64>,
    /// Detail pages fetched and extracted concurrently
    pub max_concurrent_details: usize,
    /// Shared token bucket for all fetches
    pub requests_per_second: u32,
    pub burst: u32,
    /// Minimum repeated members for heuristic item detection
    pub min_group_size: usize,
    /// Composite dedup key: `detail_url`, `name`, `email` or any schema field name
    pub dedup_key_fields: Vec<String>,
    /// Load visited URLs and dedup keys from the resume store before starting
    pub resume: bool,
    /// Save the resume snapshot after this many admitted records
    pub checkpoint_every: usize,
    /// Re-fetch an empty first listing page in rendered mode
    pub render_on_empty: bool,
    /// Capacity of the event channel
    pub event_buffer: usize,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            max_pages: None,
            max_runtime_secs: None,
            max_concurrent_details: 5,
            requests_per_second: 10,
            burst: 1,
            min_group_size: 3,
            dedup_key_fields: vec!["detail_url".to_string()],
            resume: false,
            checkpoint_every: 25,
            render_on_empty: true,
            event_buffer: 256,
        }
    }
}

impl CrawlSettings {
    pub fn max_runtime(&self) -> Option<Duration> {
        self.max_runtime_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.max_concurrent_details == 0 {
            return Err(ConfigurationError::invalid_value(
                "crawl.max_concurrent_details",
                "must be greater than 0",
            ));
        }
        if self.requests_per_second == 0 {
            return Err(ConfigurationError::invalid_value(
                "crawl.requests_per_second",
                "must be greater than 0",
            ));
        }
        if self.burst == 0 {
            return Err(ConfigurationError::invalid_value("crawl.burst", "must be greater than 0"));
        }
        if self.max_pages == Some(0) {
            return Err(ConfigurationError::invalid_value("crawl.max_pages", "must be greater than 0"));
        }
        if self.min_group_size < 2 {
            return Err(ConfigurationError::invalid_value(
                "crawl.min_group_size",
                "must be at least 2",
            ));
        }
        if self.dedup_key_fields.is_empty() || self.dedup_key_fields.iter().any(|f| f.trim().is_empty()) {
            return Err(ConfigurationError::invalid_value(
                "crawl.dedup_key_fields",
                "must list at least one non-empty field",
            ));
        }
        if self.event_buffer == 0 {
            return Err(ConfigurationError::invalid_value("crawl.event_buffer", "must be greater than 0"));
        }
        Ok(())
    }
}

/// HTTP fetcher settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub user_agent: String,
    pub timeout_seconds: u64,
    /// Attempts per URL, first try included
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub follow_redirects: bool,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: format!("{APP_DIR_NAME}/{}", env!("CARGO_PKG_VERSION")),
            timeout_seconds: 30,
            max_attempts: 3,
            base_backoff_ms: 500,
            max_backoff_ms: 10_000,
            follow_redirects: true,
        }
    }
}

impl HttpSettings {
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Language-model fallback settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub enabled: bool,
    /// Maximum fallback calls per run
    pub budget: u32,
    /// Page text forwarded to the fallback is cut to this many characters
    pub max_text_chars: usize,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            budget: 1000,
            max_text_chars: 4000,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// "error", "warn", "info", "debug" or "trace"
    pub level: String,
    pub console_output: bool,
    pub file_output: bool,
    /// JSON lines for the file output
    pub json_format: bool,
    /// Defaults to the platform data directory
    pub log_dir: Option<PathBuf>,
    /// Daily files are named `<prefix>.YYYY-MM-DD`
    pub file_prefix: String,
    /// Per-target overrides, e.g. `"directory_crawler::crawling" = "debug"`
    pub module_filters: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console_output: true,
            file_output: false,
            json_format: false,
            log_dir: None,
            file_prefix: "crawler.log".to_string(),
            module_filters: HashMap::new(),
        }
    }
}

impl LoggingConfig {
    pub fn resolved_log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join(APP_DIR_NAME)
                .join("logs")
        })
    }
}

const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

impl EngineConfig {
    /// Load a file (format by extension) with environment overrides, then validate
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(Self::environment())
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides, for runs without a config file
    pub fn from_env() -> Result<Self, ConfigurationError> {
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?)
            .add_source(Self::environment())
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// `<config dir>/directory-crawler/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join("config.toml"))
    }

    fn environment() -> config::Environment {
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.crawl.validate()?;

        let http = &self.http;
        if http.max_attempts == 0 {
            return Err(ConfigurationError::invalid_value("http.max_attempts", "must be greater than 0"));
        }
        if http.timeout_seconds == 0 {
            return Err(ConfigurationError::invalid_value("http.timeout_seconds", "must be greater than 0"));
        }
        if http.base_backoff_ms > http.max_backoff_ms {
            return Err(ConfigurationError::invalid_value(
                "http.base_backoff_ms",
                "cannot be greater than http.max_backoff_ms",
            ));
        }

        if self.fallback.enabled && self.fallback.max_text_chars == 0 {
            return Err(ConfigurationError::invalid_value(
                "fallback.max_text_chars",
                "must be greater than 0 when the fallback is enabled",
            ));
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigurationError::invalid_value(
                "logging.level",
                format!("unknown level '{}'", self.logging.level),
            ));
        }
        Ok(())
    }
}
