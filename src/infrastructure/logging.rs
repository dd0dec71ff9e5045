//! Logging system initialization
//!
//! - console output with UTC millisecond timestamps
//! - optional daily-rolling file output, plain or JSON lines
//! - `RUST_LOG` overrides everything; otherwise the configured level applies and noisy
//!   dependency targets are clamped unless the level is `trace`

use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use once_cell::sync::Lazy;
use tracing::debug;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::fmt::{self, time::FormatTime};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

pub use crate::infrastructure::config::LoggingConfig;

// Keeps the non-blocking file writer alive for the lifetime of the process
static LOG_GUARDS: Lazy<Mutex<Vec<WorkerGuard>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// Dependency targets clamped unless tracing everything
const NOISY_TARGETS: &[(&str, &str)] = &[
    ("reqwest", "info"),
    ("hyper", "warn"),
    ("hyper_util", "warn"),
    ("h2", "warn"),
    ("html5ever", "warn"),
    ("selectors", "warn"),
    ("tokio", "info"),
];

struct UtcTimeFormatter;

impl FormatTime for UtcTimeFormatter {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"))
    }
}

/// Initialize logging with default configuration
pub fn init_logging() -> Result<()> {
    init_logging_with_config(LoggingConfig::default())
}

/// Build the filter: `RUST_LOG` if set, otherwise level + clamps + module overrides
pub fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let level = config.level.to_lowercase();
    let mut filter = EnvFilter::try_new(&level).with_context(|| format!("Invalid log level '{level}'"))?;

    if level != "trace" {
        for (target, target_level) in NOISY_TARGETS {
            filter = filter.add_directive(
                format!("{target}={target_level}")
                    .parse()
                    .with_context(|| format!("Invalid directive for {target}"))?,
            );
        }
    }

    for (target, target_level) in &config.module_filters {
        let directive = format!("{target}={target_level}");
        filter = filter.add_directive(
            directive
                .parse()
                .with_context(|| format!("Invalid module filter '{directive}'"))?,
        );
    }
    Ok(filter)
}

/// Initialize logging with custom configuration.
///
/// Calling this when a global subscriber is already installed is not an error.
pub fn init_logging_with_config(config: LoggingConfig) -> Result<()> {
    if tracing::dispatcher::has_been_set() {
        debug!("Global tracing subscriber already installed, keeping it");
        return Ok(());
    }
    let filter = build_env_filter(&config)?;

    let console_layer = config.console_output.then(|| {
        fmt::Layer::new()
            .with_writer(std::io::stderr)
            .with_timer(UtcTimeFormatter)
            .with_target(false)
    });

    let (file_layer, file_guard) = if config.file_output {
        let log_dir = config.resolved_log_dir();
        std::fs::create_dir_all(&log_dir)
            .map_err(|e| anyhow!("Failed to create log directory {}: {}", log_dir.display(), e))?;

        let appender = rolling::daily(&log_dir, &config.file_prefix);
        let (writer, guard) = non_blocking(appender);

        let layer = fmt::Layer::new()
            .with_writer(writer)
            .with_timer(UtcTimeFormatter)
            .with_ansi(false);
        let layer = if config.json_format {
            layer
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .boxed()
        } else {
            layer.with_target(true).boxed()
        };
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let installed = Registry::default()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    if installed.is_err() {
        // Lost the race to another initializer; the unused file writer is dropped here
        debug!("Global tracing subscriber already installed, keeping it");
        return Ok(());
    }
    if let Some(guard) = file_guard {
        LOG_GUARDS
            .lock()
            .map_err(|_| anyhow!("Log guard registry poisoned"))?
            .push(guard);
    }
    tracing::info!("📝 Logging initialized at level '{}'", config.level);
    Ok(())
}
