//! Structured logging infrastructure.
//!
//! This module provides async-aware logging for the pipeline using the
//! `tracing` and `tracing-subscriber` crates:
//! - Structured events with per-stage fields
//! - Environment-based filtering via `RUST_LOG`
//! - Log level taken from the configuration when `RUST_LOG` is unset
//!
//! # Example
//! ```no_run
//! use edge_sense::{config::Settings, telemetry};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::load()?;
//! telemetry::init_from_settings(&settings)?;
//! tracing::info!("pipeline starting");
//! # Ok(())
//! # }
//! ```

use crate::config::Settings;
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

/// Parse a configured log level string into a [`Level`].
fn parse_log_level(level: &str) -> Result<Level, String> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        other => Err(format!(
            "Invalid log level '{other}'. Valid levels: trace, debug, info, warn, error"
        )),
    }
}

/// Initialize tracing from application settings.
///
/// `RUST_LOG` takes precedence over the configured level when set. This
/// function is idempotent: a second call (common in tests) returns `Ok(())`
/// without replacing the existing subscriber.
pub fn init_from_settings(settings: &Settings) -> Result<(), String> {
    let level = parse_log_level(&settings.application.log_level)?;
    init(level)
}

/// Initialize tracing with an explicit maximum level.
pub fn init(level: Level) -> Result<(), String> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));

    let result = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .try_init();

    // Already-initialized is fine; tests set up tracing more than once.
    match result {
        Ok(()) => Ok(()),
        Err(_) => Ok(()),
    }
}
