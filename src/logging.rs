// src/logging.rs

//! Logging setup for `rundag` using `tracing` + `tracing-subscriber`.
//!
//! The engine itself only emits `tracing` events; embedding applications
//! usually install their own subscriber. This helper exists for binaries and
//! tests that want a sensible default:
//! 1. `RUNDAG_LOG` environment variable (e.g. "info", "debug")
//! 2. default to `info`

use anyhow::Result;
use tracing_subscriber::fmt;

/// Initialise a global logging subscriber.
///
/// Safe to call once at startup; calling it again panics (a limitation of
/// the global subscriber), so embedders that already installed one should
/// skip this.
pub fn init_logging() -> Result<()> {
    let level = std::env::var("RUNDAG_LOG")
        .ok()
        .and_then(|s| parse_level_str(&s))
        .unwrap_or(tracing::Level::INFO);

    fmt()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .init();

    Ok(())
}

fn parse_level_str(s: &str) -> Option<tracing::Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(tracing::Level::ERROR),
        "warn" | "warning" => Some(tracing::Level::WARN),
        "info" => Some(tracing::Level::INFO),
        "debug" => Some(tracing::Level::DEBUG),
        "trace" => Some(tracing::Level::TRACE),
        _ => None,
    }
}
