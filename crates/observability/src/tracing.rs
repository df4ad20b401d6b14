//! Tracing/logging initialization.
//!
//! `RUST_LOG` wins over the configured level when set.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    Json,
    /// Human-readable multi-line output.
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter directive, e.g. `info` or `stockflow_infra=debug,info`.
    pub level: String,
    pub format: LogFormat,
    /// Include the event target (module path) in output.
    pub with_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
            with_target: false,
        }
    }
}

impl LogConfig {
    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.level))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init(config: &LogConfig) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(config.filter())
        .with_target(config.with_target);

    let _ = match config.format {
        LogFormat::Json => builder
            .json()
            .with_timer(tracing_subscriber::fmt::time::SystemTime)
            .try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
}

/// Compact subscriber writing through the test harness capture.
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init_for_tests();
        init(&LogConfig::default());
        init(&LogConfig {
            format: LogFormat::Pretty,
            ..LogConfig::default()
        });
    }

    #[test]
    fn invalid_level_falls_back() {
        let config = LogConfig {
            level: "not a [valid directive".to_string(),
            ..LogConfig::default()
        };
        let _ = config.filter();
    }
}
