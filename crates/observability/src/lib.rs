//! Tracing and logging (shared setup).

/// Tracing subscriber configuration and initialization.
pub mod tracing;

pub use self::tracing::{LogConfig, LogFormat, init, init_for_tests};
