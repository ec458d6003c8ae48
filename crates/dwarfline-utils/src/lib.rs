//! # dwarfline utilities
//!
//! Shared utilities for the dwarfline workspace.
//!
//! Currently this is the logging setup used by the command-line tool, built
//! on `tracing-subscriber` and `tracing-appender`. The library crate only
//! emits events; installing a subscriber is left to binaries.

pub mod logging;

// Re-export commonly used logging items for convenience
pub use logging::{init_logging, LogConfig, LogFormat, LogLevel, LoggingError, LoggingGuard};
pub use tracing::{debug, error, info, trace, warn};
