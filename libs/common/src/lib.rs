//! Shared basics for perfmon tools
//!
//! - logging bootstrap (console + optional JSON file)
//! - layered configuration loading (defaults, files, environment)

pub mod config;
pub mod error;
pub mod logging;
pub mod serde_defaults;

pub use config::{load_config, load_config_with_prefix, OutputFormat, ReplayConfig, ReplayMode};
pub use error::{Error, Result};
pub use logging::LogConfig;
