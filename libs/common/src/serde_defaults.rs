//! Serde default value functions for configuration structs
//!
//! Used through `#[serde(default = "...")]` in [`crate::config`] and
//! [`crate::logging`].

// ============================================================================
// Default Value Functions
// ============================================================================

/// Default value: true
pub fn bool_true() -> bool {
    true
}

/// Default value: false
pub fn bool_false() -> bool {
    false
}

/// Default filter directive when `RUST_LOG` is unset: "info"
pub fn log_level() -> String {
    "info".to_string()
}

/// Default service name used for log file names: "perfmon-replay"
pub fn service_name() -> String {
    "perfmon-replay".to_string()
}
