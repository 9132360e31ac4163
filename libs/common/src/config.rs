//! Layered configuration for the replay tool
//!
//! Priority (highest to lowest):
//! 1. Environment variables (`PERFMON_`, nested keys split on `__`)
//! 2. Explicit config file passed on the command line
//! 3. `perfmon.yaml` in the working directory
//! 4. `perfmon.toml` in the working directory
//! 5. Default values

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::logging::LogConfig;
use crate::serde_defaults;

pub const ENV_PREFIX: &str = "PERFMON_";
pub const DEFAULT_TOML: &str = "perfmon.toml";
pub const DEFAULT_YAML: &str = "perfmon.yaml";

/// How raw reports are turned into calculated reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplayMode {
    /// Consecutive snapshots, delta of each pair
    #[default]
    Stream,
    /// Every report is already a delta
    Query,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Replay tool configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Catalog file (YAML, JSON or binary)
    #[serde(default)]
    pub catalog: Option<PathBuf>,
    /// Raw report dump
    #[serde(default)]
    pub reports: Option<PathBuf>,
    /// Metric set symbol name
    #[serde(default)]
    pub metric_set: Option<String>,
    #[serde(default)]
    pub mode: ReplayMode,
    /// Require a `ContextId` information in the metric set; no reports are dropped
    #[serde(default = "serde_defaults::bool_false")]
    pub report_filtering: bool,
    /// Also compute max values
    #[serde(default = "serde_defaults::bool_false")]
    pub max_values: bool,
    /// Only keep metrics whose availability equation holds on the device
    #[serde(default = "serde_defaults::bool_true")]
    pub filter_available: bool,
    #[serde(default)]
    pub output: OutputFormat,
    #[serde(default)]
    pub log: LogConfig,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            catalog: None,
            reports: None,
            metric_set: None,
            mode: ReplayMode::default(),
            report_filtering: serde_defaults::bool_false(),
            max_values: serde_defaults::bool_false(),
            filter_available: serde_defaults::bool_true(),
            output: OutputFormat::default(),
            log: LogConfig::default(),
        }
    }
}

/// Load configuration with the `PERFMON_` environment prefix
pub fn load_config(path: Option<&Path>) -> Result<ReplayConfig> {
    load_config_with_prefix(path, ENV_PREFIX)
}

/// Load configuration reading environment variables under `prefix`
pub fn load_config_with_prefix(path: Option<&Path>, prefix: &str) -> Result<ReplayConfig> {
    let mut figment = Figment::from(Serialized::defaults(ReplayConfig::default()))
        .merge(Toml::file(DEFAULT_TOML))
        .merge(Yaml::file(DEFAULT_YAML));

    if let Some(path) = path {
        if !path.is_file() {
            return Err(Error::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        figment = merge_file(figment, path)?;
    }

    let config: ReplayConfig = figment
        .merge(Env::prefixed(prefix).split("__"))
        .extract()
        .map_err(|e| Error::Config(format!("Failed to load configuration: {}", e)))?;

    tracing::debug!(
        file = ?path,
        metric_set = ?config.metric_set,
        mode = ?config.mode,
        "Configuration loaded"
    );
    Ok(config)
}

fn merge_file(figment: Figment, path: &Path) -> Result<Figment> {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::Config("Config file must have an extension".to_string()))?;

    match extension {
        "toml" => Ok(figment.merge(Toml::file(path))),
        "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
        "json" => Ok(figment.merge(Json::file(path))),
        _ => Err(Error::Config(format!(
            "Unsupported config file format: {}",
            extension
        ))),
    }
}
