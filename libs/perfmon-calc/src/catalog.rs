//! Metric catalog: a device plus its metric sets
//!
//! [`CatalogDefinition`] is the plain-data form loaded from YAML or JSON, with
//! equations and delta functions kept as strings. [`CatalogDefinition::build`]
//! parses everything against the device and yields a [`Catalog`].

use crate::api_mask::ApiMask;
use crate::delta::DeltaFunction;
use crate::device::Device;
use crate::equation::Equation;
use crate::error::{CalcError, Result};
use crate::evaluator::Evaluator;
use crate::information::{Information, InformationType};
use crate::metric::{Metric, MetricType};
use crate::metric_set::MetricSet;
use crate::typed_value::ResultType;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

// ============================================================================
// Built catalog
// ============================================================================

#[derive(Debug, Clone)]
pub struct Catalog {
    device: Arc<Device>,
    sets: Vec<MetricSet>,
}

impl Catalog {
    pub fn new(device: Device, sets: Vec<MetricSet>) -> Self {
        Self {
            device: Arc::new(device),
            sets,
        }
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub fn sets(&self) -> &[MetricSet] {
        &self.sets
    }

    pub fn set(&self, symbol_name: &str) -> Result<&MetricSet> {
        self.sets
            .iter()
            .find(|s| s.symbol_name == symbol_name)
            .ok_or_else(|| CalcError::not_found(format!("metric set '{}'", symbol_name)))
    }

    pub fn set_mut(&mut self, symbol_name: &str) -> Result<&mut MetricSet> {
        self.sets
            .iter_mut()
            .find(|s| s.symbol_name == symbol_name)
            .ok_or_else(|| CalcError::not_found(format!("metric set '{}'", symbol_name)))
    }

    /// Remove entries unavailable on the catalog device from every set
    pub fn filter_available(&mut self) {
        let evaluator = Evaluator::for_device(&self.device);
        for set in &mut self.sets {
            set.filter_available(&evaluator);
        }
    }
}

// ============================================================================
// Definitions (serde)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogDefinition {
    pub device: Device,
    #[serde(default)]
    pub metric_sets: Vec<MetricSetDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSetDefinition {
    pub symbol_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    pub api_mask: ApiMask,
    #[serde(default)]
    pub raw_report_size: u32,
    #[serde(default)]
    pub query_report_size: u32,
    #[serde(default)]
    pub metrics: Vec<MetricDefinition>,
    #[serde(default)]
    pub informations: Vec<InformationDefinition>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricDefinition {
    pub symbol_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub long_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub group: String,
    /// Inherits the set's mask when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_mask: Option<ApiMask>,
    #[serde(default)]
    pub metric_type: MetricType,
    #[serde(default)]
    pub result_type: ResultType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub units: String,
    #[serde(default)]
    pub low_watermark: i64,
    #[serde(default)]
    pub high_watermark: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub delta_function: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_read: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub io_read: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InformationDefinition {
    pub symbol_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub long_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub group: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_mask: Option<ApiMask>,
    #[serde(default)]
    pub info_type: InformationType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub units: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub overflow_function: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub io_read: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_read: Option<String>,
}

impl CatalogDefinition {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| CalcError::catalog(format!("invalid YAML: {}", e)))
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| CalcError::catalog(format!("invalid JSON: {}", e)))
    }

    /// Load from a `.json`, `.yaml` or `.yml` file
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            CalcError::catalog(format!("cannot read '{}': {}", path.display(), e))
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text),
            Some("yaml") | Some("yml") => Self::from_yaml_str(&text),
            other => Err(CalcError::catalog(format!(
                "unsupported catalog extension {:?} for '{}'",
                other,
                path.display()
            ))),
        }
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| CalcError::catalog(e.to_string()))
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| CalcError::catalog(e.to_string()))
    }

    /// Parse every equation and build the catalog
    pub fn build(&self) -> Result<Catalog> {
        let device = &self.device;
        let sets = self
            .metric_sets
            .iter()
            .map(|set| set.build(device))
            .collect::<Result<Vec<_>>>()?;
        tracing::debug!(
            device = %device.name,
            generation = %device.generation,
            sets = sets.len(),
            "Catalog built"
        );
        Ok(Catalog::new(device.clone(), sets))
    }
}

impl MetricSetDefinition {
    fn build(&self, device: &Device) -> Result<MetricSet> {
        let metrics = self
            .metrics
            .iter()
            .map(|m| m.build(self, device))
            .collect::<Result<Vec<_>>>()?;
        let informations = self
            .informations
            .iter()
            .map(|i| i.build(self, device))
            .collect::<Result<Vec<_>>>()?;

        let mut set = MetricSet::new(self.symbol_name.clone(), self.api_mask)
            .with_report_sizes(self.raw_report_size, self.query_report_size)
            .with_metrics(metrics)
            .with_informations(informations);
        if let Some(short_name) = &self.short_name {
            set.short_name = short_name.clone();
        }
        Ok(set)
    }
}

/// Field-level context attached to build errors
struct Site<'d> {
    set: &'d str,
    kind: &'static str,
    entity: &'d str,
}

impl Site<'_> {
    fn error(&self, field: &str, err: CalcError) -> CalcError {
        CalcError::catalog(format!(
            "metric set '{}' {} '{}' field '{}': {}",
            self.set, self.kind, self.entity, field, err
        ))
    }

    fn equation(&self, field: &str, source: Option<&str>, device: &Device) -> Result<Option<Equation>> {
        match source {
            None => Ok(None),
            Some(text) if text.trim().is_empty() => Ok(None),
            Some(text) => Equation::parse(text, device)
                .map(Some)
                .map_err(|e| self.error(field, e)),
        }
    }

    fn delta_function(&self, field: &str, text: &str) -> Result<DeltaFunction> {
        text.parse().map_err(|e| self.error(field, e))
    }
}

impl MetricDefinition {
    fn build(&self, set: &MetricSetDefinition, device: &Device) -> Result<Metric> {
        let site = Site {
            set: &set.symbol_name,
            kind: "metric",
            entity: &self.symbol_name,
        };
        if self.symbol_name.is_empty() {
            return Err(site.error("symbol_name", CalcError::invalid_parameter("empty")));
        }

        let mut metric = Metric::new(self.symbol_name.clone(), self.result_type);
        if let Some(short_name) = &self.short_name {
            metric.short_name = short_name.clone();
        }
        metric.long_name = self.long_name.clone();
        metric.group = self.group.clone();
        metric.api_mask = self.api_mask.unwrap_or(set.api_mask);
        metric.metric_type = self.metric_type;
        metric.units = self.units.clone();
        metric.low_watermark = self.low_watermark;
        metric.high_watermark = self.high_watermark;
        metric.delta_function = site.delta_function("delta_function", &self.delta_function)?;
        metric.availability = site.equation("availability", self.availability.as_deref(), device)?;
        metric.query_read = site.equation("query_read", self.query_read.as_deref(), device)?;
        metric.io_read = site.equation("io_read", self.io_read.as_deref(), device)?;
        metric.normalization =
            site.equation("normalization", self.normalization.as_deref(), device)?;
        metric.max_value = site.equation("max_value", self.max_value.as_deref(), device)?;
        Ok(metric)
    }
}

impl InformationDefinition {
    fn build(&self, set: &MetricSetDefinition, device: &Device) -> Result<Information> {
        let site = Site {
            set: &set.symbol_name,
            kind: "information",
            entity: &self.symbol_name,
        };
        if self.symbol_name.is_empty() {
            return Err(site.error("symbol_name", CalcError::invalid_parameter("empty")));
        }

        let mut information = Information::new(self.symbol_name.clone(), self.info_type);
        if let Some(short_name) = &self.short_name {
            information.short_name = short_name.clone();
        }
        information.long_name = self.long_name.clone();
        information.group = self.group.clone();
        information.api_mask = self.api_mask.unwrap_or(set.api_mask);
        information.units = self.units.clone();
        information.overflow_function =
            site.delta_function("overflow_function", &self.overflow_function)?;
        information.availability =
            site.equation("availability", self.availability.as_deref(), device)?;
        information.io_read = site.equation("io_read", self.io_read.as_deref(), device)?;
        information.query_read = site.equation("query_read", self.query_read.as_deref(), device)?;
        Ok(information)
    }
}

// ============================================================================
// Built catalog back to definitions
// ============================================================================

fn source(equation: &Option<Equation>) -> Option<String> {
    equation.as_ref().map(|e| e.source().to_string())
}

impl From<&Catalog> for CatalogDefinition {
    fn from(catalog: &Catalog) -> Self {
        Self {
            device: catalog.device().as_ref().clone(),
            metric_sets: catalog.sets().iter().map(MetricSetDefinition::from).collect(),
        }
    }
}

impl From<&MetricSet> for MetricSetDefinition {
    fn from(set: &MetricSet) -> Self {
        Self {
            symbol_name: set.symbol_name.clone(),
            short_name: Some(set.short_name.clone()),
            api_mask: set.api_mask,
            raw_report_size: set.raw_report_size,
            query_report_size: set.query_report_size,
            metrics: set.metrics().iter().map(MetricDefinition::from).collect(),
            informations: set
                .informations()
                .iter()
                .map(InformationDefinition::from)
                .collect(),
        }
    }
}

impl From<&Metric> for MetricDefinition {
    fn from(metric: &Metric) -> Self {
        Self {
            symbol_name: metric.symbol_name.clone(),
            short_name: Some(metric.short_name.clone()),
            long_name: metric.long_name.clone(),
            group: metric.group.clone(),
            api_mask: Some(metric.api_mask),
            metric_type: metric.metric_type,
            result_type: metric.result_type,
            units: metric.units.clone(),
            low_watermark: metric.low_watermark,
            high_watermark: metric.high_watermark,
            delta_function: metric.delta_function.to_string(),
            availability: source(&metric.availability),
            query_read: source(&metric.query_read),
            io_read: source(&metric.io_read),
            normalization: source(&metric.normalization),
            max_value: source(&metric.max_value),
        }
    }
}

impl From<&Information> for InformationDefinition {
    fn from(information: &Information) -> Self {
        Self {
            symbol_name: information.symbol_name.clone(),
            short_name: Some(information.short_name.clone()),
            long_name: information.long_name.clone(),
            group: information.group.clone(),
            api_mask: Some(information.api_mask),
            info_type: information.info_type,
            units: information.units.clone(),
            overflow_function: information.overflow_function.to_string(),
            availability: source(&information.availability),
            io_read: source(&information.io_read),
            query_read: source(&information.query_read),
        }
    }
}
