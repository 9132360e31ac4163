//! Metrics calculator
//!
//! Turns raw reports of one metric set into typed output values. Holds the
//! state that survives between reports and between batches:
//!
//! - the last raw report of the previous streaming batch (saved report)
//! - the previous calculated report, visible to `prev$$name` symbols
//! - the `GpuCoreClocks` value of the current report
//! - the context id of the last calculated report
//!
//! Every operation validates slice lengths up front and returns
//! `CalcError::InvalidParameter` before anything is written.

use crate::device::Device;
use crate::error::{CalcError, Result};
use crate::evaluator::{EvalCache, Evaluator, NormalizationInputs, GPU_CORE_CLOCKS};
use crate::information::{Information, InformationType};
use crate::metric_set::MetricSet;
use crate::typed_value::TypedValue;
use std::sync::Arc;

const VECTOR_ENGINE_TOTAL_COUNT: &str = "VectorEngineTotalCount";
const EU_CORES_TOTAL_COUNT: &str = "EuCoresTotalCount";

#[derive(Debug)]
pub struct MetricsCalculator {
    device: Arc<Device>,
    cache: EvalCache,
    saved_report: Vec<u8>,
    saved_report_present: bool,
    previous_values: Vec<TypedValue>,
}

impl MetricsCalculator {
    pub fn new(device: Arc<Device>) -> Self {
        let eu_cores_count = device
            .global(VECTOR_ENGINE_TOTAL_COUNT)
            .or_else(|| device.global(EU_CORES_TOTAL_COUNT))
            .map_or(0, TypedValue::as_u32);
        tracing::debug!(device = %device.name, eu_cores_count, "Metrics calculator created");
        Self {
            device,
            cache: EvalCache {
                eu_cores_count,
                ..EvalCache::default()
            },
            saved_report: Vec::new(),
            saved_report_present: false,
            previous_values: Vec::new(),
        }
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub fn evaluator(&self) -> Evaluator<'_> {
        Evaluator::new(&self.device, self.cache)
    }

    pub fn gpu_core_clocks(&self) -> u64 {
        self.cache.gpu_core_clocks
    }

    pub fn eu_cores_count(&self) -> u32 {
        self.cache.eu_cores_count
    }

    pub fn previous_context_id(&self) -> u64 {
        self.cache.context_id_prev
    }

    /// Previous calculated report (metrics then informations)
    pub fn previous_values(&self) -> &[TypedValue] {
        &self.previous_values
    }

    /// Clear per-report state and size the caches
    ///
    /// A cache is reallocated only when its size changes to a nonzero value;
    /// reallocating the saved report drops its contents.
    pub fn reset(&mut self, raw_report_size: usize, values_count: usize) {
        self.cache.gpu_core_clocks = 0;

        if self.saved_report.len() != raw_report_size && raw_report_size > 0 {
            self.saved_report = allocate(raw_report_size, 0u8, "saved report");
            self.saved_report_present = false;
        }
        if self.previous_values.len() != values_count && values_count > 0 {
            self.previous_values = allocate(values_count, TypedValue::ZERO, "previous values");
        }
    }

    // ========================================================================
    // Metrics
    // ========================================================================

    /// Read metric delta values from one query report (already a delta)
    pub fn read_metrics_from_query_report(
        &mut self,
        set: &MetricSet,
        raw: &[u8],
        out: &mut [TypedValue],
    ) -> Result<()> {
        check_raw("query report", set.query_report_size as usize, raw.len())?;
        check_output("metric values", set.metrics_count(), out.len())?;

        self.cache.gpu_core_clocks = 0;
        for (i, metric) in set.metrics().iter().enumerate() {
            out[i] = TypedValue::ZERO;
            if let Some(equation) = &metric.query_read {
                out[i] = Evaluator::new(&self.device, self.cache).read(equation, raw);
            }
            capture_gpu_clocks(&mut self.cache, &metric.symbol_name, &out[i]);
        }
        Ok(())
    }

    /// Read metric delta values from two consecutive stream reports
    pub fn read_metrics_from_io_report(
        &mut self,
        set: &MetricSet,
        last: &[u8],
        prev: &[u8],
        out: &mut [TypedValue],
    ) -> Result<()> {
        check_raw("last report", set.raw_report_size as usize, last.len())?;
        check_raw("previous report", set.raw_report_size as usize, prev.len())?;
        check_output("metric values", set.metrics_count(), out.len())?;
        read_io_into(&self.device, &mut self.cache, set, last, prev, out);
        Ok(())
    }

    /// Like [`Self::read_metrics_from_io_report`] with the saved report as the previous one
    pub fn read_metrics_against_saved_report(
        &mut self,
        set: &MetricSet,
        last: &[u8],
        out: &mut [TypedValue],
    ) -> Result<()> {
        if !self.saved_report_present {
            return Err(CalcError::invalid_parameter("no saved report present"));
        }
        check_raw("last report", set.raw_report_size as usize, last.len())?;
        check_raw("saved report", set.raw_report_size as usize, self.saved_report.len())?;
        check_output("metric values", set.metrics_count(), out.len())?;
        read_io_into(&self.device, &mut self.cache, set, last, &self.saved_report, out);
        Ok(())
    }

    /// Apply normalization equations and cast to each metric's result type
    ///
    /// `$$name` symbols see only metrics before the current one.
    pub fn normalize_metrics(
        &self,
        set: &MetricSet,
        deltas: &[TypedValue],
        out: &mut [TypedValue],
    ) -> Result<()> {
        let count = set.metrics_count();
        check_output("delta values", count, deltas.len())?;
        check_output("metric values", count, out.len())?;

        let evaluator = self.evaluator();
        for (i, metric) in set.metrics().iter().enumerate() {
            let (done, rest) = out.split_at_mut(i);
            let value = match &metric.normalization {
                Some(equation) => evaluator.normalize(
                    equation,
                    NormalizationInputs {
                        deltas,
                        outputs: done,
                        previous: &self.previous_values,
                        index: i,
                    },
                ),
                None => deltas[i].clone(),
            };
            rest[0] = value.cast_to(metric.result_type);
        }
        Ok(())
    }

    /// Evaluate max-value equations; metrics without one report their output
    pub fn calculate_max_values(
        &self,
        set: &MetricSet,
        deltas: &[TypedValue],
        out: &[TypedValue],
        max_values: &mut [TypedValue],
    ) -> Result<()> {
        let count = set.metrics_count();
        check_output("delta values", count, deltas.len())?;
        check_output("metric values", count, out.len())?;
        check_output("max values", count, max_values.len())?;

        let evaluator = self.evaluator();
        for (i, metric) in set.metrics().iter().enumerate() {
            max_values[i] = match &metric.max_value {
                Some(equation) => evaluator.normalize(
                    equation,
                    NormalizationInputs {
                        deltas,
                        outputs: out,
                        previous: &self.previous_values,
                        index: i,
                    },
                ),
                None => out[i].clone(),
            };
        }
        Ok(())
    }

    // ========================================================================
    // Informations
    // ========================================================================

    /// Read every information of `set` from `raw` into `out`
    ///
    /// With a context id index the read value is cached for
    /// `i$PreviousContextId`.
    pub fn read_information(
        &mut self,
        set: &MetricSet,
        raw: &[u8],
        out: &mut [TypedValue],
        context_id_index: Option<usize>,
    ) -> Result<()> {
        check_output("information values", set.information_count(), out.len())?;
        if let Some(index) = context_id_index {
            check_index("context id", index, set.information_count())?;
        }

        for (i, information) in set.informations().iter().enumerate() {
            out[i] = self.read_single_information(information, set, raw);
        }
        if let Some(index) = context_id_index {
            self.cache.context_id_prev = out[index].as_u64();
        }
        Ok(())
    }

    /// Read one information using the io or query equation per the set's API
    pub fn read_single_information(
        &self,
        information: &Information,
        set: &MetricSet,
        raw: &[u8],
    ) -> TypedValue {
        let value = information
            .read_equation(set.api_mask)
            .map(|equation| self.evaluator().read(equation, raw))
            .unwrap_or_default();
        information_value(information.info_type, &value)
    }

    /// Cache the context id of `raw`, or clear it when the set has none
    pub fn read_context_id_information(
        &mut self,
        set: &MetricSet,
        raw: &[u8],
        context_id_index: Option<usize>,
    ) -> Result<()> {
        self.cache.context_id_prev = match context_id_index {
            None => 0,
            Some(index) => self.read_information_by_index(set, raw, Some(index))?,
        };
        Ok(())
    }

    /// Information value as `u64`; zero without an index
    pub fn read_information_by_index(
        &self,
        set: &MetricSet,
        raw: &[u8],
        index: Option<usize>,
    ) -> Result<u64> {
        let Some(index) = index else {
            return Ok(0);
        };
        let information = set.information(index).ok_or_else(|| {
            CalcError::invalid_parameter(format!(
                "information index {} out of range ({} informations)",
                index,
                set.information_count()
            ))
        })?;
        Ok(self.read_single_information(information, set, raw).as_u64())
    }

    /// Evaluate io-read equations of `informations` without a report
    ///
    /// Used for values that do not depend on report contents, such as
    /// constants patched in through [`Information::set_value`].
    pub fn read_io_measurement_information(
        &self,
        informations: &[Information],
        out: &mut [TypedValue],
    ) -> Result<()> {
        check_output("measurement information values", informations.len(), out.len())?;
        let evaluator = self.evaluator();
        for (i, information) in informations.iter().enumerate() {
            let value = information
                .io_read
                .as_ref()
                .map(|equation| evaluator.read(equation, &[]))
                .unwrap_or_default();
            out[i] = information_value(information.info_type, &value);
        }
        Ok(())
    }

    // ========================================================================
    // Saved state
    // ========================================================================

    /// Keep `raw` as the previous report for the next streaming batch
    pub fn save_report(&mut self, raw: &[u8]) -> Result<()> {
        if self.saved_report.is_empty() {
            return Err(CalcError::invalid_parameter("saved report storage unavailable"));
        }
        if raw.len() != self.saved_report.len() {
            return Err(CalcError::SizeMismatch {
                expected: self.saved_report.len(),
                actual: raw.len(),
            });
        }
        self.saved_report.copy_from_slice(raw);
        self.saved_report_present = true;
        Ok(())
    }

    /// Keep one calculated report for `prev$$name`
    ///
    /// `values` must hold exactly one report (metrics then informations) as
    /// sized by the last [`reset`](Self::reset); otherwise nothing is written.
    pub fn save_calculated_report(&mut self, values: &[TypedValue]) -> Result<()> {
        if self.previous_values.is_empty() {
            return Err(CalcError::invalid_parameter("previous values storage unavailable"));
        }
        if values.len() != self.previous_values.len() {
            return Err(CalcError::SizeMismatch {
                expected: self.previous_values.len(),
                actual: values.len(),
            });
        }
        self.previous_values.clone_from_slice(values);
        Ok(())
    }

    pub fn saved_report_present(&self) -> bool {
        self.saved_report_present
    }

    pub fn saved_report(&self) -> Option<&[u8]> {
        self.saved_report_present.then_some(self.saved_report.as_slice())
    }

    pub fn discard_saved_report(&mut self) {
        self.saved_report_present = false;
    }
}

fn read_io_into(
    device: &Device,
    cache: &mut EvalCache,
    set: &MetricSet,
    last: &[u8],
    prev: &[u8],
    out: &mut [TypedValue],
) {
    cache.gpu_core_clocks = 0;
    for (i, metric) in set.metrics().iter().enumerate() {
        out[i] = TypedValue::ZERO;
        if let Some(equation) = &metric.io_read {
            out[i] = Evaluator::new(device, *cache).read_with_delta(
                equation,
                metric.delta_function,
                last,
                prev,
            );
        }
        capture_gpu_clocks(cache, &metric.symbol_name, &out[i]);
    }
}

fn capture_gpu_clocks(cache: &mut EvalCache, symbol_name: &str, value: &TypedValue) {
    if cache.gpu_core_clocks == 0 && symbol_name == GPU_CORE_CLOCKS {
        cache.gpu_core_clocks = value.as_u64();
    }
}

fn information_value(info_type: InformationType, value: &TypedValue) -> TypedValue {
    match info_type {
        InformationType::Flag => TypedValue::Bool(value.as_bool()),
        _ => TypedValue::U64(value.as_u64()),
    }
}

fn allocate<T: Clone>(len: usize, fill: T, what: &'static str) -> Vec<T> {
    let mut buffer = Vec::new();
    if let Err(e) = buffer.try_reserve_exact(len) {
        tracing::error!(cache = what, len, error = %e, "Cache allocation failed");
        return Vec::new();
    }
    buffer.resize(len, fill);
    buffer
}

fn check_output(what: &str, needed: usize, len: usize) -> Result<()> {
    if len < needed {
        return Err(CalcError::invalid_parameter(format!(
            "{} buffer holds {} values, {} required",
            what, len, needed
        )));
    }
    Ok(())
}

fn check_raw(what: &str, stride: usize, len: usize) -> Result<()> {
    if len < stride {
        return Err(CalcError::invalid_parameter(format!(
            "{} is {} bytes, report size is {}",
            what, len, stride
        )));
    }
    Ok(())
}

fn check_index(what: &str, index: usize, count: usize) -> Result<()> {
    if index >= count {
        return Err(CalcError::invalid_parameter(format!(
            "{} index {} out of range ({} informations)",
            what, index, count
        )));
    }
    Ok(())
}
