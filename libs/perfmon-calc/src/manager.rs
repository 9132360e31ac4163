//! Calculation managers: drive a [`MetricsCalculator`] over a buffer of raw reports
//!
//! Two strategies share the [`CalculationManager`] trait:
//!
//! | Strategy | Input | Reports produced from `n` raw reports |
//! |----------|-------|----------------------------------------|
//! | [`StreamCalculation`] | consecutive snapshots | `n - 1`, or `n` when a report was saved by the previous batch |
//! | [`QueryCalculation`] | per-query deltas | `n` |
//!
//! A streaming batch always ends by saving its last raw report into the
//! calculator, so the next batch continues from it.

use crate::calculator::MetricsCalculator;
use crate::error::{CalcError, Result};
use crate::metric_set::MetricSet;
use crate::report::ReportBatch;
use crate::typed_value::TypedValue;

const CONTEXT_ID: &str = "ContextId";
const REPORT_REASON: &str = "ReportReason";

// ============================================================================
// Context
// ============================================================================

/// Input and output buffers of one calculation
pub struct CalculationContext<'a> {
    set: &'a MetricSet,
    raw: &'a [u8],
    report_count: u32,
    out: &'a mut [TypedValue],
    max_values: Option<&'a mut [TypedValue]>,
    report_filtering: bool,
    produced: u32,
    deltas: Vec<TypedValue>,
    context_id_index: Option<usize>,
    report_reason_index: Option<usize>,
}

impl<'a> CalculationContext<'a> {
    pub fn new(
        set: &'a MetricSet,
        raw: &'a [u8],
        report_count: u32,
        out: &'a mut [TypedValue],
    ) -> Self {
        Self {
            set,
            raw,
            report_count,
            out,
            max_values: None,
            report_filtering: false,
            produced: 0,
            deltas: Vec::new(),
            context_id_index: None,
            report_reason_index: None,
        }
    }

    /// Also compute max values, `metrics_count` per produced report
    pub fn with_max_values(mut self, max_values: &'a mut [TypedValue]) -> Self {
        self.max_values = Some(max_values);
        self
    }

    pub fn with_report_filtering(mut self, enabled: bool) -> Self {
        self.report_filtering = enabled;
        self
    }

    pub fn set(&self) -> &'a MetricSet {
        self.set
    }

    pub fn report_count(&self) -> u32 {
        self.report_count
    }

    pub fn produced_reports(&self) -> u32 {
        self.produced
    }

    pub fn context_id_index(&self) -> Option<usize> {
        self.context_id_index
    }

    pub fn report_reason_index(&self) -> Option<usize> {
        self.report_reason_index
    }

    /// Output values of produced reports
    pub fn produced_values(&self) -> &[TypedValue] {
        let len = self.produced as usize * self.set.values_per_report();
        &self.out[..len.min(self.out.len())]
    }

    fn begin(&mut self) {
        self.produced = 0;
        self.deltas.clear();
        self.deltas.resize(self.set.metrics_count(), TypedValue::ZERO);
    }

    /// Compute one report into the next output slot
    fn calculate_report(
        &mut self,
        calculator: &mut MetricsCalculator,
        last: &[u8],
        prev: Previous<'_>,
        context_id_index: Option<usize>,
    ) -> Result<()> {
        let set = self.set;
        let metrics = set.metrics_count();
        let values = set.values_per_report();
        let out_start = self.produced as usize * values;
        let max_start = self.produced as usize * metrics;

        let out = self
            .out
            .get_mut(out_start..out_start + values)
            .ok_or_else(|| short_buffer("output", out_start + values))?;
        let max = match self.max_values.as_deref_mut() {
            Some(max) => Some(
                max.get_mut(max_start..max_start + metrics)
                    .ok_or_else(|| short_buffer("max values", max_start + metrics))?,
            ),
            None => None,
        };

        let stream = match prev {
            Previous::Saved => {
                calculator.read_metrics_against_saved_report(set, last, &mut self.deltas)?;
                true
            },
            Previous::Raw(prev) => {
                calculator.read_metrics_from_io_report(set, last, prev, &mut self.deltas)?;
                true
            },
            Previous::None => {
                calculator.read_metrics_from_query_report(set, last, &mut self.deltas)?;
                false
            },
        };

        let (metric_values, information_values) = out.split_at_mut(metrics);
        calculator.normalize_metrics(set, &self.deltas, metric_values)?;
        calculator.read_information(set, last, information_values, context_id_index)?;
        if let Some(max) = max {
            calculator.calculate_max_values(set, &self.deltas, metric_values, max)?;
        }
        // only streams feed `prev$$name`
        if stream {
            if let Err(e) = calculator.save_calculated_report(out) {
                tracing::debug!(error = %e, "Unable to store calculated report for reuse");
            }
        }

        self.produced += 1;
        Ok(())
    }
}

fn short_buffer(what: &str, needed: usize) -> CalcError {
    CalcError::invalid_parameter(format!("{} buffer too small, {} values required", what, needed))
}

enum Previous<'r> {
    Saved,
    Raw(&'r [u8]),
    None,
}

// ============================================================================
// Manager trait
// ============================================================================

pub trait CalculationManager {
    /// Validate the context and reset cursors and calculator caches
    fn prepare(&mut self, context: &mut CalculationContext<'_>) -> Result<()>;

    /// Produce the next report; false once the batch is exhausted
    fn calculate_next(&mut self, context: &mut CalculationContext<'_>) -> Result<bool>;

    /// Return to the state before `prepare`
    fn reset(&mut self);
}

/// Run `prepare` then `calculate_next` until exhausted; returns produced reports
pub fn calculate_all<M>(manager: &mut M, context: &mut CalculationContext<'_>) -> Result<u32>
where
    M: CalculationManager + ?Sized,
{
    manager.prepare(context)?;
    while manager.calculate_next(context)? {}
    tracing::debug!(
        set = %context.set().symbol_name,
        raw_reports = context.report_count(),
        produced = context.produced_reports(),
        "Calculation complete"
    );
    Ok(context.produced_reports())
}

// ============================================================================
// Streaming
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PrevReport {
    /// The report saved by the previous batch
    Saved,
    Index(usize),
}

/// Streaming strategy: each report is the delta of two consecutive snapshots
pub struct StreamCalculation<'c> {
    calculator: &'c mut MetricsCalculator,
    last: usize,
    prev: PrevReport,
}

impl<'c> StreamCalculation<'c> {
    pub fn new(calculator: &'c mut MetricsCalculator) -> Self {
        Self {
            calculator,
            last: 0,
            prev: PrevReport::Index(0),
        }
    }

    pub fn calculator(&self) -> &MetricsCalculator {
        self.calculator
    }

    fn save_last(&mut self, batch: &ReportBatch<'_>) {
        let saved = batch
            .report(self.last)
            .and_then(|report| self.calculator.save_report(report));
        if let Err(e) = saved {
            tracing::debug!(error = %e, "Unable to store last raw report for reuse");
        }
    }
}

impl CalculationManager for StreamCalculation<'_> {
    fn prepare(&mut self, context: &mut CalculationContext<'_>) -> Result<()> {
        let set = context.set;
        context.context_id_index = set.information_index(CONTEXT_ID);
        context.report_reason_index = set.information_index(REPORT_REASON);

        if context.report_filtering && context.context_id_index.is_none() {
            tracing::error!(set = %set.symbol_name, "Report filtering requires a context id information");
            return Err(CalcError::invalid_parameter(format!(
                "metric set '{}' has no {} information required for report filtering",
                set.symbol_name, CONTEXT_ID
            )));
        }
        ReportBatch::new(
            context.raw,
            set.raw_report_size as usize,
            context.report_count as usize,
        )?;

        self.reset();
        context.begin();
        self.calculator
            .reset(set.raw_report_size as usize, set.values_per_report());
        Ok(())
    }

    fn calculate_next(&mut self, context: &mut CalculationContext<'_>) -> Result<bool> {
        let count = context.report_count as usize;
        if count == 0 {
            return Ok(false);
        }
        let set = context.set;
        let batch = ReportBatch::new(context.raw, set.raw_report_size as usize, count)?;

        let saved = self.calculator.saved_report_present();
        let single = count == 1;
        if !saved {
            let exhausted = match self.prev {
                PrevReport::Index(prev) => self.last >= count || prev >= count - 1,
                PrevReport::Saved => self.last >= count,
            };
            if single || exhausted {
                tracing::debug!(set = %set.symbol_name, "Stream batch complete");
                self.save_last(&batch);
                return Ok(false);
            }
        }

        if saved && self.prev == PrevReport::Index(0) {
            self.prev = PrevReport::Saved;
        }
        if let PrevReport::Index(prev) = self.prev {
            self.last = prev + 1;
        }

        let last = batch.report(self.last)?;
        let prev = match self.prev {
            PrevReport::Saved => Previous::Saved,
            PrevReport::Index(prev) => Previous::Raw(batch.report(prev)?),
        };
        let context_id_index = context.context_id_index;
        context.calculate_report(self.calculator, last, prev, context_id_index)?;

        self.prev = PrevReport::Index(self.last);

        if single {
            self.save_last(&batch);
            return Ok(false);
        }
        if saved {
            self.calculator.discard_saved_report();
        }
        Ok(true)
    }

    fn reset(&mut self) {
        self.last = 0;
        self.prev = PrevReport::Index(0);
    }
}

// ============================================================================
// Query
// ============================================================================

/// Query strategy: every raw report is already a delta
pub struct QueryCalculation<'c> {
    calculator: &'c mut MetricsCalculator,
}

impl<'c> QueryCalculation<'c> {
    pub fn new(calculator: &'c mut MetricsCalculator) -> Self {
        Self { calculator }
    }

    pub fn calculator(&self) -> &MetricsCalculator {
        self.calculator
    }
}

impl CalculationManager for QueryCalculation<'_> {
    fn prepare(&mut self, context: &mut CalculationContext<'_>) -> Result<()> {
        let set = context.set;
        self.calculator.reset(0, 0);
        ReportBatch::new(
            context.raw,
            set.query_report_size as usize,
            context.report_count as usize,
        )?;
        context.begin();
        Ok(())
    }

    fn calculate_next(&mut self, context: &mut CalculationContext<'_>) -> Result<bool> {
        if context.produced >= context.report_count {
            return Ok(false);
        }
        let set = context.set;
        let batch = ReportBatch::new(
            context.raw,
            set.query_report_size as usize,
            context.report_count as usize,
        )?;
        let raw = batch.report(context.produced as usize)?;
        context.calculate_report(self.calculator, raw, Previous::None, None)?;
        Ok(true)
    }

    fn reset(&mut self) {}
}
