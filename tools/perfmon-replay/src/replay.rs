//! Replay a raw report dump through one metric set

use anyhow::{bail, Context, Result};
use common::ReplayMode;
use perfmon_calc::{
    calculate_all, CalculationContext, Device, MetricSet, MetricsCalculator, QueryCalculation,
    StreamCalculation, TypedValue,
};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default)]
pub struct ReplayOptions {
    pub mode: ReplayMode,
    pub report_filtering: bool,
    pub max_values: bool,
    /// Raw reports per calculation call; the whole dump when absent
    pub batch: Option<usize>,
}

/// Calculated reports of one replay
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayOutput {
    /// Metric symbol names followed by information symbol names
    pub columns: Vec<String>,
    pub rows: Vec<Vec<TypedValue>>,
    /// One row per calculated report when max values were requested
    pub max_rows: Option<Vec<Vec<TypedValue>>>,
    pub raw_reports: usize,
}

impl ReplayOutput {
    pub fn metrics_count(&self) -> usize {
        self.max_rows
            .as_ref()
            .and_then(|rows| rows.first())
            .map_or(0, Vec::len)
    }
}

pub fn report_size(set: &MetricSet, mode: ReplayMode) -> usize {
    match mode {
        ReplayMode::Stream => set.raw_report_size as usize,
        ReplayMode::Query => set.query_report_size as usize,
    }
}

pub fn replay(
    device: Arc<Device>,
    set: &MetricSet,
    raw: &[u8],
    options: ReplayOptions,
) -> Result<ReplayOutput> {
    let stride = report_size(set, options.mode);
    if stride == 0 {
        bail!(
            "Metric set '{}' has no {:?} report size",
            set.symbol_name,
            options.mode
        );
    }
    if raw.len() % stride != 0 {
        bail!(
            "Report dump is {} bytes, not a multiple of the {} byte report size",
            raw.len(),
            stride
        );
    }

    let raw_reports = raw.len() / stride;
    let batch = options.batch.unwrap_or(raw_reports).max(1);
    let width = set.values_per_report();
    let metrics = set.metrics_count();

    let mut calculator = MetricsCalculator::new(device);
    let mut rows = Vec::new();
    let mut max_rows = Vec::new();

    for (index, chunk) in raw.chunks(batch * stride).enumerate() {
        let count = chunk.len() / stride;
        let mut out = vec![TypedValue::ZERO; width * count];
        let mut max = vec![TypedValue::ZERO; metrics * count];

        let mut context = CalculationContext::new(set, chunk, count as u32, &mut out)
            .with_report_filtering(options.report_filtering);
        if options.max_values {
            context = context.with_max_values(&mut max);
        }

        let result = match options.mode {
            ReplayMode::Stream => {
                calculate_all(&mut StreamCalculation::new(&mut calculator), &mut context)
            },
            ReplayMode::Query => {
                calculate_all(&mut QueryCalculation::new(&mut calculator), &mut context)
            },
        };
        let produced =
            result.with_context(|| format!("Calculation failed in batch {}", index))? as usize;

        rows.extend(context.produced_values().chunks(width.max(1)).map(<[TypedValue]>::to_vec));
        drop(context);
        if options.max_values && metrics > 0 {
            max_rows.extend(max[..produced * metrics].chunks(metrics).map(<[TypedValue]>::to_vec));
        }
        tracing::debug!(batch = index, raw = count, produced, "Batch calculated");
    }

    let columns = set
        .metrics()
        .iter()
        .map(|m| m.symbol_name.clone())
        .chain(set.informations().iter().map(|i| i.symbol_name.clone()))
        .collect();

    Ok(ReplayOutput {
        columns,
        rows,
        max_rows: options.max_values.then_some(max_rows),
        raw_reports,
    })
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::catalog_file::{self, tests::write_catalog};

    fn dump(pairs: &[(u32, u32)]) -> Vec<u8> {
        pairs
            .iter()
            .flat_map(|(clocks, active)| [clocks.to_le_bytes(), active.to_le_bytes()].concat())
            .collect()
    }

    fn catalog(filter: bool) -> perfmon_calc::Catalog {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = catalog_file::load(&write_catalog(dir.path())).unwrap();
        if filter {
            catalog.filter_available();
        }
        catalog
    }

    #[test]
    fn test_stream_replay() {
        let catalog = catalog(true);
        let set = catalog.set("RenderBasic").unwrap();
        let raw = dump(&[(0, 0), (200, 50), (600, 150)]);

        let output = replay(catalog.device().clone(), set, &raw, ReplayOptions::default()).unwrap();
        assert_eq!(output.columns, vec!["GpuCoreClocks", "EuActive", "ContextId"]);
        assert_eq!(output.raw_reports, 3);
        assert_eq!(
            output.rows,
            vec![
                vec![TypedValue::U64(200), TypedValue::F32(25.0), TypedValue::U64(0)],
                vec![TypedValue::U64(400), TypedValue::F32(25.0), TypedValue::U64(0)],
            ]
        );
        assert!(output.max_rows.is_none());
    }

    #[test]
    fn test_batched_stream_matches_single_call() {
        let catalog = catalog(true);
        let set = catalog.set("RenderBasic").unwrap();
        let raw = dump(&[(0, 0), (200, 50), (600, 150), (1000, 350), (1100, 360)]);

        let whole = replay(catalog.device().clone(), set, &raw, ReplayOptions::default()).unwrap();
        for batch in [1, 2, 3] {
            let options = ReplayOptions {
                batch: Some(batch),
                ..Default::default()
            };
            let batched = replay(catalog.device().clone(), set, &raw, options).unwrap();
            assert_eq!(batched.rows, whole.rows, "batch {}", batch);
        }
    }

    #[test]
    fn test_query_replay_with_max_values() {
        let catalog = catalog(false);
        let set = catalog.set("RenderBasic").unwrap();
        let raw = dump(&[(400, 100)]);
        let options = ReplayOptions {
            mode: ReplayMode::Query,
            max_values: true,
            ..Default::default()
        };

        let output = replay(catalog.device().clone(), set, &raw, options).unwrap();
        assert_eq!(output.columns.len(), 4);
        assert_eq!(output.rows[0][0], TypedValue::U64(400));
        assert_eq!(output.rows[0][1], TypedValue::F32(25.0));
        let max_rows = output.max_rows.as_ref().unwrap();
        assert_eq!(max_rows.len(), 1);
        assert_eq!(output.metrics_count(), 3);
    }

    #[test]
    fn test_partial_report_is_rejected() {
        let catalog = catalog(true);
        let set = catalog.set("RenderBasic").unwrap();
        let mut raw = dump(&[(0, 0)]);
        raw.push(1);
        let err = replay(catalog.device().clone(), set, &raw, ReplayOptions::default()).unwrap_err();
        assert!(err.to_string().contains("not a multiple"));
    }
}
