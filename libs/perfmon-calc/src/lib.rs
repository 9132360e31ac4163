//! perfmon-calc - GPU performance counter report calculation
//!
//! Turns raw hardware counter reports into typed metric values, driven by
//! per-metric equations written in a small reverse-Polish language.
//!
//! # Features
//!
//! - **Equation parsing**: report reads, immediates, device globals, metric references, operators
//! - **Evaluation**: availability checks, raw reads, per-field deltas, normalization
//! - **Delta engine**: N-bit wraparound, NS_TIME width per generation, boolean deltas
//! - **Calculation**: streaming (snapshot pairs) and query (per-query delta) strategies
//! - **Catalogs**: YAML/JSON definitions and a compact binary format
//!
//! # Example
//!
//! ```rust
//! use perfmon_calc::{
//!     calculate_all, ApiMask, CalculationContext, DeltaFunction, Device, Equation, Generation,
//!     Metric, MetricSet, MetricsCalculator, ResultType, StreamCalculation, TypedValue,
//! };
//! use std::sync::Arc;
//!
//! let device = Arc::new(Device::new("gpu0", Generation::Tgl));
//! let set = MetricSet::new("Basic", ApiMask::IOSTREAM)
//!     .with_report_sizes(4, 4)
//!     .with_metrics([Metric::new("Ticks", ResultType::U64)
//!         .with_delta_function(DeltaFunction::n_bits(32))
//!         .with_io_read(Equation::parse("dw@0", &device).unwrap())]);
//!
//! let raw: Vec<u8> = [10u32, 25, 45].iter().flat_map(|v| v.to_le_bytes()).collect();
//! let mut out = vec![TypedValue::default(); 3];
//! let mut calculator = MetricsCalculator::new(device);
//! let mut context = CalculationContext::new(&set, &raw, 3, &mut out);
//!
//! let produced = calculate_all(&mut StreamCalculation::new(&mut calculator), &mut context).unwrap();
//! assert_eq!(produced, 2);
//! assert_eq!(context.produced_values(), &[TypedValue::U64(15), TypedValue::U64(20)]);
//! ```
//!
//! # Equation tokens
//!
//! | Token | Meaning |
//! |-------|---------|
//! | `dw@O` `qw@O` `rd8@O` `rd16@O` `fl@O` | little-endian field at byte offset `O` |
//! | `rd40@O,E` `bm@O,B,C` | 40-bit counter / bitfield |
//! | `$name` `$$name` `prev$$name` `i$name` `$Self` | symbols |
//! | `UADD` `FDIV` `>>` `==` ... | binary operators |
//! | `GpuDuration` `EuAggrDuration` | normalization macros |

pub mod api_mask;
pub mod calculator;
pub mod catalog;
pub mod delta;
pub mod device;
pub mod equation;
pub mod error;
pub mod evaluator;
pub mod information;
pub mod manager;
pub mod metric;
pub mod metric_set;
pub mod operation;
pub mod parser;
pub mod persist;
pub mod report;
pub mod typed_value;

// Re-exports for convenience
pub use api_mask::ApiMask;
pub use calculator::MetricsCalculator;
pub use catalog::{
    Catalog, CatalogDefinition, InformationDefinition, MetricDefinition, MetricSetDefinition,
};
pub use delta::{calculate_delta, resolve_read_delta, DeltaFunction, DeltaKind};
pub use device::{Device, Generation};
pub use equation::{Equation, EquationElement, MetricIndex};
pub use error::{CalcError, Result};
pub use evaluator::{EvalCache, Evaluator, NormalizationInputs, UnresolvedSymbol};
pub use information::{EquationType, Information, InformationType};
pub use manager::{
    calculate_all, CalculationContext, CalculationManager, QueryCalculation, StreamCalculation,
};
pub use metric::{Metric, MetricType};
pub use metric_set::MetricSet;
pub use operation::Operation;
pub use persist::{load_catalog, save_catalog, PersistReader, PersistWriter};
pub use report::{ReportBatch, ReportView};
pub use typed_value::{ResultType, TypedValue, ValueKind};
