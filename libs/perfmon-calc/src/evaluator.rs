//! Stack-based equation evaluator
//!
//! Four evaluation modes share one LIFO discipline:
//!
//! - [`Evaluator::solve_boolean`]: availability check on device globals
//! - [`Evaluator::read`]: raw fields of a single report
//! - [`Evaluator::read_with_delta`]: raw fields of two reports, differenced per field
//! - [`Evaluator::normalize`]: already computed delta and output values
//!
//! Evaluation never fails. A malformed equation (final stack depth other than
//! one, operator underflow, unreadable field) is logged at `error` level and
//! evaluates to `U64(0)`, so a single bad catalog entry cannot abort a batch.

use crate::delta::{calculate_delta, resolve_read_delta, DeltaFunction};
use crate::device::{Device, Generation};
use crate::equation::{Equation, EquationElement};
use crate::error::Result;
use crate::report::ReportView;
use crate::typed_value::TypedValue;

/// Symbol name of the metric whose value feeds `GpuDuration` normalization
pub const GPU_CORE_CLOCKS: &str = "GpuCoreClocks";
/// Information symbol exposing the context id cached from the previous report
pub const PREVIOUS_CONTEXT_ID: &str = "PreviousContextId";

/// Calculator state visible to equations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvalCache {
    pub gpu_core_clocks: u64,
    pub eu_cores_count: u32,
    pub context_id_prev: u64,
}

/// A local counter symbol that evaluated to zero because nothing provides it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvedSymbol {
    /// Known to be missing on this generation (hardware topology fields)
    Tolerated(String),
    /// Missing without explanation, most likely a catalog bug
    Unexpected(String),
}

/// Substrings of unpacked topology symbols that availability checks treat as zero
const TOPOLOGY_SYMBOL_PATTERNS: [&str; 6] = [
    "GtSlice",
    "GtXeCore",
    "GtL3Bank",
    "GtL3Node",
    "GtSqidi",
    "GtCopyEngine",
];

impl UnresolvedSymbol {
    /// Classify a local counter read inside a read equation
    pub fn in_read_equation(name: &str, generation: Generation) -> Self {
        if generation.lacks_slice_globals() && name.contains("GtSlice") {
            Self::Tolerated(name.to_string())
        } else {
            Self::Unexpected(name.to_string())
        }
    }

    /// Classify a local counter read inside an availability equation
    pub fn in_availability_equation(name: &str) -> Self {
        let unpacked = TOPOLOGY_SYMBOL_PATTERNS.iter().any(|p| name.contains(p))
            && !name.contains("Mask");
        if unpacked {
            Self::Tolerated(name.to_string())
        } else {
            Self::Unexpected(name.to_string())
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Tolerated(name) | Self::Unexpected(name) => name,
        }
    }

    pub fn is_tolerated(&self) -> bool {
        matches!(self, Self::Tolerated(_))
    }

    fn report(&self, equation: &Equation) {
        match self {
            Self::Tolerated(name) => {
                tracing::debug!(symbol = %name, equation = %equation, "Unresolved symbol tolerated")
            },
            Self::Unexpected(name) => {
                tracing::error!(symbol = %name, equation = %equation, "Unresolved symbol unexpected")
            },
        }
    }
}

/// Values visible to a normalization or max-value equation
#[derive(Debug, Clone, Copy)]
pub struct NormalizationInputs<'v> {
    /// Delta values of the current report
    pub deltas: &'v [TypedValue],
    /// Output values computed so far for the current report
    pub outputs: &'v [TypedValue],
    /// Output values of the previous report (may be empty)
    pub previous: &'v [TypedValue],
    /// Index of the metric being evaluated
    pub index: usize,
}

enum ReadSource<'r> {
    Single(ReportView<'r>),
    Pair {
        last: ReportView<'r>,
        prev: ReportView<'r>,
        delta: DeltaFunction,
    },
}

/// Evaluator bound to a device and a snapshot of calculator state
#[derive(Debug, Clone, Copy)]
pub struct Evaluator<'a> {
    device: &'a Device,
    cache: EvalCache,
}

impl<'a> Evaluator<'a> {
    pub fn new(device: &'a Device, cache: EvalCache) -> Self {
        Self { device, cache }
    }

    /// Evaluator with empty calculator state, enough for availability checks
    pub fn for_device(device: &'a Device) -> Self {
        Self::new(device, EvalCache::default())
    }

    pub fn device(&self) -> &'a Device {
        self.device
    }

    pub fn cache(&self) -> EvalCache {
        self.cache
    }

    // ========================================================================
    // Availability
    // ========================================================================

    /// Evaluate an availability equation; anything outside the unsigned
    /// integer subset makes the check fail
    pub fn solve_boolean(&self, equation: &Equation) -> bool {
        let mut stack: Vec<u64> = Vec::with_capacity(equation.len());

        for element in equation.elements() {
            match element {
                EquationElement::ImmU64(value) => stack.push(*value),
                EquationElement::LocalCounterSymbol { name, .. } => {
                    let symbol = UnresolvedSymbol::in_availability_equation(name);
                    symbol.report(equation);
                    if !symbol.is_tolerated() {
                        return false;
                    }
                    stack.push(0);
                },
                EquationElement::GlobalSymbol(name) => {
                    stack.push(self.availability_global(equation, name));
                },
                EquationElement::Operation(op) => {
                    if !op.is_availability_safe() {
                        malformed(equation, "operation not allowed in availability equation");
                        return false;
                    }
                    let (Some(last), Some(prev)) = (stack.pop(), stack.pop()) else {
                        tracing::debug!(equation = %equation, "Availability stack underflow");
                        return false;
                    };
                    stack.push(op.apply_u64(prev, last));
                },
                _ => {
                    malformed(equation, "element not allowed in availability equation");
                    return false;
                },
            }
        }

        if equation.is_empty() {
            return false;
        }
        if stack.len() != 1 {
            malformed(equation, "availability stack does not hold exactly one value");
        }
        stack.last().copied().unwrap_or(0) != 0
    }

    fn availability_global(&self, equation: &Equation, name: &str) -> u64 {
        match self.device.global(name) {
            Some(TypedValue::U64(v)) => *v,
            Some(TypedValue::U32(v)) => u64::from(*v),
            Some(TypedValue::Bool(b)) => u64::from(*b),
            Some(TypedValue::ByteArray(bytes)) if bytes.len() == 8 => {
                let mut word = [0u8; 8];
                word.copy_from_slice(bytes);
                u64::from_le_bytes(word)
            },
            Some(_) => {
                malformed(equation, "global symbol type not usable in availability equation");
                0
            },
            None => {
                malformed(equation, "global symbol missing");
                0
            },
        }
    }

    // ========================================================================
    // Raw reads
    // ========================================================================

    /// Evaluate a read equation against one raw report
    pub fn read(&self, equation: &Equation, raw: &[u8]) -> TypedValue {
        self.run_read(equation, ReadSource::Single(ReportView::new(raw)))
    }

    /// Evaluate a read equation against two raw reports, applying `delta`
    /// (NS_TIME resolved to the generation's width) to every raw field
    pub fn read_with_delta(
        &self,
        equation: &Equation,
        delta: DeltaFunction,
        last: &[u8],
        prev: &[u8],
    ) -> TypedValue {
        let source = ReadSource::Pair {
            last: ReportView::new(last),
            prev: ReportView::new(prev),
            delta: resolve_read_delta(delta, self.device.generation),
        };
        self.run_read(equation, source)
    }

    fn run_read(&self, equation: &Equation, source: ReadSource<'_>) -> TypedValue {
        let mut stack = EvalStack::with_capacity(equation.len());

        for element in equation.elements() {
            if element.is_read() {
                let value = match &source {
                    ReadSource::Single(view) => raw_field(view, element),
                    ReadSource::Pair { last, prev, delta } => {
                        raw_field(last, element).and_then(|l| {
                            raw_field(prev, element).map(|p| {
                                calculate_delta(*delta, self.device.generation, &l, &p)
                            })
                        })
                    },
                };
                let value = value.unwrap_or_else(|e| {
                    tracing::error!(equation = %equation, error = %e, "Report field unreadable");
                    TypedValue::ZERO
                });
                stack.push(value);
                continue;
            }

            match element {
                EquationElement::ImmU64(v) => stack.push(TypedValue::U64(*v)),
                EquationElement::ImmF32(v) => stack.push(TypedValue::F32(*v)),
                EquationElement::GlobalSymbol(name) => stack.push(self.global(name)),
                EquationElement::InformationSymbol(name) => {
                    if name == PREVIOUS_CONTEXT_ID {
                        stack.push(TypedValue::U64(self.cache.context_id_prev));
                    } else {
                        tracing::error!(symbol = %name, equation = %equation, "Information symbol not supported");
                        stack.push(TypedValue::ZERO);
                    }
                },
                EquationElement::Operation(op) => {
                    if !stack.apply(|prev, last| op.apply(prev, last)) {
                        break;
                    }
                },
                EquationElement::LocalCounterSymbol { name, .. } => {
                    if name == GPU_CORE_CLOCKS && self.cache.gpu_core_clocks != 0 {
                        stack.push(TypedValue::U64(self.cache.gpu_core_clocks));
                    } else {
                        stack.push(TypedValue::ZERO);
                        UnresolvedSymbol::in_read_equation(name, self.device.generation)
                            .report(equation);
                    }
                },
                _ => malformed(equation, "element not allowed in read equation"),
            }
        }

        stack.finish(equation)
    }

    // ========================================================================
    // Normalization
    // ========================================================================

    /// Evaluate a normalization (or max-value) equation
    ///
    /// Raw reads are ignored; `$Self` and local counters resolve to delta
    /// values, `$$name` to outputs and `prev$$name` to the previous report.
    pub fn normalize(&self, equation: &Equation, inputs: NormalizationInputs<'_>) -> TypedValue {
        let mut stack = EvalStack::with_capacity(equation.len());
        let self_value = || inputs.deltas.get(inputs.index).cloned().unwrap_or_default();

        for element in equation.elements() {
            match element {
                EquationElement::ImmU64(v) => stack.push(TypedValue::U64(*v)),
                EquationElement::ImmF32(v) => stack.push(TypedValue::F32(*v)),
                EquationElement::SelfCounterValue => stack.push(self_value()),
                EquationElement::LocalCounterSymbol { index, .. } => {
                    stack.push(lookup(inputs.deltas, index.get()));
                },
                EquationElement::LocalMetricSymbol { index, .. } => {
                    stack.push(lookup(inputs.outputs, index.get()));
                },
                EquationElement::PrevMetricSymbol { index, .. } => {
                    stack.push(lookup(inputs.previous, index.get()));
                },
                EquationElement::GlobalSymbol(name) => stack.push(self.global(name)),
                EquationElement::Operation(op) => {
                    if !stack.apply(|prev, last| op.apply(prev, last)) {
                        break;
                    }
                },
                EquationElement::StdNormGpuDuration => {
                    if !stack.is_empty() {
                        malformed(equation, "GpuDuration must be the only element");
                    }
                    return self.gpu_duration(self_value().as_f32(), 1);
                },
                EquationElement::StdNormEuAggrDuration => {
                    if !stack.is_empty() {
                        malformed(equation, "EuAggrDuration must be the only element");
                    }
                    if self.cache.eu_cores_count == 0 {
                        tracing::error!(equation = %equation, "EU core count unknown");
                    }
                    return self.gpu_duration(self_value().as_f32(), self.cache.eu_cores_count);
                },
                _ => {},
            }
        }

        stack.finish(equation)
    }

    /// `100 * value / (gpu_clocks * scale)` or zero without a clock reference
    fn gpu_duration(&self, value: f32, scale: u32) -> TypedValue {
        let clocks = self.cache.gpu_core_clocks.wrapping_mul(u64::from(scale));
        if self.cache.gpu_core_clocks == 0 || clocks == 0 {
            return TypedValue::F32(0.0);
        }
        TypedValue::F32(100.0 * value / clocks as f32)
    }

    fn global(&self, name: &str) -> TypedValue {
        self.device.global(name).cloned().unwrap_or_default()
    }
}

fn lookup(values: &[TypedValue], index: Option<usize>) -> TypedValue {
    index
        .and_then(|i| values.get(i))
        .cloned()
        .unwrap_or_default()
}

fn raw_field(view: &ReportView<'_>, element: &EquationElement) -> Result<TypedValue> {
    let value = match *element {
        EquationElement::RdBitfield {
            byte_offset,
            bit_offset,
            bit_count,
        } => TypedValue::U64(view.read_bitfield(byte_offset, bit_offset, bit_count)?),
        EquationElement::RdU8 { byte_offset } => TypedValue::U64(u64::from(view.read_u8(byte_offset)?)),
        EquationElement::RdU16 { byte_offset } => {
            TypedValue::U64(u64::from(view.read_u16(byte_offset)?))
        },
        EquationElement::RdU32 { byte_offset } => {
            TypedValue::U64(u64::from(view.read_u32(byte_offset)?))
        },
        EquationElement::RdU64 { byte_offset } => TypedValue::U64(view.read_u64(byte_offset)?),
        EquationElement::RdFloat { byte_offset } => TypedValue::F32(view.read_f32(byte_offset)?),
        EquationElement::Rd40 {
            byte_offset,
            ext_byte_offset,
        } => TypedValue::U64(view.read_u40(byte_offset, ext_byte_offset)?),
        _ => TypedValue::ZERO,
    };
    Ok(value)
}

fn malformed(equation: &Equation, reason: &'static str) {
    tracing::error!(equation = %equation, reason, "Malformed equation");
}

/// Evaluation stack private to one evaluation call
struct EvalStack {
    values: Vec<TypedValue>,
    underflow: bool,
}

impl EvalStack {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
            underflow: false,
        }
    }

    fn push(&mut self, value: TypedValue) {
        self.values.push(value);
    }

    fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Pop `last` then `prev` and push `op(prev, last)`; false on underflow
    fn apply<F>(&mut self, op: F) -> bool
    where
        F: FnOnce(&TypedValue, &TypedValue) -> TypedValue,
    {
        match (self.values.pop(), self.values.pop()) {
            (Some(last), Some(prev)) => {
                self.values.push(op(&prev, &last));
                true
            },
            _ => {
                self.underflow = true;
                false
            },
        }
    }

    fn finish(mut self, equation: &Equation) -> TypedValue {
        if self.underflow {
            malformed(equation, "operator stack underflow");
            return TypedValue::ZERO;
        }
        if self.values.len() != 1 {
            tracing::error!(
                equation = %equation,
                depth = self.values.len(),
                "Malformed equation: stack does not hold exactly one value"
            );
            return TypedValue::ZERO;
        }
        self.values.pop().unwrap_or_default()
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::delta::DeltaKind;
    use crate::equation::MetricIndex;
    use tracing_test::traced_test;

    fn device(generation: Generation) -> Device {
        Device::new("test", generation)
            .with_global("EuCoresTotalCount", 8u32)
            .with_global("GpuTimestampFrequency", 1_000u64)
            .with_global("GtSliceMask", TypedValue::ByteArray(vec![0x3, 0, 0, 0, 0, 0, 0, 0]))
            .with_global("FloatGlobal", 1.5f32)
    }

    fn parse(source: &str, device: &Device) -> Equation {
        Equation::parse(source, device).unwrap()
    }

    fn report(words: &[u32]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    #[test]
    fn test_read_sums_dwords() {
        let dev = device(Generation::Tgl);
        let eval = Evaluator::for_device(&dev);
        let eq = parse("dw@0 dw@4 UADD", &dev);
        assert_eq!(eval.read(&eq, &report(&[3, 5])), TypedValue::U64(8));
    }

    #[test]
    fn test_read_bitfield() {
        let dev = device(Generation::Tgl);
        let eval = Evaluator::for_device(&dev);
        let eq = parse("bm@0,4,3", &dev);
        assert_eq!(eval.read(&eq, &report(&[0xffff_ff00 | 0b1011_0000])), TypedValue::U64(0b011));
        assert_eq!(eval.read(&eq, &report(&[0b0111_0000])), TypedValue::U64(0b111));
    }

    #[test]
    fn test_read_globals_and_float_math() {
        let dev = device(Generation::Tgl);
        let eval = Evaluator::for_device(&dev);
        let eq = parse("dw@0 1000000000 UMUL $GpuTimestampFrequency UDIV", &dev);
        assert_eq!(eval.read(&eq, &report(&[2_000])), TypedValue::U64(2_000_000_000));
        let eq = parse("dw@0 $FloatGlobal FMUL", &dev);
        assert_eq!(eval.read(&eq, &report(&[4])), TypedValue::F32(6.0));
    }

    #[test]
    fn test_read_is_deterministic() {
        let dev = device(Generation::Tgl);
        let eval = Evaluator::for_device(&dev);
        let eq = parse("qw@0 dw@8 USUB 3 UMUL", &dev);
        let raw = report(&[100, 0, 40]);
        let first = eval.read(&eq, &raw);
        let second = eval.read(&eq, &raw);
        assert_eq!(first, TypedValue::U64(180));
        assert_eq!(first, second);
    }

    #[test]
    #[traced_test]
    fn test_malformed_equation_yields_zero() {
        let dev = device(Generation::Tgl);
        let eval = Evaluator::for_device(&dev);
        let eq = parse("dw@0 dw@4", &dev);
        assert_eq!(eval.read(&eq, &report(&[1, 2])), TypedValue::ZERO);
        assert!(logs_contain("stack does not hold exactly one value"));

        let eq = parse("dw@0 UADD", &dev);
        assert_eq!(eval.read(&eq, &report(&[1])), TypedValue::ZERO);
        assert!(logs_contain("operator stack underflow"));
    }

    #[test]
    #[traced_test]
    fn test_out_of_range_read_is_reported() {
        let dev = device(Generation::Tgl);
        let eval = Evaluator::for_device(&dev);
        let eq = parse("dw@8 1 UADD", &dev);
        assert_eq!(eval.read(&eq, &report(&[1])), TypedValue::U64(1));
        assert!(logs_contain("Report field unreadable"));
    }

    #[test]
    fn test_read_with_delta_per_field() {
        let dev = device(Generation::Tgl);
        let eval = Evaluator::for_device(&dev);
        let eq = parse("dw@0 dw@4 UADD", &dev);
        let prev = report(&[4_294_967_290, 10]);
        let last = report(&[5, 25]);
        let value = eval.read_with_delta(&eq, DeltaFunction::n_bits(32), &last, &prev);
        assert_eq!(value, TypedValue::U64(11 + 15));
    }

    #[test]
    fn test_read_with_ns_time_uses_generation_width() {
        let eq_source = "qw@0";
        let prev = 0x1_0000_0010u64.to_le_bytes();
        let last = 0x0000_0020u64.to_le_bytes();
        let ns_time = DeltaFunction::of(DeltaKind::NsTime);

        let old = device(Generation::Adlp);
        let narrow = Evaluator::for_device(&old).read_with_delta(
            &parse(eq_source, &old),
            ns_time,
            &last,
            &prev,
        );
        let new = device(Generation::Ptl);
        let wide = Evaluator::for_device(&new).read_with_delta(
            &parse(eq_source, &new),
            ns_time,
            &last,
            &prev,
        );
        assert_eq!(narrow, TypedValue::U64(0x10));
        assert_eq!(wide, TypedValue::U64((1u64 << 56) + 0x20 - 0x1_0000_0010));
    }

    #[test]
    #[traced_test]
    fn test_unresolved_local_counter_classification() {
        let dev = device(Generation::Mtl);
        let eval = Evaluator::for_device(&dev);
        let eq = parse("$GtSlice0XeCore2 dw@0 UADD", &dev);
        assert_eq!(eval.read(&eq, &report(&[7])), TypedValue::U64(7));
        assert!(logs_contain("Unresolved symbol tolerated"));

        let old = device(Generation::Tgl);
        let eq = parse("$SomethingMissing dw@0 UADD", &old);
        assert_eq!(Evaluator::for_device(&old).read(&eq, &report(&[7])), TypedValue::U64(7));
        assert!(logs_contain("Unresolved symbol unexpected"));
    }

    #[test]
    fn test_unresolved_symbol_classifiers() {
        assert!(UnresolvedSymbol::in_read_equation("GtSlice1XeCore0", Generation::Acm).is_tolerated());
        assert!(!UnresolvedSymbol::in_read_equation("GtSlice1XeCore0", Generation::Tgl).is_tolerated());
        assert!(UnresolvedSymbol::in_availability_equation("GtL3Bank3").is_tolerated());
        assert!(!UnresolvedSymbol::in_availability_equation("GtXeCoreMask").is_tolerated());
        assert_eq!(
            UnresolvedSymbol::in_availability_equation("Foo"),
            UnresolvedSymbol::Unexpected("Foo".into())
        );
    }

    #[test]
    fn test_gpu_core_clocks_from_cache() {
        let dev = device(Generation::Tgl);
        let cache = EvalCache {
            gpu_core_clocks: 250,
            ..EvalCache::default()
        };
        let eq = parse("$GpuCoreClocks 2 UMUL", &dev);
        assert_eq!(Evaluator::new(&dev, cache).read(&eq, &[]), TypedValue::U64(500));
    }

    #[test]
    fn test_previous_context_id_symbol() {
        let dev = device(Generation::Tgl);
        let cache = EvalCache {
            context_id_prev: 0x42,
            ..EvalCache::default()
        };
        let eq = parse("i$PreviousContextId", &dev);
        assert_eq!(Evaluator::new(&dev, cache).read(&eq, &[]), TypedValue::U64(0x42));
    }

    #[test]
    fn test_normalize_symbols() {
        let dev = device(Generation::Tgl);
        let eval = Evaluator::for_device(&dev);
        let mut eq = parse("$Self $$Other prev$$Other UADD UADD $Counter UMUL", &dev);
        eq.resolve_metric_indices(|name| match name {
            "Other" => Some(0),
            "Counter" => Some(1),
            _ => None,
        });
        let deltas = [TypedValue::U64(100), TypedValue::U64(3), TypedValue::U64(1)];
        let outputs = [TypedValue::U64(10)];
        let previous = [TypedValue::U64(20)];
        let value = eval.normalize(
            &eq,
            NormalizationInputs {
                deltas: &deltas,
                outputs: &outputs,
                previous: &previous,
                index: 2,
            },
        );
        assert_eq!(value, TypedValue::U64((1 + 10 + 20) * 3));
    }

    #[test]
    fn test_normalize_ignores_reads_and_unresolved_is_zero() {
        let dev = device(Generation::Tgl);
        let eval = Evaluator::for_device(&dev);
        let eq = Equation::from_elements(
            "dw@0 $$Missing",
            vec![
                EquationElement::RdU32 { byte_offset: 0 },
                EquationElement::LocalMetricSymbol {
                    name: "Missing".into(),
                    index: MetricIndex::Unresolved,
                },
            ],
        );
        let deltas = [TypedValue::U64(5)];
        let inputs = NormalizationInputs {
            deltas: &deltas,
            outputs: &[],
            previous: &[],
            index: 0,
        };
        assert_eq!(eval.normalize(&eq, inputs), TypedValue::ZERO);
    }

    #[test]
    fn test_gpu_duration_macros() {
        let dev = device(Generation::Tgl);
        let cache = EvalCache {
            gpu_core_clocks: 400,
            eu_cores_count: 8,
            context_id_prev: 0,
        };
        let eval = Evaluator::new(&dev, cache);
        let deltas = [TypedValue::U64(100)];
        let inputs = NormalizationInputs {
            deltas: &deltas,
            outputs: &[],
            previous: &[],
            index: 0,
        };
        assert_eq!(
            eval.normalize(&parse("GpuDuration", &dev), inputs),
            TypedValue::F32(25.0)
        );
        assert_eq!(
            eval.normalize(&parse("EuAggrDuration", &dev), inputs),
            TypedValue::F32(100.0 * 100.0 / 3200.0)
        );
        let no_clock = Evaluator::for_device(&dev);
        assert_eq!(
            no_clock.normalize(&parse("GpuDuration", &dev), inputs),
            TypedValue::F32(0.0)
        );
    }

    #[test]
    fn test_solve_boolean() {
        let dev = device(Generation::Tgl);
        let eval = Evaluator::for_device(&dev);
        assert!(eval.solve_boolean(&parse("$EuCoresTotalCount 4 UGT", &dev)));
        assert!(!eval.solve_boolean(&parse("$EuCoresTotalCount 16 UGTE", &dev)));
        assert!(eval.solve_boolean(&parse("$GtSliceMask 2 AND", &dev)));
        assert!(!eval.solve_boolean(&parse("$GtSlice1XeCore0 1 AND", &dev)));
        assert!(eval.solve_boolean(&parse("$GtSlice1XeCore0 1 OR", &dev)));
    }

    #[test]
    #[traced_test]
    fn test_solve_boolean_rejects_disallowed_elements() {
        let dev = device(Generation::Tgl);
        let eval = Evaluator::for_device(&dev);
        assert!(!eval.solve_boolean(&parse("1.0 1 UADD", &dev)));
        assert!(!eval.solve_boolean(&parse("1 1 FADD", &dev)));
        assert!(!eval.solve_boolean(&parse("$UnknownThing", &dev)));
        assert!(!eval.solve_boolean(&parse("1 UADD", &dev)));
        assert!(!eval.solve_boolean(&Equation::from_elements("", Vec::new())));
        assert!(!eval.solve_boolean(&parse("$FloatGlobal", &dev)));
        assert!(logs_contain("global symbol type not usable"));
    }
}
