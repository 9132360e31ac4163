//! Metric entity

use crate::api_mask::ApiMask;
use crate::delta::DeltaFunction;
use crate::equation::Equation;
use crate::evaluator::Evaluator;
use crate::typed_value::ResultType;
use serde::{Deserialize, Serialize};

/// Semantic class of a metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Duration,
    #[default]
    Event,
    EventWithRange,
    Throughput,
    Timestamp,
    Flag,
    Ratio,
    Raw,
}

impl MetricType {
    pub(crate) fn to_raw(self) -> u32 {
        match self {
            Self::Duration => 0,
            Self::Event => 1,
            Self::EventWithRange => 2,
            Self::Throughput => 3,
            Self::Timestamp => 4,
            Self::Flag => 5,
            Self::Ratio => 6,
            Self::Raw => 7,
        }
    }

    pub(crate) fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            0 => Self::Duration,
            1 => Self::Event,
            2 => Self::EventWithRange,
            3 => Self::Throughput,
            4 => Self::Timestamp,
            5 => Self::Flag,
            6 => Self::Ratio,
            7 => Self::Raw,
            _ => return None,
        })
    }
}

/// One metric of a metric set
///
/// `position_id` is fixed when the metric is created; `id_in_set` follows
/// the metric's current position and changes when unavailable metrics are
/// filtered out.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub position_id: u32,
    pub id_in_set: u32,
    pub symbol_name: String,
    pub short_name: String,
    pub long_name: String,
    pub group: String,
    pub api_mask: ApiMask,
    pub metric_type: MetricType,
    pub result_type: ResultType,
    pub units: String,
    pub low_watermark: i64,
    pub high_watermark: i64,
    pub delta_function: DeltaFunction,
    pub availability: Option<Equation>,
    pub query_read: Option<Equation>,
    pub io_read: Option<Equation>,
    pub normalization: Option<Equation>,
    pub max_value: Option<Equation>,
}

impl Metric {
    pub fn new(symbol_name: impl Into<String>, result_type: ResultType) -> Self {
        let symbol_name = symbol_name.into();
        Self {
            position_id: 0,
            id_in_set: 0,
            short_name: symbol_name.clone(),
            symbol_name,
            long_name: String::new(),
            group: String::new(),
            api_mask: ApiMask::ALL,
            metric_type: MetricType::default(),
            result_type,
            units: String::new(),
            low_watermark: 0,
            high_watermark: 0,
            delta_function: DeltaFunction::NULL,
            availability: None,
            query_read: None,
            io_read: None,
            normalization: None,
            max_value: None,
        }
    }

    pub fn with_delta_function(mut self, delta_function: DeltaFunction) -> Self {
        self.delta_function = delta_function;
        self
    }

    pub fn with_io_read(mut self, equation: Equation) -> Self {
        self.io_read = Some(equation);
        self
    }

    pub fn with_query_read(mut self, equation: Equation) -> Self {
        self.query_read = Some(equation);
        self
    }

    pub fn with_normalization(mut self, equation: Equation) -> Self {
        self.normalization = Some(equation);
        self
    }

    pub fn with_max_value(mut self, equation: Equation) -> Self {
        self.max_value = Some(equation);
        self
    }

    pub fn with_availability(mut self, equation: Equation) -> Self {
        self.availability = Some(equation);
        self
    }

    /// A metric without an availability equation is always available
    pub fn is_available(&self, evaluator: &Evaluator<'_>) -> bool {
        match &self.availability {
            Some(equation) => evaluator.solve_boolean(equation),
            None => true,
        }
    }

    pub(crate) fn equations_mut(&mut self) -> impl Iterator<Item = &mut Equation> {
        [
            &mut self.availability,
            &mut self.query_read,
            &mut self.io_read,
            &mut self.normalization,
            &mut self.max_value,
        ]
        .into_iter()
        .filter_map(Option::as_mut)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::device::{Device, Generation};

    #[test]
    fn test_availability() {
        let device = Device::new("test", Generation::Tgl).with_global("EuCoresTotalCount", 8u32);
        let evaluator = Evaluator::for_device(&device);

        let always = Metric::new("GpuTime", ResultType::U64);
        assert!(always.is_available(&evaluator));

        let gated = Metric::new("EuActive", ResultType::Float)
            .with_availability(Equation::parse("$EuCoresTotalCount 16 UGTE", &device).unwrap());
        assert!(!gated.is_available(&evaluator));
    }

    #[test]
    fn test_metric_type_raw_values() {
        assert_eq!(MetricType::Duration.to_raw(), 0);
        assert_eq!(MetricType::from_raw(7), Some(MetricType::Raw));
        assert_eq!(MetricType::from_raw(8), None);
    }
}
