//! Information entity: non-metric report fields (timestamps, context id, report reason)

use crate::api_mask::ApiMask;
use crate::delta::DeltaFunction;
use crate::equation::{Equation, EquationElement};
use crate::error::{CalcError, Result};
use crate::evaluator::Evaluator;
use serde::{Deserialize, Serialize};

/// Symbol of the query start timestamp, aggregatable for every API
pub const QUERY_BEGIN_TIME: &str = "QueryBeginTime";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InformationType {
    ReportReason,
    #[default]
    Value,
    Flag,
    Timestamp,
    ContextId,
    SamplePhase,
    GpuNode,
}

impl InformationType {
    pub(crate) fn to_raw(self) -> u32 {
        match self {
            Self::ReportReason => 0,
            Self::Value => 1,
            Self::Flag => 2,
            Self::Timestamp => 3,
            Self::ContextId => 4,
            Self::SamplePhase => 5,
            Self::GpuNode => 6,
        }
    }

    pub(crate) fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            0 => Self::ReportReason,
            1 => Self::Value,
            2 => Self::Flag,
            3 => Self::Timestamp,
            4 => Self::ContextId,
            5 => Self::SamplePhase,
            6 => Self::GpuNode,
            _ => return None,
        })
    }
}

/// Read equation of an information targeted by [`Information::set_value`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EquationType {
    IoRead,
    QueryRead,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Information {
    pub position_id: u32,
    pub id_in_set: u32,
    pub symbol_name: String,
    pub short_name: String,
    pub long_name: String,
    pub group: String,
    pub api_mask: ApiMask,
    pub info_type: InformationType,
    pub units: String,
    pub overflow_function: DeltaFunction,
    pub availability: Option<Equation>,
    pub io_read: Option<Equation>,
    pub query_read: Option<Equation>,
}

impl Information {
    pub fn new(symbol_name: impl Into<String>, info_type: InformationType) -> Self {
        let symbol_name = symbol_name.into();
        Self {
            position_id: 0,
            id_in_set: 0,
            short_name: symbol_name.clone(),
            symbol_name,
            long_name: String::new(),
            group: String::new(),
            api_mask: ApiMask::ALL,
            info_type,
            units: String::new(),
            overflow_function: DeltaFunction::NULL,
            availability: None,
            io_read: None,
            query_read: None,
        }
    }

    pub fn with_api_mask(mut self, api_mask: ApiMask) -> Self {
        self.api_mask = api_mask;
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

    pub fn with_availability(mut self, equation: Equation) -> Self {
        self.availability = Some(equation);
        self
    }

    pub fn is_available(&self, evaluator: &Evaluator<'_>) -> bool {
        match &self.availability {
            Some(equation) => evaluator.solve_boolean(equation),
            None => true,
        }
    }

    /// Information that can be summed across reports
    pub fn is_aggregatable(&self) -> bool {
        !self.api_mask.is_io_stream() || self.symbol_name == QUERY_BEGIN_TIME
    }

    /// Equation used when reading this information from a report of a set
    /// with the given api mask
    pub fn read_equation(&self, set_api_mask: ApiMask) -> Option<&Equation> {
        if set_api_mask.is_io_stream() {
            self.io_read.as_ref()
        } else {
            self.query_read.as_ref()
        }
    }

    /// Replace the constant of a single-immediate read equation
    ///
    /// Used for values supplied by the driver rather than the hardware,
    /// such as the timestamp frequency. Only the equation selected by
    /// `equation_type` is touched.
    pub fn set_value(&mut self, value: u64, equation_type: EquationType) -> Result<()> {
        let equation = match equation_type {
            EquationType::IoRead => &mut self.io_read,
            EquationType::QueryRead => &mut self.query_read,
        };
        match equation {
            Some(equation) if equation.is_single_immediate() => {
                *equation = Equation::from_elements(
                    value.to_string(),
                    vec![EquationElement::ImmU64(value)],
                );
                Ok(())
            },
            _ => Err(CalcError::invalid_parameter(format!(
                "information '{}' has no constant {:?} equation",
                self.symbol_name, equation_type
            ))),
        }
    }

    pub(crate) fn equations_mut(&mut self) -> impl Iterator<Item = &mut Equation> {
        [
            &mut self.availability,
            &mut self.io_read,
            &mut self.query_read,
        ]
        .into_iter()
        .filter_map(Option::as_mut)
    }
}
