//! Error types for perfmon-calc

use thiserror::Error;

/// Calculation errors
///
/// Evaluation problems inside a single equation never surface here; they are
/// logged and folded into a zero value so a batch always completes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CalcError {
    #[error("Empty equation")]
    EmptyEquation,

    #[error("Parse error: unrecognized token '{token}' in equation '{equation}'")]
    Parse { equation: String, token: String },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Report read out of range: offset {offset} + {width} exceeds {len} bytes")]
    ReportRange {
        offset: usize,
        width: usize,
        len: usize,
    },

    #[error("Invalid bitfield: bit offset {bit_offset}, bit count {bit_count}")]
    InvalidBitfield { bit_offset: u32, bit_count: u32 },

    #[error("Size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("Buffer too small: need {needed} bytes at offset {offset}, {available} available")]
    BufferTooSmall {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Persistence error: {0}")]
    Persist(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl CalcError {
    pub fn parse(equation: impl Into<String>, token: impl Into<String>) -> Self {
        Self::Parse {
            equation: equation.into(),
            token: token.into(),
        }
    }

    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    pub fn persist(msg: impl Into<String>) -> Self {
        Self::Persist(msg.into())
    }

    pub fn catalog(msg: impl Into<String>) -> Self {
        Self::Catalog(msg.into())
    }

    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound(name.into())
    }

    /// True for failures caused by the caller's arguments rather than catalog data
    pub fn is_invalid_parameter(&self) -> bool {
        matches!(self, Self::InvalidParameter(_) | Self::SizeMismatch { .. })
    }
}

pub type Result<T> = std::result::Result<T, CalcError>;
