//! Tagged scalar values produced by equations
//!
//! Every arithmetic step coerces its operands explicitly through the
//! `as_*` helpers below; nothing relies on implicit numeric promotion.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single typed value flowing through the evaluator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypedValue {
    Bool(bool),
    U32(u32),
    U64(u64),
    F32(f32),
    ByteArray(Vec<u8>),
}

/// Discriminant of a [`TypedValue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Bool,
    U32,
    U64,
    F32,
    ByteArray,
}

/// Declared result type of a metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultType {
    U32,
    #[default]
    U64,
    #[serde(alias = "f32")]
    Float,
    Bool,
}

impl ResultType {
    pub fn kind(self) -> ValueKind {
        match self {
            Self::U32 => ValueKind::U32,
            Self::U64 => ValueKind::U64,
            Self::Float => ValueKind::F32,
            Self::Bool => ValueKind::Bool,
        }
    }

    pub(crate) fn to_raw(self) -> u32 {
        match self {
            Self::U32 => 0,
            Self::U64 => 1,
            Self::Bool => 2,
            Self::Float => 3,
        }
    }

    pub(crate) fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::U32),
            1 => Some(Self::U64),
            2 => Some(Self::Bool),
            3 => Some(Self::Float),
            _ => None,
        }
    }
}

impl Default for TypedValue {
    fn default() -> Self {
        Self::U64(0)
    }
}

impl TypedValue {
    pub const ZERO: TypedValue = TypedValue::U64(0);

    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Bool(_) => ValueKind::Bool,
            Self::U32(_) => ValueKind::U32,
            Self::U64(_) => ValueKind::U64,
            Self::F32(_) => ValueKind::F32,
            Self::ByteArray(_) => ValueKind::ByteArray,
        }
    }

    pub fn as_u32(&self) -> u32 {
        match *self {
            Self::Bool(b) => u32::from(b),
            Self::U32(v) => v,
            Self::U64(v) => v as u32,
            Self::F32(v) => v as u32,
            Self::ByteArray(_) => 0,
        }
    }

    pub fn as_u64(&self) -> u64 {
        match *self {
            Self::Bool(b) => u64::from(b),
            Self::U32(v) => u64::from(v),
            Self::U64(v) => v,
            Self::F32(v) => v as u64,
            Self::ByteArray(_) => 0,
        }
    }

    pub fn as_f32(&self) -> f32 {
        match *self {
            Self::Bool(b) => {
                if b {
                    1.0
                } else {
                    0.0
                }
            },
            Self::U32(v) => v as f32,
            Self::U64(v) => v as f32,
            Self::F32(v) => v,
            Self::ByteArray(_) => 0.0,
        }
    }

    pub fn as_bool(&self) -> bool {
        match *self {
            Self::Bool(b) => b,
            Self::U32(v) => v != 0,
            Self::U64(v) => v != 0,
            Self::F32(v) => v != 0.0,
            Self::ByteArray(_) => false,
        }
    }

    /// Cast to the declared result type, keeping the value untouched when it
    /// already has that type
    pub fn cast_to(self, result_type: ResultType) -> TypedValue {
        if self.kind() == result_type.kind() {
            return self;
        }
        match result_type {
            ResultType::U32 => Self::U32(self.as_u32()),
            ResultType::U64 => Self::U64(self.as_u64()),
            ResultType::Float => Self::F32(self.as_f32()),
            ResultType::Bool => Self::Bool(self.as_bool()),
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::U32(v) => write!(f, "{}", v),
            Self::U64(v) => write!(f, "{}", v),
            Self::F32(v) => write!(f, "{:.3}", v),
            Self::ByteArray(bytes) => {
                write!(f, "0x")?;
                for byte in bytes {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            },
        }
    }
}

impl From<bool> for TypedValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<u32> for TypedValue {
    fn from(value: u32) -> Self {
        Self::U32(value)
    }
}

impl From<u64> for TypedValue {
    fn from(value: u64) -> Self {
        Self::U64(value)
    }
}

impl From<f32> for TypedValue {
    fn from(value: f32) -> Self {
        Self::F32(value)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_coercions_truncate() {
        let wide = TypedValue::U64(0x1_0000_0005);
        assert_eq!(wide.as_u32(), 5);
        assert_eq!(wide.as_u64(), 0x1_0000_0005);
        assert_eq!(TypedValue::Bool(true).as_u64(), 1);
        assert_eq!(TypedValue::F32(3.9).as_u32(), 3);
    }

    #[test]
    fn test_float_to_integer_saturates() {
        assert_eq!(TypedValue::F32(-4.0).as_u64(), 0);
        assert_eq!(TypedValue::F32(f32::MAX).as_u32(), u32::MAX);
    }

    #[test]
    fn test_byte_array_coerces_to_zero() {
        let mask = TypedValue::ByteArray(vec![0xff, 0x01]);
        assert_eq!(mask.as_u64(), 0);
        assert_eq!(mask.as_f32(), 0.0);
        assert!(!mask.as_bool());
    }

    #[test]
    fn test_cast_to_keeps_matching_type() {
        let value = TypedValue::F32(12.5);
        assert_eq!(value.clone().cast_to(ResultType::Float), value);
        assert_eq!(value.clone().cast_to(ResultType::U64), TypedValue::U64(12));
        assert_eq!(value.cast_to(ResultType::Bool), TypedValue::Bool(true));
        assert_eq!(
            TypedValue::U64(0).cast_to(ResultType::Bool),
            TypedValue::Bool(false)
        );
    }

    #[test]
    fn test_serde_external_tagging() {
        let value: TypedValue = serde_json::from_str(r#"{"u32": 96}"#).unwrap();
        assert_eq!(value, TypedValue::U32(96));
        let json = serde_json::to_string(&TypedValue::Bool(true)).unwrap();
        assert_eq!(json, r#"{"bool":true}"#);
    }

    #[test]
    fn test_display() {
        assert_eq!(TypedValue::F32(1.5).to_string(), "1.500");
        assert_eq!(TypedValue::ByteArray(vec![0x0f, 0xa0]).to_string(), "0x0fa0");
    }
}
