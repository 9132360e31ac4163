//! Delta engine: wraparound-aware difference between two counter samples

use crate::device::Generation;
use crate::error::{CalcError, Result};
use crate::typed_value::TypedValue;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeltaKind {
    #[default]
    Null,
    BoolOr,
    BoolXor,
    GetPrevious,
    GetLast,
    NBits,
    NsTime,
}

impl DeltaKind {
    pub(crate) fn to_raw(self) -> u32 {
        match self {
            Self::Null => 0,
            Self::BoolOr => 1,
            Self::BoolXor => 2,
            Self::GetPrevious => 3,
            Self::GetLast => 4,
            Self::NBits => 5,
            Self::NsTime => 6,
        }
    }

    pub(crate) fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            0 => Self::Null,
            1 => Self::BoolOr,
            2 => Self::BoolXor,
            3 => Self::GetPrevious,
            4 => Self::GetLast,
            5 => Self::NBits,
            6 => Self::NsTime,
            _ => return None,
        })
    }
}

/// Delta (overflow) function of a metric or information
///
/// Text form: `DELTA <bits>`, `NS_TIME`, `BOOL_OR`, `BOOL_XOR`,
/// `GET_PREVIOUS`, `GET_LAST`, or an empty string for the null function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DeltaFunction {
    pub kind: DeltaKind,
    pub bits: u32,
}

impl DeltaFunction {
    pub const NULL: DeltaFunction = DeltaFunction {
        kind: DeltaKind::Null,
        bits: 0,
    };

    pub fn n_bits(bits: u32) -> Self {
        Self {
            kind: DeltaKind::NBits,
            bits,
        }
    }

    pub fn of(kind: DeltaKind) -> Self {
        Self { kind, bits: 0 }
    }

    pub fn is_null(&self) -> bool {
        self.kind == DeltaKind::Null
    }
}

impl FromStr for DeltaFunction {
    type Err = CalcError;

    fn from_str(s: &str) -> Result<Self> {
        let text = s.trim();
        let function = match text {
            "" => Self::NULL,
            "NS_TIME" => Self::of(DeltaKind::NsTime),
            "BOOL_OR" => Self::of(DeltaKind::BoolOr),
            "BOOL_XOR" => Self::of(DeltaKind::BoolXor),
            "GET_PREVIOUS" => Self::of(DeltaKind::GetPrevious),
            "GET_LAST" => Self::of(DeltaKind::GetLast),
            _ => {
                let bits = text
                    .strip_prefix("DELTA")
                    .map(str::trim)
                    .and_then(|b| b.parse::<u32>().ok())
                    .ok_or_else(|| CalcError::parse(text, text))?;
                Self::n_bits(bits)
            },
        };
        Ok(function)
    }
}

impl fmt::Display for DeltaFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            DeltaKind::Null => Ok(()),
            DeltaKind::BoolOr => f.write_str("BOOL_OR"),
            DeltaKind::BoolXor => f.write_str("BOOL_XOR"),
            DeltaKind::GetPrevious => f.write_str("GET_PREVIOUS"),
            DeltaKind::GetLast => f.write_str("GET_LAST"),
            DeltaKind::NBits => write!(f, "DELTA {}", self.bits),
            DeltaKind::NsTime => f.write_str("NS_TIME"),
        }
    }
}

/// Rewrite NS_TIME into the N-bit function used when reading operands
pub fn resolve_read_delta(function: DeltaFunction, generation: Generation) -> DeltaFunction {
    match function.kind {
        DeltaKind::NsTime => DeltaFunction::n_bits(generation.ns_time_bits()),
        _ => function,
    }
}

/// Difference between `last` and `previous` under `function`
pub fn calculate_delta(
    function: DeltaFunction,
    generation: Generation,
    last: &TypedValue,
    previous: &TypedValue,
) -> TypedValue {
    match function.kind {
        DeltaKind::BoolOr => TypedValue::U64(u64::from((last.as_u64() | previous.as_u64()) != 0)),
        DeltaKind::BoolXor => {
            TypedValue::U64(u64::from((last.as_u64() ^ previous.as_u64()) != 0))
        },
        DeltaKind::GetLast => last.clone(),
        DeltaKind::GetPrevious => previous.clone(),
        DeltaKind::NsTime => TypedValue::U64(wrapping_delta(
            generation.ns_time_bits(),
            last.as_u64(),
            previous.as_u64(),
        )),
        DeltaKind::NBits => {
            TypedValue::U64(wrapping_delta(function.bits, last.as_u64(), previous.as_u64()))
        },
        DeltaKind::Null => TypedValue::U64(0),
    }
}

/// `last - previous` for a counter `bits` wide, assuming at most one wrap
fn wrapping_delta(bits: u32, last: u64, previous: u64) -> u64 {
    if bits > 64 {
        tracing::warn!(bits, "Delta width exceeds 64 bits");
        return 0;
    }
    if previous > last {
        if bits < 64 {
            (last | (1u64 << bits)).wrapping_sub(previous)
        } else {
            (u64::MAX - previous).wrapping_add(last)
        }
    } else {
        last - previous
    }
}
