//! Binary operators of the equation language
//!
//! Operands are named after their stack position: `prev` was pushed first,
//! `last` most recently. Integer operators work on `u64` with wrapping
//! arithmetic, float operators on `f32`.

use crate::typed_value::TypedValue;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    And,
    Or,
    Xor,
    Xnor,
    LogicalAnd,
    Equals,
    LeftShift,
    RightShift,
    UAdd,
    USub,
    UMul,
    UDiv,
    FAdd,
    FSub,
    FMul,
    FDiv,
    UGt,
    ULt,
    UGte,
    ULte,
    FGt,
    FLt,
    FGte,
    FLte,
    UMin,
    UMax,
    FMin,
    FMax,
}

impl Operation {
    pub const ALL: [Operation; 28] = [
        Self::And,
        Self::Or,
        Self::Xor,
        Self::Xnor,
        Self::LogicalAnd,
        Self::Equals,
        Self::LeftShift,
        Self::RightShift,
        Self::UAdd,
        Self::USub,
        Self::UMul,
        Self::UDiv,
        Self::FAdd,
        Self::FSub,
        Self::FMul,
        Self::FDiv,
        Self::UGt,
        Self::ULt,
        Self::UGte,
        Self::ULte,
        Self::FGt,
        Self::FLt,
        Self::FGte,
        Self::FLte,
        Self::UMin,
        Self::UMax,
        Self::FMin,
        Self::FMax,
    ];

    pub fn as_token(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
            Self::Xor => "XOR",
            Self::Xnor => "XNOR",
            Self::LogicalAnd => "&&",
            Self::Equals => "==",
            Self::LeftShift => "<<",
            Self::RightShift => ">>",
            Self::UAdd => "UADD",
            Self::USub => "USUB",
            Self::UMul => "UMUL",
            Self::UDiv => "UDIV",
            Self::FAdd => "FADD",
            Self::FSub => "FSUB",
            Self::FMul => "FMUL",
            Self::FDiv => "FDIV",
            Self::UGt => "UGT",
            Self::ULt => "ULT",
            Self::UGte => "UGTE",
            Self::ULte => "ULTE",
            Self::FGt => "FGT",
            Self::FLt => "FLT",
            Self::FGte => "FGTE",
            Self::FLte => "FLTE",
            Self::UMin => "UMIN",
            Self::UMax => "UMAX",
            Self::FMin => "FMIN",
            Self::FMax => "FMAX",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.as_token() == token)
    }

    /// Operators accepted by availability equations (unsigned integer domain only)
    pub fn is_availability_safe(self) -> bool {
        matches!(
            self,
            Self::And
                | Self::Or
                | Self::Xor
                | Self::Xnor
                | Self::Equals
                | Self::LogicalAnd
                | Self::LeftShift
                | Self::RightShift
                | Self::UAdd
                | Self::USub
                | Self::UDiv
                | Self::UMul
                | Self::UGt
                | Self::ULt
                | Self::UGte
                | Self::ULte
        )
    }

    /// Combine two plain `u64` operands the way availability equations do
    pub fn apply_u64(self, prev: u64, last: u64) -> u64 {
        match self.apply(&TypedValue::U64(prev), &TypedValue::U64(last)) {
            TypedValue::Bool(b) => u64::from(b),
            other => other.as_u64(),
        }
    }

    pub fn apply(self, prev: &TypedValue, last: &TypedValue) -> TypedValue {
        match self {
            Self::And => TypedValue::U64(prev.as_u64() & last.as_u64()),
            Self::Or => TypedValue::U64(prev.as_u64() | last.as_u64()),
            Self::Xor => TypedValue::U64(prev.as_u64() ^ last.as_u64()),
            Self::Xnor => TypedValue::U64(!(prev.as_u64() ^ last.as_u64())),
            Self::LogicalAnd => TypedValue::Bool(prev.as_u64() != 0 && last.as_u64() != 0),
            Self::Equals => TypedValue::Bool(prev.as_u64() == last.as_u64()),
            Self::LeftShift => TypedValue::U64(shift(prev.as_u64(), last.as_u64(), u64::checked_shl)),
            Self::RightShift => {
                TypedValue::U64(shift(prev.as_u64(), last.as_u64(), u64::checked_shr))
            },
            Self::UAdd => TypedValue::U64(prev.as_u64().wrapping_add(last.as_u64())),
            Self::USub => TypedValue::U64(prev.as_u64().wrapping_sub(last.as_u64())),
            Self::UMul => TypedValue::U64(prev.as_u64().wrapping_mul(last.as_u64())),
            Self::UDiv => {
                let divisor = last.as_u64();
                TypedValue::U64(if divisor != 0 {
                    prev.as_u64() / divisor
                } else {
                    0
                })
            },
            Self::FAdd => TypedValue::F32(prev.as_f32() + last.as_f32()),
            Self::FSub => TypedValue::F32(prev.as_f32() - last.as_f32()),
            Self::FMul => TypedValue::F32(prev.as_f32() * last.as_f32()),
            Self::FDiv => {
                let divisor = last.as_f32();
                TypedValue::F32(if divisor != 0.0 {
                    prev.as_f32() / divisor
                } else {
                    0.0
                })
            },
            Self::UGt => TypedValue::Bool(prev.as_u64() > last.as_u64()),
            Self::ULt => TypedValue::Bool(prev.as_u64() < last.as_u64()),
            Self::UGte => TypedValue::Bool(prev.as_u64() >= last.as_u64()),
            Self::ULte => TypedValue::Bool(prev.as_u64() <= last.as_u64()),
            Self::FGt => TypedValue::Bool(prev.as_f32() > last.as_f32()),
            Self::FLt => TypedValue::Bool(prev.as_f32() < last.as_f32()),
            Self::FGte => TypedValue::Bool(prev.as_f32() >= last.as_f32()),
            Self::FLte => TypedValue::Bool(prev.as_f32() <= last.as_f32()),
            Self::UMin => TypedValue::U64(prev.as_u64().min(last.as_u64())),
            Self::UMax => TypedValue::U64(prev.as_u64().max(last.as_u64())),
            Self::FMin => TypedValue::F32(prev.as_f32().min(last.as_f32())),
            Self::FMax => TypedValue::F32(prev.as_f32().max(last.as_f32())),
        }
    }
}

/// Shift amounts of 64 or more produce zero
fn shift(value: u64, amount: u64, op: fn(u64, u32) -> Option<u64>) -> u64 {
    u32::try_from(amount)
        .ok()
        .and_then(|amount| op(value, amount))
        .unwrap_or(0)
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}
