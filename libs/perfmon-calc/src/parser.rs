//! Equation string parser
//!
//! Equations are space-separated reverse-Polish tokens:
//!
//! | Token | Element |
//! |-------|---------|
//! | `dw@O` `qw@O` `fl@O` `rd8@O` `rd16@O` | little-endian read at byte offset `O` |
//! | `rd40@O,E` | 40-bit counter, low dword at `O`, high byte at `E` |
//! | `bm@O,B,C` | `C` bits at bit `B` of the dword at `O` |
//! | `$Self` | the equation's own delta value |
//! | `$$name` / `prev$$name` | normalized metric of this / the previous report |
//! | `$name` | device global, or local counter when the device lacks it |
//! | `i$name` | information symbol |
//! | `1.5` / `0x1f` / `42` | float / hex / decimal immediate |
//! | `mask$0x...` | byte-array mask |
//! | `UADD` `FDIV` `==` ... | operators |
//! | `GpuDuration` `EuAggrDuration` | normalization macros |
//! | `GpuDurationSlice` `EuAggrDurationSlice` | expanded in place |
//!
//! Offsets accept decimal, `0x` hex and leading-zero octal; the bit count of
//! `bm@` is always decimal.

use crate::device::Device;
use crate::equation::{Equation, EquationElement, MetricIndex};
use crate::error::{CalcError, Result};
use crate::operation::Operation;

/// Parse a complete equation string
pub fn parse_equation(source: &str, device: &Device) -> Result<Equation> {
    if source.trim().is_empty() {
        return Err(CalcError::EmptyEquation);
    }
    let mut elements = Vec::new();
    parse_into(source, source, device, &mut elements)?;
    tracing::trace!(equation = source, elements = elements.len(), "Equation parsed");
    Ok(Equation::from_elements(source, elements))
}

fn parse_into(
    root: &str,
    source: &str,
    device: &Device,
    elements: &mut Vec<EquationElement>,
) -> Result<()> {
    for token in source.split(' ').filter(|t| !t.is_empty()) {
        match token {
            "EuAggrDurationSlice" => {
                let expanded = eu_aggr_duration_slice(device);
                parse_into(root, &expanded, device, elements)?;
            },
            "GpuDurationSlice" => {
                parse_into(root, GPU_DURATION_SLICE, device, elements)?;
            },
            _ => {
                let element = parse_token(token, device).ok_or_else(|| {
                    tracing::error!(equation = root, token, "Unknown equation element");
                    CalcError::parse(root, token)
                })?;
                elements.push(element);
            },
        }
    }
    Ok(())
}

const GPU_DURATION_SLICE: &str = "$Self $GpuSliceClocksCount FDIV 100 FMUL";

fn eu_aggr_duration_slice(device: &Device) -> String {
    let eu_count = if device.generation.uses_vector_engine_naming() {
        "VectorEngineTotalCount"
    } else {
        "EuCoresTotalCount"
    };
    format!(
        "$Self $GpuSliceClocksCount ${} UMUL FDIV 100 FMUL",
        eu_count
    )
}

fn parse_token(token: &str, device: &Device) -> Option<EquationElement> {
    match token {
        "EuAggrDuration" => return Some(EquationElement::StdNormEuAggrDuration),
        "GpuDuration" => return Some(EquationElement::StdNormGpuDuration),
        "$Self" => return Some(EquationElement::SelfCounterValue),
        _ => {},
    }
    if let Some(op) = Operation::from_token(token) {
        return Some(EquationElement::Operation(op));
    }

    if let Some(rest) = token.strip_prefix("dw@") {
        return single_offset(rest).map(|byte_offset| EquationElement::RdU32 { byte_offset });
    }
    if let Some(rest) = token.strip_prefix("fl@") {
        return single_offset(rest).map(|byte_offset| EquationElement::RdFloat { byte_offset });
    }
    if let Some(rest) = token.strip_prefix("qw@") {
        return single_offset(rest).map(|byte_offset| EquationElement::RdU64 { byte_offset });
    }
    if let Some(rest) = token.strip_prefix("rd8@") {
        return single_offset(rest).map(|byte_offset| EquationElement::RdU8 { byte_offset });
    }
    if let Some(rest) = token.strip_prefix("rd16@") {
        return single_offset(rest).map(|byte_offset| EquationElement::RdU16 { byte_offset });
    }
    if let Some(rest) = token.strip_prefix("rd40@") {
        let (byte_offset, rest) = offset_prefix(rest, true)?;
        let (ext_byte_offset, rest) = offset_prefix(skip_separator(rest)?, true)?;
        return rest.is_empty().then_some(EquationElement::Rd40 {
            byte_offset,
            ext_byte_offset,
        });
    }
    if let Some(rest) = token.strip_prefix("bm@") {
        let (byte_offset, rest) = offset_prefix(rest, true)?;
        let (bit_offset, rest) = offset_prefix(skip_separator(rest)?, true)?;
        let (bit_count, rest) = offset_prefix(skip_separator(rest)?, false)?;
        if !rest.is_empty() {
            return None;
        }
        return Some(EquationElement::RdBitfield {
            byte_offset,
            bit_offset,
            bit_count,
        });
    }

    if let Some(name) = token.strip_prefix("$$") {
        return non_empty(name).map(|name| EquationElement::LocalMetricSymbol {
            name,
            index: MetricIndex::Unresolved,
        });
    }
    if let Some(name) = token.strip_prefix("prev$$") {
        return non_empty(name).map(|name| EquationElement::PrevMetricSymbol {
            name,
            index: MetricIndex::Unresolved,
        });
    }
    if let Some(name) = token.strip_prefix('$') {
        let name = non_empty(name)?;
        let name = if is_legacy_mask_symbol(&name) {
            format!("Gt{}", name)
        } else {
            name
        };
        return Some(if device.has_global(&name) {
            EquationElement::GlobalSymbol(name)
        } else {
            EquationElement::LocalCounterSymbol {
                name,
                index: MetricIndex::Unresolved,
            }
        });
    }
    if let Some(name) = token.strip_prefix("i$") {
        return non_empty(name).map(EquationElement::InformationSymbol);
    }

    if token.contains('.') {
        return token.parse::<f32>().ok().map(EquationElement::ImmF32);
    }
    if let Some(hex) = token.strip_prefix("0x") {
        return u64::from_str_radix(hex, 16).ok().map(EquationElement::ImmU64);
    }
    if token.starts_with(|c: char| c.is_ascii_digit()) {
        return token.parse::<u64>().ok().map(EquationElement::ImmU64);
    }
    if let Some(mask) = token.strip_prefix("mask$") {
        return parse_mask(mask).map(EquationElement::Mask);
    }

    None
}

/// Legacy global mask names lack the `Gt` prefix, e.g. `SliceMask`
pub fn is_legacy_mask_symbol(name: &str) -> bool {
    name.ends_with("Mask") && !name.starts_with("Gt")
}

fn non_empty(name: &str) -> Option<String> {
    (!name.is_empty()).then(|| name.to_string())
}

fn single_offset(text: &str) -> Option<u32> {
    match offset_prefix(text, true)? {
        (value, "") => Some(value),
        _ => None,
    }
}

/// Skip exactly one separator character between numeric sub-fields
fn skip_separator(text: &str) -> Option<&str> {
    let mut chars = text.chars();
    chars.next()?;
    Some(chars.as_str())
}

/// Parse a leading unsigned number, returning it with the unparsed remainder
///
/// With `auto_radix`, `0x` selects hex and a leading `0` followed by more
/// digits selects octal.
fn offset_prefix(text: &str, auto_radix: bool) -> Option<(u32, &str)> {
    let (radix, body) = if !auto_radix {
        (10, text)
    } else if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        (16, hex)
    } else if text.len() > 1
        && text.starts_with('0')
        && text[1..].starts_with(|c: char| c.is_ascii_digit())
    {
        (8, &text[1..])
    } else {
        (10, text)
    };
    let end = body
        .find(|c: char| !c.is_digit(radix))
        .unwrap_or(body.len());
    if end == 0 {
        return None;
    }
    let value = u32::from_str_radix(&body[..end], radix).ok()?;
    Some((value, &body[end..]))
}

/// Hex digits (optional `0x`) read as one big number, stored lowest byte first
fn parse_mask(text: &str) -> Option<Box<[u8]>> {
    let digits = text.strip_prefix("0x").unwrap_or(text);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let bytes: Option<Vec<u8>> = digits
        .as_bytes()
        .rchunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|s| u8::from_str_radix(s, 16).ok())
        })
        .collect();
    bytes.map(Vec::into_boxed_slice)
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::device::Generation;
    use crate::equation::EquationElement as E;

    fn device(generation: Generation) -> Device {
        Device::new("test", generation)
            .with_global("EuCoresTotalCount", 96u32)
            .with_global("GpuSliceClocksCount", 1u32)
            .with_global("GtSliceMask", 0x1u64)
            .with_global("GpuTimestampFrequency", 19_200_000u64)
    }

    fn parse(source: &str) -> Vec<EquationElement> {
        parse_equation(source, &device(Generation::Tgl))
            .unwrap()
            .elements()
            .to_vec()
    }

    #[test]
    fn test_read_tokens() {
        assert_eq!(
            parse("dw@0x10 qw@8 rd8@3 rd16@010 fl@0x20"),
            vec![
                E::RdU32 { byte_offset: 0x10 },
                E::RdU64 { byte_offset: 8 },
                E::RdU8 { byte_offset: 3 },
                E::RdU16 { byte_offset: 8 },
                E::RdFloat { byte_offset: 0x20 },
            ]
        );
    }

    #[test]
    fn test_compound_read_tokens() {
        assert_eq!(
            parse("rd40@0x14,0xa8 bm@0,4,3 bm@0x8:0x1:10"),
            vec![
                E::Rd40 {
                    byte_offset: 0x14,
                    ext_byte_offset: 0xa8
                },
                E::RdBitfield {
                    byte_offset: 0,
                    bit_offset: 4,
                    bit_count: 3
                },
                E::RdBitfield {
                    byte_offset: 8,
                    bit_offset: 1,
                    bit_count: 10
                },
            ]
        );
    }

    #[test]
    fn test_bitfield_range_checked_on_read_not_parse() {
        let equation = parse_equation("bm@0,30,4", &device(Generation::Tgl)).unwrap();
        assert_eq!(
            equation.elements(),
            &[EquationElement::RdBitfield {
                byte_offset: 0,
                bit_offset: 30,
                bit_count: 4
            }]
        );
        assert!(parse_equation("bm@0,30,4x", &device(Generation::Tgl)).is_err());
    }

    #[test]
    fn test_symbol_tokens() {
        assert_eq!(
            parse("$Self $$GpuTime prev$$GpuTime i$PreviousContextId $EuCoresTotalCount $GtSlice0XeCore1"),
            vec![
                E::SelfCounterValue,
                E::LocalMetricSymbol {
                    name: "GpuTime".into(),
                    index: MetricIndex::Unresolved
                },
                E::PrevMetricSymbol {
                    name: "GpuTime".into(),
                    index: MetricIndex::Unresolved
                },
                E::InformationSymbol("PreviousContextId".into()),
                E::GlobalSymbol("EuCoresTotalCount".into()),
                E::LocalCounterSymbol {
                    name: "GtSlice0XeCore1".into(),
                    index: MetricIndex::Unresolved
                },
            ]
        );
    }

    #[test]
    fn test_legacy_mask_symbol_gets_gt_prefix() {
        assert_eq!(parse("$SliceMask"), vec![E::GlobalSymbol("GtSliceMask".into())]);
        assert!(is_legacy_mask_symbol("SubsliceMask"));
        assert!(!is_legacy_mask_symbol("GtSubsliceMask"));
        assert!(!is_legacy_mask_symbol("SliceCount"));
    }

    #[test]
    fn test_numeric_tokens() {
        assert_eq!(
            parse("1000000000 0xff 100.0"),
            vec![E::ImmU64(1_000_000_000), E::ImmU64(0xff), E::ImmF32(100.0)]
        );
    }

    #[test]
    fn test_mask_token() {
        assert_eq!(
            parse("mask$0x0102ff"),
            vec![E::Mask(vec![0xff, 0x02, 0x01].into_boxed_slice())]
        );
        assert_eq!(parse("mask$f0f"), vec![E::Mask(vec![0x0f, 0x0f].into_boxed_slice())]);
    }

    #[test]
    fn test_operators_and_macros() {
        assert_eq!(
            parse("GpuDuration"),
            vec![E::StdNormGpuDuration]
        );
        assert_eq!(
            parse("dw@0 dw@4 UADD 2 >>"),
            vec![
                E::RdU32 { byte_offset: 0 },
                E::RdU32 { byte_offset: 4 },
                E::Operation(Operation::UAdd),
                E::ImmU64(2),
                E::Operation(Operation::RightShift),
            ]
        );
    }

    #[test]
    fn test_slice_macros_expand_by_generation() {
        let old = parse_equation("EuAggrDurationSlice", &device(Generation::Tgl)).unwrap();
        assert_eq!(old.source(), "EuAggrDurationSlice");
        assert_eq!(old.len(), 7);
        assert_eq!(old.elements()[2], E::GlobalSymbol("EuCoresTotalCount".into()));

        let new = parse_equation("EuAggrDurationSlice", &device(Generation::Mtl)).unwrap();
        assert_eq!(
            new.elements()[2],
            E::LocalCounterSymbol {
                name: "VectorEngineTotalCount".into(),
                index: MetricIndex::Unresolved
            }
        );

        let gpu = parse_equation("GpuDurationSlice", &device(Generation::Tgl)).unwrap();
        assert_eq!(gpu.len(), 5);
        assert_eq!(gpu.elements()[4], E::Operation(Operation::FMul));
    }

    #[test]
    fn test_unknown_token_fails_whole_equation() {
        let err = parse_equation("dw@0 FOO UADD", &device(Generation::Tgl)).unwrap_err();
        assert_eq!(err, CalcError::parse("dw@0 FOO UADD", "FOO"));
        assert!(parse_equation("dw@zz", &device(Generation::Tgl)).is_err());
        assert!(parse_equation("$", &device(Generation::Tgl)).is_err());
        assert!(parse_equation("1.2.3", &device(Generation::Tgl)).is_err());
    }

    #[test]
    fn test_empty_equation() {
        assert_eq!(
            parse_equation("", &device(Generation::Tgl)),
            Err(CalcError::EmptyEquation)
        );
        assert_eq!(
            parse_equation("   ", &device(Generation::Tgl)),
            Err(CalcError::EmptyEquation)
        );
    }

    #[test]
    fn test_repeated_spaces_are_skipped() {
        assert_eq!(parse("5  6   UMUL").len(), 3);
    }
}
