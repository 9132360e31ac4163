//! Equation model
//!
//! An [`Equation`] is an immutable, reverse-Polish sequence of
//! [`EquationElement`]s together with the source string it was parsed from.
//! Parsing lives in [`crate::parser`]; evaluation in [`crate::evaluator`].

use crate::device::Device;
use crate::error::Result;
use crate::operation::Operation;
use std::fmt;

/// One element of an equation
#[derive(Debug, Clone, PartialEq)]
pub enum EquationElement {
    /// `bm@O,B,C`: `bit_count` bits at `bit_offset` of the dword at `byte_offset`
    RdBitfield {
        byte_offset: u32,
        bit_offset: u32,
        bit_count: u32,
    },
    /// `rd8@O`
    RdU8 { byte_offset: u32 },
    /// `rd16@O`
    RdU16 { byte_offset: u32 },
    /// `dw@O`
    RdU32 { byte_offset: u32 },
    /// `qw@O`
    RdU64 { byte_offset: u32 },
    /// `fl@O`
    RdFloat { byte_offset: u32 },
    /// `rd40@O,E`: low dword at `byte_offset`, high byte at `ext_byte_offset`
    Rd40 {
        byte_offset: u32,
        ext_byte_offset: u32,
    },
    ImmU64(u64),
    ImmF32(f32),
    /// `mask$...`
    Mask(Box<[u8]>),
    /// `$name` present in the device global table
    GlobalSymbol(String),
    /// `$name` not published by the device, e.g. unpacked topology masks
    LocalCounterSymbol { name: String, index: MetricIndex },
    /// `$$name`: already normalized value of another metric in this report
    LocalMetricSymbol { name: String, index: MetricIndex },
    /// `prev$$name`: normalized value of a metric in the previous report
    PrevMetricSymbol { name: String, index: MetricIndex },
    /// `i$name`
    InformationSymbol(String),
    /// `$Self`
    SelfCounterValue,
    Operation(Operation),
    /// `GpuDuration`
    StdNormGpuDuration,
    /// `EuAggrDuration`
    StdNormEuAggrDuration,
}

impl EquationElement {
    pub fn is_read(&self) -> bool {
        matches!(
            self,
            Self::RdBitfield { .. }
                | Self::RdU8 { .. }
                | Self::RdU16 { .. }
                | Self::RdU32 { .. }
                | Self::RdU64 { .. }
                | Self::RdFloat { .. }
                | Self::Rd40 { .. }
        )
    }

    /// Symbol name for elements that reference metrics of the owning set
    pub fn metric_reference(&self) -> Option<&str> {
        match self {
            Self::LocalCounterSymbol { name, .. }
            | Self::LocalMetricSymbol { name, .. }
            | Self::PrevMetricSymbol { name, .. } => Some(name),
            _ => None,
        }
    }

    fn metric_index_mut(&mut self) -> Option<(&str, &mut MetricIndex)> {
        match self {
            Self::LocalCounterSymbol { name, index }
            | Self::LocalMetricSymbol { name, index }
            | Self::PrevMetricSymbol { name, index } => Some((name.as_str(), index)),
            _ => None,
        }
    }
}

/// Position of a referenced metric inside its metric set
///
/// Bound once when the owning set is built. An unresolved reference stays
/// `Unresolved` and evaluates to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetricIndex {
    #[default]
    Unresolved,
    Resolved(usize),
}

impl MetricIndex {
    pub fn get(self) -> Option<usize> {
        match self {
            Self::Resolved(i) => Some(i),
            Self::Unresolved => None,
        }
    }
}

impl From<Option<usize>> for MetricIndex {
    fn from(value: Option<usize>) -> Self {
        value.map_or(Self::Unresolved, Self::Resolved)
    }
}

/// A parsed equation
#[derive(Debug, Clone, PartialEq)]
pub struct Equation {
    source: String,
    elements: Vec<EquationElement>,
}

impl Equation {
    /// Parse `source` against the device global-symbol table and generation
    pub fn parse(source: &str, device: &Device) -> Result<Self> {
        crate::parser::parse_equation(source, device)
    }

    /// Build an equation from already constructed elements
    pub fn from_elements(source: impl Into<String>, elements: Vec<EquationElement>) -> Self {
        Self {
            source: source.into(),
            elements,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn elements(&self) -> &[EquationElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// True when the equation is one unsigned immediate
    pub fn is_single_immediate(&self) -> bool {
        matches!(self.elements.as_slice(), [EquationElement::ImmU64(_)])
    }

    /// Bind metric references using `lookup(name) -> position`
    pub(crate) fn resolve_metric_indices<F>(&mut self, mut lookup: F)
    where
        F: FnMut(&str) -> Option<usize>,
    {
        for element in &mut self.elements {
            if let Some((name, index)) = element.metric_index_mut() {
                *index = lookup(name).into();
            }
        }
    }

    /// Names of metric references that did not resolve
    pub fn unresolved_references(&self) -> Vec<&str> {
        self.elements
            .iter()
            .filter_map(|e| match e {
                EquationElement::LocalMetricSymbol { name, index }
                | EquationElement::PrevMetricSymbol { name, index }
                    if *index == MetricIndex::Unresolved =>
                {
                    Some(name.as_str())
                },
                _ => None,
            })
            .collect()
    }
}

impl fmt::Display for Equation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_metric_indices() {
        let mut equation = Equation::from_elements(
            "$$GpuTime prev$$Missing UADD",
            vec![
                EquationElement::LocalMetricSymbol {
                    name: "GpuTime".into(),
                    index: MetricIndex::Unresolved,
                },
                EquationElement::PrevMetricSymbol {
                    name: "Missing".into(),
                    index: MetricIndex::Unresolved,
                },
                EquationElement::Operation(Operation::UAdd),
            ],
        );
        equation.resolve_metric_indices(|name| (name == "GpuTime").then_some(3));

        assert_eq!(
            equation.elements()[0],
            EquationElement::LocalMetricSymbol {
                name: "GpuTime".into(),
                index: MetricIndex::Resolved(3),
            }
        );
        assert_eq!(equation.unresolved_references(), vec!["Missing"]);
    }

    #[test]
    fn test_single_immediate() {
        let imm = Equation::from_elements("5", vec![EquationElement::ImmU64(5)]);
        assert!(imm.is_single_immediate());
        let sum = Equation::from_elements(
            "5 5 UADD",
            vec![
                EquationElement::ImmU64(5),
                EquationElement::ImmU64(5),
                EquationElement::Operation(Operation::UAdd),
            ],
        );
        assert!(!sum.is_single_immediate());
        assert_eq!(sum.to_string(), "5 5 UADD");
    }
}
