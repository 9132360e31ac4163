//! Metrics device: GPU generation and device-global symbol table

use crate::error::CalcError;
use crate::typed_value::TypedValue;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// GPU hardware generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Generation {
    Gen9,
    Kbl,
    Cfl,
    Glk,
    Bxt,
    Icl,
    Ehl,
    Tgl,
    Rkl,
    Dg1,
    Adlp,
    Adls,
    Adln,
    Acm,
    Mtl,
    Arl,
    Pvc,
    Bmg,
    Lnl,
    Ptl,
}

impl Generation {
    pub const ALL: [Generation; 20] = [
        Self::Gen9,
        Self::Kbl,
        Self::Cfl,
        Self::Glk,
        Self::Bxt,
        Self::Icl,
        Self::Ehl,
        Self::Tgl,
        Self::Rkl,
        Self::Dg1,
        Self::Adlp,
        Self::Adls,
        Self::Adln,
        Self::Acm,
        Self::Mtl,
        Self::Arl,
        Self::Pvc,
        Self::Bmg,
        Self::Lnl,
        Self::Ptl,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gen9 => "gen9",
            Self::Kbl => "kbl",
            Self::Cfl => "cfl",
            Self::Glk => "glk",
            Self::Bxt => "bxt",
            Self::Icl => "icl",
            Self::Ehl => "ehl",
            Self::Tgl => "tgl",
            Self::Rkl => "rkl",
            Self::Dg1 => "dg1",
            Self::Adlp => "adlp",
            Self::Adls => "adls",
            Self::Adln => "adln",
            Self::Acm => "acm",
            Self::Mtl => "mtl",
            Self::Arl => "arl",
            Self::Pvc => "pvc",
            Self::Bmg => "bmg",
            Self::Lnl => "lnl",
            Self::Ptl => "ptl",
        }
    }

    /// Counter width used by NS_TIME delta functions
    pub fn ns_time_bits(self) -> u32 {
        match self {
            Self::Bmg | Self::Lnl | Self::Ptl => 56,
            _ => 32,
        }
    }

    /// Newer generations expose EU counts as `VectorEngineTotalCount`
    pub fn uses_vector_engine_naming(self) -> bool {
        matches!(
            self,
            Self::Mtl | Self::Arl | Self::Acm | Self::Pvc | Self::Bmg | Self::Lnl | Self::Ptl
        )
    }

    /// Generations whose `GtSlice*` topology symbols are not published as globals
    pub fn lacks_slice_globals(self) -> bool {
        matches!(self, Self::Acm | Self::Pvc | Self::Mtl | Self::Arl)
    }

    pub(crate) fn to_raw(self) -> u32 {
        Self::ALL.iter().position(|g| *g == self).unwrap_or(0) as u32
    }

    pub(crate) fn from_raw(raw: u32) -> Option<Self> {
        Self::ALL.get(raw as usize).copied()
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Generation {
    type Err = CalcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|g| g.as_str() == lower)
            .ok_or_else(|| CalcError::invalid_parameter(format!("unknown generation '{}'", s)))
    }
}

/// Metrics device handle
///
/// Supplies the generation and the `$name` global symbol lookup used while
/// parsing and evaluating equations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub name: String,
    pub generation: Generation,
    #[serde(default)]
    pub globals: FxHashMap<String, TypedValue>,
}

impl Device {
    pub fn new(name: impl Into<String>, generation: Generation) -> Self {
        Self {
            name: name.into(),
            generation,
            globals: FxHashMap::default(),
        }
    }

    pub fn with_global(mut self, name: impl Into<String>, value: impl Into<TypedValue>) -> Self {
        self.insert_global(name, value);
        self
    }

    pub fn insert_global(&mut self, name: impl Into<String>, value: impl Into<TypedValue>) {
        self.globals.insert(name.into(), value.into());
    }

    pub fn global(&self, name: &str) -> Option<&TypedValue> {
        self.globals.get(name)
    }

    pub fn has_global(&self, name: &str) -> bool {
        self.globals.contains_key(name)
    }

    /// Global names in sorted order
    pub fn global_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.globals.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_ns_time_bits_per_generation() {
        for generation in Generation::ALL {
            let expected = match generation {
                Generation::Bmg | Generation::Lnl | Generation::Ptl => 56,
                _ => 32,
            };
            assert_eq!(generation.ns_time_bits(), expected, "{}", generation);
        }
    }

    #[test]
    fn test_generation_round_trip() {
        for generation in Generation::ALL {
            assert_eq!(generation.as_str().parse::<Generation>().unwrap(), generation);
            assert_eq!(Generation::from_raw(generation.to_raw()), Some(generation));
        }
        assert_eq!("MTL".parse::<Generation>().unwrap(), Generation::Mtl);
        assert!("gen42".parse::<Generation>().is_err());
    }

    #[test]
    fn test_global_lookup() {
        let device = Device::new("test", Generation::Tgl)
            .with_global("EuCoresTotalCount", 96u32)
            .with_global("GpuTimestampFrequency", 19_200_000u64);
        assert_eq!(device.global("EuCoresTotalCount"), Some(&TypedValue::U32(96)));
        assert!(!device.has_global("VectorEngineTotalCount"));
        assert_eq!(
            device.global_names(),
            vec!["EuCoresTotalCount", "GpuTimestampFrequency"]
        );
    }
}
