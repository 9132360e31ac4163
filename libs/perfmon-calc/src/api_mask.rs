//! API mask bits shared by metric sets, metrics and informations

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;

/// Bit mask of the measurement APIs an entity applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiMask(pub u32);

impl ApiMask {
    pub const IOSTREAM: ApiMask = ApiMask(0x0000_0001);
    pub const DX9: ApiMask = ApiMask(0x0000_0002);
    pub const DX10: ApiMask = ApiMask(0x0000_0004);
    pub const DX11: ApiMask = ApiMask(0x0000_0008);
    pub const OGL: ApiMask = ApiMask(0x0000_0010);
    pub const OGL4_X: ApiMask = ApiMask(0x0000_0020);
    pub const OCL: ApiMask = ApiMask(0x0000_0040);
    pub const MEDIA: ApiMask = ApiMask(0x0000_0080);
    pub const DX12: ApiMask = ApiMask(0x0000_0100);
    pub const BBSTREAM: ApiMask = ApiMask(0x0000_0200);
    pub const VULKAN: ApiMask = ApiMask(0x0000_0400);
    pub const ALL: ApiMask = ApiMask(0xffff_ffff);

    const NAMES: [(ApiMask, &'static str); 11] = [
        (Self::IOSTREAM, "IOSTREAM"),
        (Self::DX9, "DX9"),
        (Self::DX10, "DX10"),
        (Self::DX11, "DX11"),
        (Self::OGL, "OGL"),
        (Self::OGL4_X, "OGL4_X"),
        (Self::OCL, "OCL"),
        (Self::MEDIA, "MEDIA"),
        (Self::DX12, "DX12"),
        (Self::BBSTREAM, "BBSTREAM"),
        (Self::VULKAN, "VULKAN"),
    ];

    pub fn bits(self) -> u32 {
        self.0
    }

    /// True when every bit of `other` is set
    pub fn contains(self, other: ApiMask) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: ApiMask) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_io_stream(self) -> bool {
        self.contains(Self::IOSTREAM)
    }
}

impl BitOr for ApiMask {
    type Output = ApiMask;

    fn bitor(self, rhs: ApiMask) -> ApiMask {
        ApiMask(self.0 | rhs.0)
    }
}

impl fmt::Display for ApiMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::ALL {
            return f.write_str("ALL");
        }
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(bit, _)| self.contains(*bit))
            .map(|(_, name)| *name)
            .collect();
        if names.is_empty() {
            write!(f, "{:#x}", self.0)
        } else {
            f.write_str(&names.join("|"))
        }
    }
}
