//! Load flags for `IccProfile::load_*`, mirroring the optional-work bits
//! `cd_icc_load`'s `CdIccLoadFlags` exposes (metadata, named colors,
//! primaries, characterization data, MD5 fallback).

use std::ops::BitOr;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub struct LoadFlags(u32);

impl LoadFlags {
    pub const NONE: Self = Self(0);
    /// Read the `meta` dictionary tag.
    pub const METADATA: Self = Self(1 << 0);
    /// Read the `ncl2` named-color tag.
    pub const NAMED_COLORS: Self = Self(1 << 1);
    /// Load primaries + whitepoint + CCT.
    pub const PRIMARIES: Self = Self(1 << 2);
    /// Read the `targ` characterization-data tag.
    pub const CHARACTERIZATION: Self = Self(1 << 3);
    /// When the header's Profile ID is zero, fall back to an MD5 of the
    /// loaded byte image.
    pub const FALLBACK_MD5: Self = Self(1 << 4);

    /// Every optional load step enabled; the common case for a
    /// fully-populated in-memory model.
    pub const ALL: Self =
        Self(Self::METADATA.0 | Self::NAMED_COLORS.0 | Self::PRIMARIES.0 | Self::CHARACTERIZATION.0 | Self::FALLBACK_MD5.0);

    #[must_use]
    pub fn contains(self, flag: Self) -> bool {
        (self.0 & flag.0) == flag.0
    }
}

impl BitOr for LoadFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}
