//! PostGIS version probe.
//!
//! The installed PostGIS version is probed once at startup (the caller runs
//! `SELECT postgis_lib_version()` or similar and hands us the string) and
//! classified into one of three families that drive everything
//! version-dependent in this crate: the unknown-SRID sentinel pair and the
//! function vocabulary of the catalog.

use crate::columns::SpatialType;
use crate::error::{Result, SpatialError};

/// The three PostGIS eras this crate distinguishes.
///
/// Function renames happened at 2.0 (`length3d` → `3dlength` and friends)
/// and again at 2.2 (`distance_sphere` → `distancesphere`, spheroid length
/// variants collapsed into `lengthspheroid`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum VersionFamily {
    /// PostGIS < 2.0.
    Legacy,
    /// PostGIS >= 2.0, < 2.2.
    V2_0,
    /// PostGIS >= 2.2.
    V2_2,
}

/// Parsed PostGIS library version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostgisVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl PostgisVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a version string as returned by `postgis_lib_version()`
    /// (`"2.2.1"`) or the leading segment of `postgis_full_version()`
    /// (`POSTGIS="2.2.1 r14555" ...`).
    pub fn parse(raw: &str) -> Result<Self> {
        let bad = || SpatialError::UnsupportedVersion(raw.to_owned());

        let mut s = raw.trim();
        if let Some(rest) = s.strip_prefix("POSTGIS=") {
            s = rest.trim_start_matches('"');
        }
        // Stop at the first character that can't be part of `major.minor.patch`.
        let end = s
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(s.len());
        let numeric = &s[..end];
        if numeric.is_empty() {
            return Err(bad());
        }

        let mut parts = numeric.split('.');
        let major = parts.next().and_then(|p| p.parse().ok()).ok_or_else(bad)?;
        let minor = parts
            .next()
            .map(|p| p.parse().map_err(|_| bad()))
            .transpose()?
            .unwrap_or(0);
        let patch = parts
            .next()
            .map(|p| p.parse().map_err(|_| bad()))
            .transpose()?
            .unwrap_or(0);

        Ok(Self::new(major, minor, patch))
    }

    pub fn family(&self) -> VersionFamily {
        if self.major < 2 {
            VersionFamily::Legacy
        } else if self.major == 2 && self.minor < 2 {
            VersionFamily::V2_0
        } else {
            VersionFamily::V2_2
        }
    }

    /// The "no SRID declared" sentinel for a spatial type.
    ///
    /// The SQL-MM default is 0, but PostGIS prior to 2.0 reported -1 for
    /// geometry columns. Geography columns always use 0.
    pub fn unknown_srid(&self, spatial_type: SpatialType) -> i32 {
        match spatial_type {
            SpatialType::Geography => 0,
            SpatialType::Geometry => {
                if self.family() == VersionFamily::Legacy {
                    -1
                } else {
                    0
                }
            }
        }
    }
}
