//! SRID reconciliation.
//!
//! Decides how a comparison geometry is brought into a column's coordinate
//! reference system before the two can meet in a predicate:
//!
//! * geography columns are never transformed — everything is assumed 4326;
//! * equal SRIDs need nothing;
//! * if either side carries the unknown-SRID sentinel, the geometry is
//!   reinterpreted in the column's SRID (`ST_SetSRID`, no coordinate math);
//! * two different known SRIDs require a genuine reprojection
//!   (`ST_Transform`).
//!
//! The direction is fixed: the geometry is adjusted to the column's SRID,
//! never the reverse.

use crate::columns::SpatialType;
use crate::version::PostgisVersion;

/// How a geometry operand must be adjusted to match a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SridAction {
    /// Leave the operand untouched.
    Identity,
    /// Reinterpret coordinates as already being in the column's SRID.
    ForceSrid(i32),
    /// Mathematically reproject into the column's SRID.
    Reproject(i32),
}

impl SridAction {
    /// The SQL function implementing this action, if any.
    pub fn function_name(&self) -> Option<&'static str> {
        match self {
            SridAction::Identity => None,
            SridAction::ForceSrid(_) => Some("SetSRID"),
            SridAction::Reproject(_) => Some("Transform"),
        }
    }
}

/// Reconcile a geometry's SRID against a column's declared SRID.
///
/// `geom_srid` is expected to be sentinel-normalised already (see
/// [`crate::geometry::GeometryValue::effective_srid`]).
pub fn reconcile(
    column_srid: i32,
    geom_srid: i32,
    spatial_type: SpatialType,
    version: PostgisVersion,
) -> SridAction {
    if spatial_type == SpatialType::Geography {
        return SridAction::Identity;
    }
    if column_srid == geom_srid {
        return SridAction::Identity;
    }

    let unknown = version.unknown_srid(spatial_type);
    if column_srid == unknown || geom_srid == unknown {
        SridAction::ForceSrid(column_srid)
    } else {
        SridAction::Reproject(column_srid)
    }
}
