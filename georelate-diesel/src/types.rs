//! Diesel SQL type definitions for PostGIS columns.
//!
//! Both [`Geometry`] and [`Geography`] carry EWKB on the wire; `FromSql` /
//! `ToSql` move raw `Vec<u8>` blobs in and out, and geography reads enforce
//! SRID 4326 the way the column type itself does.

use diesel::backend::Backend;
use diesel::deserialize::{self, FromSql};
use diesel::pg::Pg;
use diesel::serialize::{self, IsNull, Output, ToSql};
use std::io::Write as IoWrite;

/// Diesel SQL type for a PostGIS `geometry` column (EWKB on the wire).
///
/// ```rust,ignore
/// diesel::table! {
///     features (id) {
///         id   -> BigInt,
///         geom -> Nullable<georelate_diesel::types::Geometry>,
///     }
/// }
/// ```
#[derive(diesel::sql_types::SqlType, diesel::query_builder::QueryId, Debug, Clone, Copy)]
#[diesel(postgres_type(name = "geometry"))]
pub struct Geometry;

/// Diesel SQL type for a PostGIS `geography` column (EWKB, SRID 4326).
#[derive(diesel::sql_types::SqlType, diesel::query_builder::QueryId, Debug, Clone, Copy)]
#[diesel(postgres_type(name = "geography"))]
pub struct Geography;

impl FromSql<Geometry, Pg> for Vec<u8> {
    fn from_sql(bytes: <Pg as Backend>::RawValue<'_>) -> deserialize::Result<Self> {
        Ok(bytes.as_bytes().to_vec())
    }
}

impl ToSql<Geometry, Pg> for Vec<u8> {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        IoWrite::write_all(out, self)?;
        Ok(IsNull::No)
    }
}

impl ToSql<Geometry, Pg> for [u8] {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        IoWrite::write_all(out, self)?;
        Ok(IsNull::No)
    }
}

impl FromSql<Geography, Pg> for Vec<u8> {
    fn from_sql(bytes: <Pg as Backend>::RawValue<'_>) -> deserialize::Result<Self> {
        let blob = bytes.as_bytes().to_vec();
        match georelate_core::ewkb::extract_srid(&blob) {
            Some(4326) => Ok(blob),
            Some(other) => Err(format!("geography EWKB must use SRID 4326 (got {other})").into()),
            None => Err("geography EWKB must include SRID 4326".into()),
        }
    }
}

impl ToSql<Geography, Pg> for Vec<u8> {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        IoWrite::write_all(out, self)?;
        Ok(IsNull::No)
    }
}
