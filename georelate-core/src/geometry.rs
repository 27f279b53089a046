//! Geometry wire I/O.
//!
//! The boundary to the geometry library: reads WKT, EWKT (`SRID=n;…`), and
//! hex or binary (E)WKB into a [`GeometryValue`] carrying the geometry and
//! its SRID, and serialises back out. Input format is auto-detected. The
//! `SRID=default;` placeholder is substituted with a column's declared SRID
//! *before* parsing via [`read_with_column_srid`].

use geo::Geometry;
use geozero::{ToGeo, ToWkt};

use crate::columns::SpatialType;
use crate::error::{Result, SpatialError};
use crate::ewkb;
use crate::version::PostgisVersion;

/// Raw geometry input, text or binary.
#[derive(Debug, Clone, Copy)]
pub enum GeometryInput<'a> {
    Text(&'a str),
    Binary(&'a [u8]),
}

impl<'a> From<&'a str> for GeometryInput<'a> {
    fn from(text: &'a str) -> Self {
        GeometryInput::Text(text)
    }
}

impl<'a> From<&'a String> for GeometryInput<'a> {
    fn from(text: &'a String) -> Self {
        GeometryInput::Text(text)
    }
}

impl<'a> From<&'a [u8]> for GeometryInput<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        GeometryInput::Binary(bytes)
    }
}

impl<'a> From<&'a Vec<u8>> for GeometryInput<'a> {
    fn from(bytes: &'a Vec<u8>) -> Self {
        GeometryInput::Binary(bytes)
    }
}

/// A parsed geometry with its SRID, if it declared one.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryValue {
    pub geom: Geometry<f64>,
    pub srid: Option<i32>,
}

impl GeometryValue {
    pub fn new(geom: Geometry<f64>, srid: Option<i32>) -> Self {
        Self { geom, srid }
    }

    /// Reinterpret this geometry as being in `srid` without touching
    /// coordinates (the force-SRID operation).
    pub fn with_srid(mut self, srid: i32) -> Self {
        self.srid = Some(srid);
        self
    }

    /// The SRID used for reconciliation: a missing SRID, or the literal
    /// `0`/`-1` sentinels, normalise to the version's unknown-SRID value for
    /// the column type.
    pub fn effective_srid(&self, spatial_type: SpatialType, version: PostgisVersion) -> i32 {
        match self.srid {
            Some(srid) if srid != 0 && srid != -1 => srid,
            _ => version.unknown_srid(spatial_type),
        }
    }

    pub fn to_wkt(&self) -> Result<String> {
        Ok(self.geom.to_wkt()?)
    }

    /// EWKT (`SRID=n;WKT`), or plain WKT when no SRID is known.
    pub fn to_ewkt(&self) -> Result<String> {
        let wkt = self.to_wkt()?;
        match self.srid {
            Some(srid) => Ok(format!("SRID={srid};{wkt}")),
            None => Ok(wkt),
        }
    }

    /// ISO WKB (SRID stripped).
    pub fn to_wkb(&self) -> Result<Vec<u8>> {
        ewkb::write_ewkb(&self.geom, None)
    }

    /// EWKB, carrying the SRID when one is known.
    pub fn to_ewkb(&self) -> Result<Vec<u8>> {
        ewkb::write_ewkb(&self.geom, self.srid)
    }

    pub fn to_wkb_hex(&self) -> Result<String> {
        Ok(hex::encode_upper(self.to_wkb()?))
    }

    pub fn to_ewkb_hex(&self) -> Result<String> {
        Ok(hex::encode_upper(self.to_ewkb()?))
    }
}

/// Read a geometry from any supported wire format.
pub fn read<'a>(input: impl Into<GeometryInput<'a>>) -> Result<GeometryValue> {
    match input.into() {
        GeometryInput::Text(text) => read_text(text),
        GeometryInput::Binary(bytes) => read_binary(bytes),
    }
}

/// Read a geometry, substituting the `SRID=default;` placeholder with the
/// column's declared SRID before parsing.
pub fn read_with_column_srid<'a>(
    input: impl Into<GeometryInput<'a>>,
    column_srid: i32,
) -> Result<GeometryValue> {
    match input.into() {
        GeometryInput::Text(text) => {
            let trimmed = text.trim();
            if let Some(rest) = strip_prefix_ignore_case(trimmed, "SRID=default;") {
                read_text(&format!("SRID={column_srid};{rest}"))
            } else {
                read_text(trimmed)
            }
        }
        GeometryInput::Binary(bytes) => read_binary(bytes),
    }
}

fn read_text(text: &str) -> Result<GeometryValue> {
    let text = text.trim();
    if text.is_empty() {
        return Err(SpatialError::InvalidGeometry("empty input".to_owned()));
    }

    if let Some(rest) = strip_prefix_ignore_case(text, "SRID=") {
        let (srid_part, wkt) = rest
            .split_once(';')
            .ok_or_else(|| SpatialError::InvalidGeometry(format!("malformed EWKT: {text:?}")))?;
        let srid = srid_part
            .trim()
            .parse::<i32>()
            .map_err(|_| SpatialError::InvalidGeometry(format!("bad SRID in EWKT: {text:?}")))?;
        return Ok(parse_wkt(wkt)?.with_srid(srid));
    }

    if looks_like_hex(text) {
        let bytes = hex::decode(text)
            .map_err(|e| SpatialError::InvalidGeometry(format!("bad hex WKB: {e}")))?;
        return read_binary(&bytes);
    }

    parse_wkt(text)
}

fn read_binary(bytes: &[u8]) -> Result<GeometryValue> {
    let (geom, srid) = ewkb::parse_ewkb(bytes)?;
    Ok(GeometryValue::new(geom, srid))
}

fn parse_wkt(wkt: &str) -> Result<GeometryValue> {
    let geom: Geometry<f64> = geozero::wkt::Wkt(wkt.as_bytes())
        .to_geo()
        .map_err(|e| SpatialError::InvalidGeometry(format!("{e}: {wkt:?}")))?;
    Ok(GeometryValue::new(geom, None))
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    if text.len() >= prefix.len()
        && text.is_char_boundary(prefix.len())
        && text[..prefix.len()].eq_ignore_ascii_case(prefix)
    {
        Some(&text[prefix.len()..])
    } else {
        None
    }
}

// (E)WKB hex starts with the byte-order octet, so any real blob is at least
// the 5-byte header; WKT always opens with a type keyword.
fn looks_like_hex(text: &str) -> bool {
    text.len() >= 10 && text.len() % 2 == 0 && text.bytes().all(|b| b.is_ascii_hexdigit())
}
