//! EWKB (Extended Well-Known Binary) wire codec.
//!
//! Layout:
//!   [0x01|0x00]   — byte order marker (little-endian or big-endian)
//!   [u32]         — geometry type with flags (in the declared byte order)
//!                   Bit 29 (0x20000000): SRID present
//!                   Bit 31 (0x80000000): Z dimension
//!                   Bit 30 (0x40000000): M dimension
//!                   Bits 0–28: geometry type (1=Point, 2=LineString, …)
//!   [i32]         — SRID (only when the SRID flag is set)
//!   …             — ISO WKB geometry payload
//!
//! Only the header is handled here; payload decoding is delegated to
//! geozero. Coordinates are XY-only — Z/M payloads are rejected rather than
//! silently flattened.

use geo::Geometry;
use geozero::wkb::Ewkb;
use geozero::{CoordDimensions, ToGeo, ToWkb};

use crate::error::{Result, SpatialError};

pub const EWKB_SRID_FLAG: u32 = 0x20000000;
pub const EWKB_Z_FLAG: u32 = 0x80000000;
pub const EWKB_M_FLAG: u32 = 0x40000000;

/// Parsed EWKB header metadata.
#[derive(Debug, Clone)]
pub struct EwkbHeader {
    /// Base geometry type code (1=Point, 2=LineString, ..., 7=GeometryCollection).
    pub geom_type: u32,
    /// SRID embedded in the EWKB, if the SRID flag is set.
    pub srid: Option<i32>,
    pub has_z: bool,
    pub has_m: bool,
    /// Byte offset where the geometry payload starts.
    pub data_offset: usize,
    pub little_endian: bool,
}

/// Peek at the EWKB header without parsing the geometry payload.
pub fn parse_ewkb_header(blob: &[u8]) -> Result<EwkbHeader> {
    if blob.len() < 5 {
        return Err(SpatialError::InvalidEwkb("blob too short"));
    }

    let little_endian = match blob[0] {
        0x01 => true,
        0x00 => false,
        _ => return Err(SpatialError::InvalidEwkb("invalid byte order marker")),
    };

    let read_u32 = |bytes: [u8; 4]| {
        if little_endian {
            u32::from_le_bytes(bytes)
        } else {
            u32::from_be_bytes(bytes)
        }
    };

    let raw_type = read_u32([blob[1], blob[2], blob[3], blob[4]]);
    let has_srid = (raw_type & EWKB_SRID_FLAG) != 0;
    let has_z = (raw_type & EWKB_Z_FLAG) != 0;
    let has_m = (raw_type & EWKB_M_FLAG) != 0;

    let mut offset = 5usize;
    let srid = if has_srid {
        if blob.len() < 9 {
            return Err(SpatialError::InvalidEwkb("SRID flag set but blob too short"));
        }
        let bytes = [blob[5], blob[6], blob[7], blob[8]];
        let s = if little_endian {
            i32::from_le_bytes(bytes)
        } else {
            i32::from_be_bytes(bytes)
        };
        offset += 4;
        Some(s)
    } else {
        None
    };

    Ok(EwkbHeader {
        geom_type: raw_type & 0x1FFF_FFFF,
        srid,
        has_z,
        has_m,
        data_offset: offset,
        little_endian,
    })
}

/// Extract only the SRID from an EWKB blob (header read, no payload parse).
pub fn extract_srid(blob: &[u8]) -> Option<i32> {
    parse_ewkb_header(blob).ok().and_then(|h| h.srid)
}

/// Parse an EWKB (or ISO WKB) blob into a geometry and its SRID.
pub fn parse_ewkb(blob: &[u8]) -> Result<(Geometry<f64>, Option<i32>)> {
    let header = parse_ewkb_header(blob)?;
    if header.has_z || header.has_m {
        return Err(SpatialError::InvalidEwkb("unsupported Z/M coordinates"));
    }
    let geom = Ewkb(blob)
        .to_geo()
        .map_err(|e| SpatialError::InvalidGeometry(e.to_string()))?;
    Ok((geom, header.srid))
}

/// Serialise a geometry to EWKB with an optional SRID.
///
/// With `srid = None` this produces plain ISO WKB (no SRID flag), so a
/// geometry with no known projection never carries a sentinel on the wire.
pub fn write_ewkb(geom: &Geometry<f64>, srid: Option<i32>) -> Result<Vec<u8>> {
    let iso_wkb = geom
        .to_wkb(CoordDimensions::xy())
        .map_err(SpatialError::Geozero)?;

    match srid {
        Some(srid_val) => patch_wkb_with_srid(&iso_wkb, srid_val),
        None => Ok(iso_wkb),
    }
}

/// Rewrite the SRID in an existing (E)WKB blob without touching the payload.
pub fn set_srid(blob: &[u8], new_srid: i32) -> Result<Vec<u8>> {
    let header = parse_ewkb_header(blob)?;

    let raw_type = if header.little_endian {
        u32::from_le_bytes([blob[1], blob[2], blob[3], blob[4]])
    } else {
        u32::from_be_bytes([blob[1], blob[2], blob[3], blob[4]])
    };
    let ewkb_type = raw_type | EWKB_SRID_FLAG;

    let mut out = Vec::with_capacity(blob.len() + 4);
    out.push(blob[0]);
    if header.little_endian {
        out.extend_from_slice(&ewkb_type.to_le_bytes());
        out.extend_from_slice(&new_srid.to_le_bytes());
    } else {
        out.extend_from_slice(&ewkb_type.to_be_bytes());
        out.extend_from_slice(&new_srid.to_be_bytes());
    }
    out.extend_from_slice(&blob[header.data_offset..]);
    Ok(out)
}

// ISO WKB: [byte_order(1)][type_u32(4)][payload…]
// EWKB:    [byte_order(1)][type_u32|flag(4)][srid_i32(4)][payload…]
fn patch_wkb_with_srid(iso_wkb: &[u8], srid_val: i32) -> Result<Vec<u8>> {
    if iso_wkb.len() < 5 {
        return Err(SpatialError::InvalidEwkb("WKB output too short"));
    }
    let little_endian = match iso_wkb[0] {
        0x01 => true,
        0x00 => false,
        _ => return Err(SpatialError::InvalidEwkb("invalid byte order marker")),
    };
    let raw_type = if little_endian {
        u32::from_le_bytes([iso_wkb[1], iso_wkb[2], iso_wkb[3], iso_wkb[4]])
    } else {
        u32::from_be_bytes([iso_wkb[1], iso_wkb[2], iso_wkb[3], iso_wkb[4]])
    };
    let ewkb_type = raw_type | EWKB_SRID_FLAG;

    let mut out = Vec::with_capacity(iso_wkb.len() + 4);
    out.push(iso_wkb[0]);
    if little_endian {
        out.extend_from_slice(&ewkb_type.to_le_bytes());
        out.extend_from_slice(&srid_val.to_le_bytes());
    } else {
        out.extend_from_slice(&ewkb_type.to_be_bytes());
        out.extend_from_slice(&srid_val.to_be_bytes());
    }
    out.extend_from_slice(&iso_wkb[5..]);
    Ok(out)
}
