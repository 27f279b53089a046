//! Format-conversion accessors for spatial attributes.
//!
//! Instead of generating named methods per column, a [`SpatialAttributes`]
//! map keys [`GeometryField`] value objects by column name. Setting a field
//! accepts anything [`crate::geometry::read`] understands (WKT, EWKT,
//! (E)WKB hex or binary, including the `SRID=default;` placeholder) and
//! applies the column's SRID rules: a geometry with an unknown SRID is
//! reinterpreted in the column's SRID, while a genuinely mismatched known
//! SRID is refused — setting an attribute never reprojects. Geography
//! columns store ISO WKB; geometry columns store EWKB.

use std::collections::HashMap;
use std::sync::Arc;

use crate::columns::{SpatialColumnDescriptor, SpatialType};
use crate::error::{Result, SpatialError};
use crate::geometry::{self, GeometryInput, GeometryValue};
use crate::srid::{reconcile, SridAction};
use crate::version::PostgisVersion;

/// Output formats a field can be read back in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Wkt,
    Ewkt,
    Wkb,
    Ewkb,
    WkbHex,
    EwkbHex,
}

impl OutputFormat {
    /// Parse a format name (`"wkt"`, `"ewkb_hex"`, …).
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "wkt" => Ok(OutputFormat::Wkt),
            "ewkt" => Ok(OutputFormat::Ewkt),
            "wkb" => Ok(OutputFormat::Wkb),
            "ewkb" => Ok(OutputFormat::Ewkb),
            "wkb_hex" => Ok(OutputFormat::WkbHex),
            "ewkb_hex" => Ok(OutputFormat::EwkbHex),
            other => Err(SpatialError::InvalidFormat(other.to_owned())),
        }
    }
}

/// A serialized geometry, text or binary depending on the format asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum GeometryOutput {
    Text(String),
    Binary(Vec<u8>),
}

/// One column's stored value with format-conversion accessors.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryField {
    descriptor: SpatialColumnDescriptor,
    wire: Vec<u8>,
}

impl GeometryField {
    /// Wrap bytes already on the wire (e.g. read back from the database).
    pub fn from_stored(descriptor: SpatialColumnDescriptor, wire: Vec<u8>) -> Self {
        Self { descriptor, wire }
    }

    /// Parse an input value against a column and store it in the column's
    /// wire format.
    pub fn set<'a>(
        descriptor: &SpatialColumnDescriptor,
        input: impl Into<GeometryInput<'a>>,
        version: PostgisVersion,
    ) -> Result<Self> {
        let value = geometry::read_with_column_srid(input, descriptor.srid)?;

        let wire = if descriptor.spatial_type == SpatialType::Geography {
            value.to_wkb()?
        } else {
            let geom_srid = value.effective_srid(descriptor.spatial_type, version);
            let value = match reconcile(
                descriptor.srid,
                geom_srid,
                descriptor.spatial_type,
                version,
            ) {
                SridAction::Identity => value,
                SridAction::ForceSrid(srid) => value.with_srid(srid),
                SridAction::Reproject(srid) => {
                    return Err(SpatialError::SridConversion {
                        table: descriptor.table_name.clone(),
                        column: descriptor.column_name.clone(),
                        from: geom_srid,
                        to: srid,
                    });
                }
            };
            value.to_ewkb()?
        };

        Ok(Self {
            descriptor: descriptor.clone(),
            wire,
        })
    }

    pub fn descriptor(&self) -> &SpatialColumnDescriptor {
        &self.descriptor
    }

    /// The stored wire bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.wire
    }

    /// Parse the stored bytes back into a geometry value.
    pub fn value(&self) -> Result<GeometryValue> {
        geometry::read(self.wire.as_slice())
    }

    pub fn as_wkt(&self) -> Result<String> {
        self.value()?.to_wkt()
    }

    pub fn as_ewkt(&self) -> Result<String> {
        self.value()?.to_ewkt()
    }

    pub fn as_wkb(&self) -> Result<Vec<u8>> {
        self.value()?.to_wkb()
    }

    pub fn as_ewkb(&self) -> Result<Vec<u8>> {
        self.value()?.to_ewkb()
    }

    pub fn as_wkb_hex(&self) -> Result<String> {
        self.value()?.to_wkb_hex()
    }

    pub fn as_ewkb_hex(&self) -> Result<String> {
        self.value()?.to_ewkb_hex()
    }

    pub fn get(&self, format: OutputFormat) -> Result<GeometryOutput> {
        Ok(match format {
            OutputFormat::Wkt => GeometryOutput::Text(self.as_wkt()?),
            OutputFormat::Ewkt => GeometryOutput::Text(self.as_ewkt()?),
            OutputFormat::Wkb => GeometryOutput::Binary(self.as_wkb()?),
            OutputFormat::Ewkb => GeometryOutput::Binary(self.as_ewkb()?),
            OutputFormat::WkbHex => GeometryOutput::Text(self.as_wkb_hex()?),
            OutputFormat::EwkbHex => GeometryOutput::Text(self.as_ewkb_hex()?),
        })
    }
}

/// Spatial attribute storage for one row instance: column name →
/// optional field.
#[derive(Debug, Clone)]
pub struct SpatialAttributes {
    columns: Arc<[SpatialColumnDescriptor]>,
    version: PostgisVersion,
    fields: HashMap<String, Option<GeometryField>>,
}

impl SpatialAttributes {
    pub fn new(columns: Arc<[SpatialColumnDescriptor]>, version: PostgisVersion) -> Self {
        Self {
            columns,
            version,
            fields: HashMap::new(),
        }
    }

    fn descriptor(&self, column: &str) -> Result<&SpatialColumnDescriptor> {
        self.columns
            .iter()
            .find(|c| c.column_name == column)
            .ok_or_else(|| SpatialError::ColumnNotFound {
                table: self
                    .columns
                    .first()
                    .map(|c| c.table_name.clone())
                    .unwrap_or_default(),
                column: column.to_owned(),
            })
    }

    /// Set a column from any readable input; `None` clears it.
    pub fn set<'a>(
        &mut self,
        column: &str,
        input: Option<impl Into<GeometryInput<'a>>>,
    ) -> Result<()> {
        let descriptor = self.descriptor(column)?.clone();
        let field = match input {
            Some(input) => Some(GeometryField::set(&descriptor, input, self.version)?),
            None => None,
        };
        self.fields.insert(column.to_owned(), field);
        Ok(())
    }

    pub fn get(&self, column: &str) -> Option<&GeometryField> {
        self.fields.get(column).and_then(|f| f.as_ref())
    }

    /// Read a column in the requested output format; `Ok(None)` when the
    /// column is unset or cleared.
    pub fn get_as(&self, column: &str, format: OutputFormat) -> Result<Option<GeometryOutput>> {
        match self.get(column) {
            Some(field) => Ok(Some(field.get(format)?)),
            None => Ok(None),
        }
    }
}
