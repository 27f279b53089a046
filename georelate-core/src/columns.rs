//! Spatial column metadata.
//!
//! PostGIS advertises geometry and geography columns through the
//! `geometry_columns` / `geography_columns` views. [`SpatialColumnSource`]
//! abstracts that catalog query; [`SchemaCache`] loads each table's
//! descriptors lazily and keeps them for the life of the process until an
//! explicit [`SchemaCache::reload`].

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{Result, SpatialError};

/// The two spatial column kinds. Geography assumes a fixed lon/lat reference
/// (SRID 4326) and is never reprojected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpatialType {
    Geometry,
    Geography,
}

impl SpatialType {
    /// SQL type name used for literal casts (`'...'::geometry`).
    pub fn sql_name(&self) -> &'static str {
        match self {
            SpatialType::Geometry => "geometry",
            SpatialType::Geography => "geography",
        }
    }
}

/// One geometry/geography column on a table, as described by the PostGIS
/// column catalog. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpatialColumnDescriptor {
    pub table_name: String,
    pub column_name: String,
    pub spatial_type: SpatialType,
    pub srid: i32,
    pub coord_dimension: u8,
}

impl SpatialColumnDescriptor {
    pub fn new(
        table_name: impl Into<String>,
        column_name: impl Into<String>,
        spatial_type: SpatialType,
        srid: i32,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            column_name: column_name.into(),
            spatial_type,
            srid,
            coord_dimension: 2,
        }
    }

    pub fn with_coord_dimension(mut self, coord_dimension: u8) -> Self {
        self.coord_dimension = coord_dimension;
        self
    }
}

/// The model-class analog: names a table, its primary key, and the model
/// name used for polymorphic discriminator values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpatialModel {
    pub name: String,
    pub table_name: String,
    pub primary_key: String,
}

impl SpatialModel {
    pub fn new(name: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table_name: table_name.into(),
            primary_key: "id".to_owned(),
        }
    }

    pub fn with_primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = primary_key.into();
        self
    }
}

/// Where column descriptors come from: usually a query against
/// `geometry_columns`/`geography_columns`, or a static map for embedded
/// schemas and tests.
pub trait SpatialColumnSource {
    fn load_columns(&self, table: &str) -> Result<Vec<SpatialColumnDescriptor>>;
}

/// An in-memory column source for schemas known up front.
#[derive(Debug, Default, Clone)]
pub struct StaticColumnSource {
    tables: HashMap<String, Vec<SpatialColumnDescriptor>>,
}

impl StaticColumnSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, descriptor: SpatialColumnDescriptor) -> &mut Self {
        self.tables
            .entry(descriptor.table_name.clone())
            .or_default()
            .push(descriptor);
        self
    }
}

impl SpatialColumnSource for StaticColumnSource {
    fn load_columns(&self, table: &str) -> Result<Vec<SpatialColumnDescriptor>> {
        Ok(self.tables.get(table).cloned().unwrap_or_default())
    }
}

/// Per-table descriptor cache.
///
/// Safe for concurrent readers once populated; a racing first load performs
/// two equivalent catalog queries and the second simply wins, which is
/// harmless since descriptors are immutable.
#[derive(Debug, Default)]
pub struct SchemaCache {
    tables: RwLock<HashMap<String, Arc<[SpatialColumnDescriptor]>>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// All spatial columns of `table`, loading through `source` on first
    /// access.
    pub fn columns(
        &self,
        source: &dyn SpatialColumnSource,
        table: &str,
    ) -> Result<Arc<[SpatialColumnDescriptor]>> {
        let hit = {
            let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
            tables.get(table).cloned()
        };
        match hit {
            Some(columns) => Ok(columns),
            None => self.reload(source, table),
        }
    }

    /// Force a reload of `table`'s descriptors.
    pub fn reload(
        &self,
        source: &dyn SpatialColumnSource,
        table: &str,
    ) -> Result<Arc<[SpatialColumnDescriptor]>> {
        let loaded: Arc<[SpatialColumnDescriptor]> = source.load_columns(table)?.into();
        tracing::debug!(table, columns = loaded.len(), "loaded spatial columns");
        self.tables
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(table.to_owned(), Arc::clone(&loaded));
        Ok(loaded)
    }

    /// Grab a column descriptor by name.
    pub fn column_by_name(
        &self,
        source: &dyn SpatialColumnSource,
        table: &str,
        column: &str,
    ) -> Result<SpatialColumnDescriptor> {
        self.columns(source, table)?
            .iter()
            .find(|c| c.column_name == column)
            .cloned()
            .ok_or_else(|| SpatialError::ColumnNotFound {
                table: table.to_owned(),
                column: column.to_owned(),
            })
    }

    /// Quickly grab the declared SRID of a column.
    pub fn srid_for(
        &self,
        source: &dyn SpatialColumnSource,
        table: &str,
        column: &str,
    ) -> Result<i32> {
        self.columns(source, table)?
            .iter()
            .find(|c| c.column_name == column)
            .map(|c| c.srid)
            .ok_or_else(|| SpatialError::SridNotFound {
                table: table.to_owned(),
                column: column.to_owned(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> StaticColumnSource {
        let mut source = StaticColumnSource::new();
        source.insert(SpatialColumnDescriptor::new(
            "foos",
            "the_geom",
            SpatialType::Geometry,
            4326,
        ));
        source.insert(SpatialColumnDescriptor::new(
            "foos",
            "the_other_geom",
            SpatialType::Geometry,
            4269,
        ));
        source.insert(SpatialColumnDescriptor::new(
            "foo_geographies",
            "the_geom",
            SpatialType::Geography,
            4326,
        ));
        source
    }

    #[test]
    fn lazy_load_and_cache() {
        let source = source();
        let cache = SchemaCache::new();

        let first = cache.columns(&source, "foos").unwrap();
        assert_eq!(first.len(), 2);
        // Second access must serve the same cached slice.
        let second = cache.columns(&source, "foos").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn reload_replaces_cached_descriptors() {
        let source = source();
        let cache = SchemaCache::new();
        let first = cache.columns(&source, "foos").unwrap();
        let reloaded = cache.reload(&source, "foos").unwrap();
        assert!(!Arc::ptr_eq(&first, &reloaded));
        assert_eq!(*first, *reloaded);
    }

    #[test]
    fn column_by_name_hit_and_miss() {
        let source = source();
        let cache = SchemaCache::new();

        let column = cache.column_by_name(&source, "foos", "the_other_geom").unwrap();
        assert_eq!(column.srid, 4269);

        let err = cache.column_by_name(&source, "foos", "nope").unwrap_err();
        assert!(matches!(err, SpatialError::ColumnNotFound { .. }));
    }

    #[test]
    fn srid_for_missing_column() {
        let source = source();
        let cache = SchemaCache::new();
        let err = cache.srid_for(&source, "foos", "missing").unwrap_err();
        assert!(matches!(err, SpatialError::SridNotFound { .. }));
    }

    #[test]
    fn unknown_table_has_no_columns() {
        let source = source();
        let cache = SchemaCache::new();
        assert!(cache.columns(&source, "bars").unwrap().is_empty());
    }
}
