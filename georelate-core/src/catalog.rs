//! The relationship and measurement vocabulary.
//!
//! One immutable registry per process, built from the PostGIS version probe.
//! Function renames across PostGIS releases are folded into the tables and
//! an alias map applied at lookup time, so callers see a stable surface on
//! every supported version.

use std::collections::HashMap;

use crate::error::{Result, SpatialError};
use crate::version::{PostgisVersion, VersionFamily};

/// What a catalog function expects besides the table's own column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    /// Boolean predicate over two geometries (`intersects`, `contains`, …).
    Relationship,
    /// Boolean predicate over two geometries and a distance threshold
    /// (`dwithin`, `dfullywithin`).
    DistanceRelationship,
    /// Numeric measurement of the column alone (`area`, `npoints`, …).
    ZeroArgMeasurement,
    /// Numeric measurement against one other geometry (`distance`, …).
    GeometryMeasurement,
    /// Numeric measurement taking one scalar argument (spheroid lengths).
    ScalarMeasurement,
}

/// A resolved catalog entry: the canonical SQL name (minus `ST_` prefix) and
/// its arity kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionEntry {
    pub canonical: &'static str,
    pub kind: FunctionKind,
}

// The nine DE-9IM relationships plus the PostGIS extras, on every version.
const RELATIONSHIPS: &[&str] = &[
    "contains",
    "containsproperly",
    "covers",
    "coveredby",
    "crosses",
    "disjoint",
    "equals",
    "intersects",
    "orderingequals",
    "overlaps",
    "touches",
    "within",
];

const DISTANCE_RELATIONSHIPS: &[&str] = &["dwithin", "dfullywithin"];

const ZERO_ARGUMENT_MEASUREMENTS: &[&str] = &[
    "area",
    "ndims",
    "npoints",
    "nrings",
    "numgeometries",
    "numinteriorring",
    "numinteriorrings",
    "numpoints",
    "length",
    "length2d",
    "perimeter",
    "perimeter2d",
];

const GEOMETRY_MEASUREMENTS: &[&str] = &["distance", "maxdistance"];

/// The registry of supported spatial relationships and measurements.
#[derive(Debug)]
pub struct SpatialCatalog {
    version: PostgisVersion,
    entries: HashMap<&'static str, FunctionEntry>,
    aliases: HashMap<&'static str, &'static str>,
    relationships: Vec<&'static str>,
}

impl SpatialCatalog {
    pub fn new(version: PostgisVersion) -> Self {
        let family = version.family();
        let mut entries = HashMap::new();
        let mut aliases: HashMap<&'static str, &'static str> = HashMap::new();

        let mut insert = |names: &[&'static str], kind: FunctionKind| {
            for &name in names {
                entries.insert(name, FunctionEntry { canonical: name, kind });
            }
        };

        insert(RELATIONSHIPS, FunctionKind::Relationship);
        insert(DISTANCE_RELATIONSHIPS, FunctionKind::DistanceRelationship);
        insert(ZERO_ARGUMENT_MEASUREMENTS, FunctionKind::ZeroArgMeasurement);
        insert(GEOMETRY_MEASUREMENTS, FunctionKind::GeometryMeasurement);

        aliases.insert("max_distance", "maxdistance");

        match family {
            VersionFamily::Legacy => {
                insert(&["length3d", "perimeter3d"], FunctionKind::ZeroArgMeasurement);
                insert(&["distance_sphere"], FunctionKind::GeometryMeasurement);
                insert(
                    &["length2d_spheroid", "length_spheroid", "length3d_spheroid"],
                    FunctionKind::ScalarMeasurement,
                );

                aliases.insert("3dlength", "length3d");
                aliases.insert("3dperimeter", "perimeter3d");
                aliases.insert("3dlength_spheroid", "length3d_spheroid");
            }
            VersionFamily::V2_0 => {
                insert(&["3dintersects"], FunctionKind::Relationship);
                insert(
                    &["3ddwithin", "3ddfullywithin"],
                    FunctionKind::DistanceRelationship,
                );
                insert(&["3dlength", "3dperimeter"], FunctionKind::ZeroArgMeasurement);
                insert(
                    &["distance_sphere", "3ddistance", "3dmaxdistance"],
                    FunctionKind::GeometryMeasurement,
                );
                insert(
                    &["length2d_spheroid", "length_spheroid", "3dlength_spheroid"],
                    FunctionKind::ScalarMeasurement,
                );

                aliases.insert("length3d", "3dlength");
                aliases.insert("perimeter3d", "3dperimeter");
                aliases.insert("length3d_spheroid", "3dlength_spheroid");
                aliases.insert("3d_dwithin", "3ddwithin");
                aliases.insert("3d_dfully_within", "3ddfullywithin");
                aliases.insert("3d_distance", "3ddistance");
                aliases.insert("3d_max_distance", "3dmaxdistance");
            }
            VersionFamily::V2_2 => {
                insert(&["3dintersects"], FunctionKind::Relationship);
                insert(
                    &["3ddwithin", "3ddfullywithin"],
                    FunctionKind::DistanceRelationship,
                );
                insert(&["3dlength", "3dperimeter"], FunctionKind::ZeroArgMeasurement);
                // ST_Distance_Sphere became ST_DistanceSphere in 2.2.
                insert(
                    &["distancesphere", "3ddistance", "3dmaxdistance"],
                    FunctionKind::GeometryMeasurement,
                );
                // The spheroid length variants collapsed into ST_LengthSpheroid.
                insert(&["lengthspheroid"], FunctionKind::ScalarMeasurement);

                aliases.insert("length3d", "3dlength");
                aliases.insert("perimeter3d", "3dperimeter");
                aliases.insert("3d_dwithin", "3ddwithin");
                aliases.insert("3d_dfully_within", "3ddfullywithin");
                aliases.insert("3d_distance", "3ddistance");
                aliases.insert("3d_max_distance", "3dmaxdistance");
                aliases.insert("distance_sphere", "distancesphere");
                aliases.insert("length_spheroid", "lengthspheroid");
                aliases.insert("length2d_spheroid", "lengthspheroid");
                aliases.insert("2dlength_spheroid", "lengthspheroid");
                aliases.insert("length3d_spheroid", "lengthspheroid");
                aliases.insert("3dlength_spheroid", "lengthspheroid");
            }
        }

        let mut relationships: Vec<&'static str> = entries
            .values()
            .filter(|e| e.kind == FunctionKind::Relationship)
            .map(|e| e.canonical)
            .collect();
        relationships.sort_unstable();

        Self {
            version,
            entries,
            aliases,
            relationships,
        }
    }

    pub fn version(&self) -> PostgisVersion {
        self.version
    }

    /// Resolve a caller-facing name (alias-aware) to its entry.
    pub fn lookup(&self, name: &str) -> Option<&FunctionEntry> {
        let canonical = self.aliases.get(name).copied().unwrap_or(name);
        self.entries.get(canonical)
    }

    /// The plain relationship vocabulary, sorted — the set valid for spatial
    /// associations.
    pub fn relationships(&self) -> &[&'static str] {
        &self.relationships
    }

    /// Look up a name that must be a plain relationship.
    pub fn relationship(&self, name: &str) -> Result<&FunctionEntry> {
        match self.lookup(name) {
            Some(entry) if entry.kind == FunctionKind::Relationship => Ok(entry),
            _ => Err(self.unknown_relationship(name)),
        }
    }

    pub fn unknown_relationship(&self, name: &str) -> SpatialError {
        SpatialError::UnknownRelationship {
            name: name.to_owned(),
            expected: self.relationships.iter().map(|s| (*s).to_owned()).collect(),
        }
    }
}
