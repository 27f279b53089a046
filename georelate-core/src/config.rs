//! Library configuration.
//!
//! The one configurable knob is the default geometry column name used when a
//! scope or association doesn't name a column explicitly. `the_geom` is the
//! process-wide default; pass a different [`SpatialConfig`] to
//! [`crate::SpatialEnv`] to override it, rather than mutating global state.

/// Column name assumed when none is given, as often seen in PostGIS
/// documentation.
pub const DEFAULT_COLUMN_NAME: &str = "the_geom";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpatialConfig {
    pub default_column_name: String,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self {
            default_column_name: DEFAULT_COLUMN_NAME.to_owned(),
        }
    }
}

impl SpatialConfig {
    pub fn with_default_column(name: impl Into<String>) -> Self {
        Self {
            default_column_name: name.into(),
        }
    }
}
