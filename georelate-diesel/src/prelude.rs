//! Convenience re-exports for georelate-diesel.
//!
//! ```rust,ignore
//! use georelate_diesel::prelude::*;
//! ```

pub use crate::dsl::{filter_sql, order_sql, SpatialQueryDsl};
pub use crate::loader::{DieselExecutor, SpatialIdsRow};
pub use crate::types::{Geography, Geometry};

pub use georelate_core::associations::{SpatialAssociation, SpatialAssociationOptions};
pub use georelate_core::backend::{PgQuoting, SpatialExecutor, SqlQuoting};
pub use georelate_core::columns::{
    SchemaCache, SpatialColumnDescriptor, SpatialModel, SpatialType, StaticColumnSource,
};
pub use georelate_core::function::{
    ColumnSpec, FunctionWrapper, GeometryOperand, Predicate, ScopeOptions,
};
pub use georelate_core::scopes::{NullsOrder, OrderOptions};
pub use georelate_core::{Spatial, SpatialEnv};
