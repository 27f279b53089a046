#![doc = include_str!("../../README.md")]
//! Crate-specific API surface for `georelate-diesel`.

pub mod dsl;
pub mod loader;
pub mod prelude;
pub mod types;

pub use dsl::SpatialQueryDsl;
pub use loader::{DieselExecutor, SpatialIdsRow};
pub use types::{Geography, Geometry};
