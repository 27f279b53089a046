#![doc = include_str!("../../README.md")]
//! Crate-specific API surface for `georelate-core`.

pub mod accessors;
pub mod associations;
pub mod backend;
pub mod catalog;
pub mod columns;
pub mod config;
pub mod error;
pub mod ewkb;
pub mod function;
pub mod geometry;
pub mod preload;
pub mod scopes;
pub mod srid;
pub mod version;

pub use error::{Result, SpatialError};

use associations::{AssociationScope, SpatialAssociation};
use backend::SqlQuoting;
use catalog::SpatialCatalog;
use columns::{SchemaCache, SpatialColumnSource, SpatialModel};
use config::SpatialConfig;
use function::{FunctionCallBuilder, GeometryOperand, Predicate, ScopeOptions};
use preload::Preloader;
use scopes::ScopeContext;
use version::PostgisVersion;

/// Everything derived from the startup probe, built once per process:
/// the version classification, the function catalog, and configuration.
#[derive(Debug)]
pub struct SpatialEnv {
    pub version: PostgisVersion,
    pub catalog: SpatialCatalog,
    pub config: SpatialConfig,
}

impl SpatialEnv {
    pub fn new(version: PostgisVersion) -> Self {
        Self::with_config(version, SpatialConfig::default())
    }

    pub fn with_config(version: PostgisVersion, config: SpatialConfig) -> Self {
        Self {
            version,
            catalog: SpatialCatalog::new(version),
            config,
        }
    }

    /// Build from the raw version string the database reports.
    pub fn probe(version_string: &str) -> Result<Self> {
        Ok(Self::new(PostgisVersion::parse(version_string)?))
    }
}

/// A session over one environment, schema cache, column source and quoting
/// backend. Cheap to construct and copy; everything is borrowed.
#[derive(Clone, Copy)]
pub struct Spatial<'a> {
    pub env: &'a SpatialEnv,
    pub schema: &'a SchemaCache,
    pub source: &'a dyn SpatialColumnSource,
    pub quoting: &'a dyn SqlQuoting,
}

impl<'a> Spatial<'a> {
    pub fn new(
        env: &'a SpatialEnv,
        schema: &'a SchemaCache,
        source: &'a dyn SpatialColumnSource,
        quoting: &'a dyn SqlQuoting,
    ) -> Self {
        Self {
            env,
            schema,
            source,
            quoting,
        }
    }

    fn builder(&self, model: &'a SpatialModel) -> FunctionCallBuilder<'a> {
        FunctionCallBuilder {
            version: self.env.version,
            config: &self.env.config,
            schema: self.schema,
            source: self.source,
            quoting: self.quoting,
            model,
        }
    }

    /// Scope generators for a model.
    pub fn scope(&self, model: &'a SpatialModel) -> ScopeContext<'a> {
        ScopeContext::new(self.builder(model), &self.env.catalog)
    }

    /// Bind a declared association to its owner and target models.
    pub fn association(
        &self,
        association: &'a SpatialAssociation,
        owner: &'a SpatialModel,
        target: &'a SpatialModel,
    ) -> AssociationScope<'a> {
        AssociationScope::new(self.scope(target), association, owner)
    }

    /// The batched resolution engine for an association.
    pub fn preloader(
        &self,
        association: &'a SpatialAssociation,
        owner: &'a SpatialModel,
        target: &'a SpatialModel,
    ) -> Preloader<'a> {
        Preloader::new(self.association(association, owner, target))
    }

    /// Direct access to the function call builder: compile one spatial
    /// function call into a predicate.
    pub fn build_function_call(
        &self,
        model: &'a SpatialModel,
        function: &str,
        operand: Option<&GeometryOperand<'_>>,
        options: &ScopeOptions,
    ) -> Result<Predicate> {
        let call = self.builder(model).build(function, operand, &[], options)?;
        Ok(call.to_predicate())
    }
}
