//! Spatial associations.
//!
//! A spatial association is a has-many-style relationship between two tables
//! joined on a spatial predicate instead of a foreign key: "a neighbourhood
//! *contains* many cities". The descriptor is built once at declaration time
//! and validated there (unknown relationships and foreign-key-style options
//! fail fast); per-owner scopes and batched loads are derived from it at
//! query time.
//!
//! By default the relationship is `intersects` and the scope is inverted,
//! so "Foo spatially contains many Bars" emits
//! `ST_contains("foos"."the_geom", "bars"."the_geom")`.
//!
//! Spatial associations are essentially readonly: rows are related through
//! geometry, not unique ids, so one target row may belong to any number of
//! owners at once.

use crate::backend::SqlQuoting;
use crate::catalog::SpatialCatalog;
use crate::columns::SpatialModel;
use crate::error::{Result, SpatialError};
use crate::function::{ColumnSpec, GeometryOperand, Predicate, ScopeOptions};
use crate::geometry::GeometryValue;
use crate::scopes::ScopeContext;

/// Options for declaring a spatial association.
///
/// The foreign-key-flavoured knobs (`through`, `source`, `dependent`,
/// `counter_cache`, `inverse_of`) exist only to be rejected: they assume
/// identity-based semantics a spatial join can't provide.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialAssociationOptions {
    pub relationship: String,
    /// Owner-side geometry column (optionally wrapped).
    pub geom: ColumnSpec,
    /// Target-side geometry column; defaults to `{as}_geom` for polymorphic
    /// associations, otherwise the configured default column.
    pub foreign_geom: Option<ColumnSpec>,
    /// Options forwarded to the underlying scope. Inverted by default.
    pub scope_options: ScopeOptions,
    /// Polymorphic discriminator name; drives the `{as}_geom` /
    /// `{as}_type` column conventions.
    pub as_polymorphic: Option<String>,

    pub through: Option<String>,
    pub source: Option<String>,
    pub dependent: bool,
    pub counter_cache: bool,
    pub inverse_of: Option<String>,
}

impl Default for SpatialAssociationOptions {
    fn default() -> Self {
        Self {
            relationship: "intersects".to_owned(),
            geom: ColumnSpec::default(),
            foreign_geom: None,
            scope_options: ScopeOptions::inverted(),
            as_polymorphic: None,
            through: None,
            source: None,
            dependent: false,
            counter_cache: false,
            inverse_of: None,
        }
    }
}

impl SpatialAssociationOptions {
    pub fn relationship(name: impl Into<String>) -> Self {
        Self {
            relationship: name.into(),
            ..Self::default()
        }
    }
}

/// A declared spatial association: read-only after declaration, shared by
/// every owner instance.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialAssociation {
    pub name: String,
    /// Canonical relationship token, alias-resolved against the catalog.
    pub relationship: String,
    pub geom: ColumnSpec,
    pub foreign_geom: ColumnSpec,
    pub scope_options: ScopeOptions,
    pub polymorphic_type_column: Option<String>,
}

impl SpatialAssociation {
    /// Validate and build an association descriptor.
    ///
    /// Fails at declaration time with [`SpatialError::UnknownRelationship`]
    /// for a relationship outside the catalog and
    /// [`SpatialError::IncompatibleAssociationOptions`] for foreign-key
    /// options.
    pub fn declare(
        name: impl Into<String>,
        catalog: &SpatialCatalog,
        options: SpatialAssociationOptions,
    ) -> Result<Self> {
        if options.through.is_some() {
            return Err(SpatialError::IncompatibleAssociationOptions(
                "through is not supported on spatial associations",
            ));
        }
        if options.source.is_some() {
            return Err(SpatialError::IncompatibleAssociationOptions(
                "source is not supported on spatial associations",
            ));
        }
        if options.dependent {
            return Err(SpatialError::IncompatibleAssociationOptions(
                "dependent is not supported on spatial associations",
            ));
        }
        if options.counter_cache {
            return Err(SpatialError::IncompatibleAssociationOptions(
                "counter_cache is not supported on spatial associations",
            ));
        }
        if options.inverse_of.is_some() {
            return Err(SpatialError::IncompatibleAssociationOptions(
                "inverse_of is not supported on spatial associations",
            ));
        }

        let entry = catalog.relationship(&options.relationship)?;

        let foreign_geom = options.foreign_geom.unwrap_or_else(|| {
            match &options.as_polymorphic {
                Some(as_name) => ColumnSpec::named(format!("{as_name}_geom")),
                None => ColumnSpec::default(),
            }
        });

        Ok(Self {
            name: name.into(),
            relationship: entry.canonical.to_owned(),
            geom: options.geom,
            foreign_geom,
            scope_options: options.scope_options,
            polymorphic_type_column: options
                .as_polymorphic
                .as_ref()
                .map(|as_name| format!("{as_name}_type")),
        })
    }

    /// The scope options used when this association queries the target
    /// table: the declared options, pointed at the target-side column.
    pub(crate) fn target_scope_options(&self) -> ScopeOptions {
        ScopeOptions {
            column: self.foreign_geom.clone(),
            ..self.scope_options.clone()
        }
    }
}

/// One association bound to its owner and target models.
#[derive(Clone, Copy)]
pub struct AssociationScope<'a> {
    pub(crate) scope: ScopeContext<'a>,
    pub(crate) association: &'a SpatialAssociation,
    pub(crate) owner: &'a SpatialModel,
}

impl<'a> AssociationScope<'a> {
    pub fn new(
        scope: ScopeContext<'a>,
        association: &'a SpatialAssociation,
        owner: &'a SpatialModel,
    ) -> Self {
        Self {
            scope,
            association,
            owner,
        }
    }

    pub fn association(&self) -> &'a SpatialAssociation {
        self.association
    }

    pub fn owner(&self) -> &'a SpatialModel {
        self.owner
    }

    pub fn target(&self) -> &'a SpatialModel {
        self.scope.model()
    }

    /// The filter selecting one owner's associated target rows, using the
    /// owner's geometry value as the literal operand.
    pub fn predicate_for_owner(&self, owner_geometry: &GeometryValue) -> Result<Predicate> {
        let operand = self.owner_operand(GeometryOperand::value(owner_geometry));
        let call = self.scope.builder.build(
            &self.association.relationship,
            Some(&operand),
            &[],
            &self.association.target_scope_options(),
        )?;

        let mut predicate = call.to_predicate();
        if let Some(type_predicate) = self.polymorphic_predicate() {
            predicate = predicate.and(type_predicate);
        }
        Ok(predicate)
    }

    /// The join condition between the target table and an aliased copy of
    /// the owner table, for batched resolution.
    pub(crate) fn join_predicate(&self, join_alias: &str) -> Result<Predicate> {
        let column_operand = match &self.association.geom.name {
            Some(name) => GeometryOperand::column_named(self.owner, name.clone()),
            None => GeometryOperand::column(self.owner),
        }
        .aliased(join_alias);
        let operand = self.owner_operand(column_operand);

        let call = self.scope.builder.build(
            &self.association.relationship,
            Some(&operand),
            &[],
            &self.association.target_scope_options(),
        )?;
        Ok(call.to_predicate())
    }

    /// `"targets"."{as}_type" = 'OwnerModel'` for polymorphic associations.
    pub(crate) fn polymorphic_predicate(&self) -> Option<Predicate> {
        let type_column = self.association.polymorphic_type_column.as_deref()?;
        let quoting = self.scope.builder.quoting;
        Some(Predicate::from_sql(format!(
            "{}.{} = {}",
            quoting.quote_identifier(&self.target().table_name),
            quoting.quote_identifier(type_column),
            quoting.quote_literal(&self.owner.name),
        )))
    }

    // The owner-side wrapper applies to whatever stands in for the owner's
    // geometry, literal or column reference.
    fn owner_operand<'b>(&self, operand: GeometryOperand<'b>) -> GeometryOperand<'b> {
        match &self.association.geom.wrapper {
            Some(wrapper) => operand.wrapped(wrapper.clone()),
            None => operand,
        }
    }
}
