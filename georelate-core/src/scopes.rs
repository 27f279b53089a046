//! Filter and ordering scopes.
//!
//! One filter generator per catalog relationship and one ordering generator
//! per measurement, all built on the function call builder. Filters return
//! [`Predicate`]s; orderings return [`OrderExpression`]s with
//! ascending/descending and null-placement control.
//!
//! Passing no geometry to a relationship filter is a no-op (`Ok(None)`) so
//! optional filter parameters can be threaded through untouched. Arity and
//! category mismatches fail with [`SpatialError::ArgumentCount`] before any
//! SQL is built.

use crate::backend::SqlQuoting;
use crate::catalog::{FunctionKind, SpatialCatalog};
use crate::columns::SpatialModel;
use crate::error::{Result, SpatialError};
use crate::function::{
    BindValue, ColumnSpec, FunctionCallBuilder, GeometryOperand, Predicate, ScopeOptions,
};

/// Where NULL measurements sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullsOrder {
    First,
    Last,
}

/// Options recognised by the ordering scopes.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderOptions {
    pub column: ColumnSpec,
    pub use_index: bool,
    pub desc: bool,
    pub nulls: Option<NullsOrder>,
}

impl Default for OrderOptions {
    fn default() -> Self {
        Self {
            column: ColumnSpec::default(),
            use_index: true,
            desc: false,
            nulls: None,
        }
    }
}

impl OrderOptions {
    /// Shorthand for the common "just flip to DESC" case.
    pub fn desc() -> Self {
        Self {
            desc: true,
            ..Self::default()
        }
    }

    fn scope_options(&self) -> ScopeOptions {
        ScopeOptions {
            column: self.column.clone(),
            use_index: self.use_index,
            allow_null: false,
            invert: false,
        }
    }
}

/// A measurement expression plus its ordering direction.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderExpression {
    expression: Predicate,
    desc: bool,
    nulls: Option<NullsOrder>,
}

impl OrderExpression {
    fn new(expression: Predicate, options: &OrderOptions) -> Self {
        Self {
            expression,
            desc: options.desc,
            nulls: options.nulls,
        }
    }

    pub fn expression(&self) -> &Predicate {
        &self.expression
    }

    fn suffix(&self) -> &'static str {
        match (self.desc, self.nulls) {
            (false, None) => "",
            (true, None) => " DESC",
            (false, Some(NullsOrder::First)) => " NULLS FIRST",
            (false, Some(NullsOrder::Last)) => " NULLS LAST",
            (true, Some(NullsOrder::First)) => " DESC NULLS FIRST",
            (true, Some(NullsOrder::Last)) => " DESC NULLS LAST",
        }
    }

    pub fn to_sql_inline(&self, quoting: &dyn SqlQuoting) -> String {
        format!("{}{}", self.expression.to_sql_inline(quoting), self.suffix())
    }

    pub fn to_sql_numbered(&self, start: usize) -> String {
        format!("{}{}", self.expression.to_sql_numbered(start), self.suffix())
    }

    pub fn to_sql_placeholders(&self) -> String {
        format!("{}{}", self.expression.to_sql_placeholders(), self.suffix())
    }
}

/// Scope generators for one model.
#[derive(Clone, Copy)]
pub struct ScopeContext<'a> {
    pub(crate) builder: FunctionCallBuilder<'a>,
    pub(crate) catalog: &'a SpatialCatalog,
}

impl<'a> ScopeContext<'a> {
    pub fn new(builder: FunctionCallBuilder<'a>, catalog: &'a SpatialCatalog) -> Self {
        Self { builder, catalog }
    }

    pub fn model(&self) -> &'a SpatialModel {
        self.builder.model
    }

    /// Filter by a plain relationship (`intersects`, `contains`, …).
    ///
    /// A `None` operand produces no filter at all.
    pub fn filter(
        &self,
        relationship: &str,
        operand: Option<&GeometryOperand<'_>>,
        options: &ScopeOptions,
    ) -> Result<Option<Predicate>> {
        let entry = self.filter_entry(relationship, FunctionKind::Relationship, 1)?;
        let Some(operand) = operand else {
            return Ok(None);
        };
        let call = self
            .builder
            .build(entry.canonical, Some(operand), &[], options)?;
        Ok(Some(call.to_predicate()))
    }

    /// Filter by a distance-threshold relationship (`dwithin`,
    /// `dfullywithin`). The distance is kept as a bind slot.
    pub fn filter_within_distance(
        &self,
        relationship: &str,
        operand: &GeometryOperand<'_>,
        distance: f64,
        options: &ScopeOptions,
    ) -> Result<Predicate> {
        let entry = self.filter_entry(relationship, FunctionKind::DistanceRelationship, 2)?;
        let call = self.builder.build(
            entry.canonical,
            Some(operand),
            &[BindValue::Float(distance)],
            options,
        )?;
        Ok(call.to_predicate())
    }

    /// Filter rows whose geometry type is one of `types`
    /// (`ST_GeometryType(col) IN (…)`).
    pub fn filter_geometry_type(
        &self,
        types: &[&str],
        options: &ScopeOptions,
    ) -> Result<Predicate> {
        if types.is_empty() {
            return Err(SpatialError::ArgumentCount {
                got: 0,
                min: 1,
                max: usize::MAX,
            });
        }

        let call = self.builder.build("GeometryType", None, &[], options)?;
        let mut predicate = call.to_predicate();
        predicate.push_sql(" IN (");
        for (i, geometry_type) in types.iter().enumerate() {
            if i > 0 {
                predicate.push_sql(", ");
            }
            predicate.push_bind(BindValue::Text((*geometry_type).to_owned()));
        }
        predicate.push_sql(")");
        Ok(predicate)
    }

    /// Order by a zero-argument measurement (`area`, `npoints`, …).
    pub fn order_by(&self, measurement: &str, options: &OrderOptions) -> Result<OrderExpression> {
        let entry = self.measurement_entry(measurement, FunctionKind::ZeroArgMeasurement, 0)?;
        let call = self
            .builder
            .build(entry.canonical, None, &[], &options.scope_options())?;
        Ok(OrderExpression::new(call.to_predicate(), options))
    }

    /// Order by a one-geometry measurement (`distance`, `maxdistance`, …).
    pub fn order_by_distance(
        &self,
        measurement: &str,
        operand: &GeometryOperand<'_>,
        options: &OrderOptions,
    ) -> Result<OrderExpression> {
        let entry = self.measurement_entry(measurement, FunctionKind::GeometryMeasurement, 1)?;
        let call =
            self.builder
                .build(entry.canonical, Some(operand), &[], &options.scope_options())?;
        Ok(OrderExpression::new(call.to_predicate(), options))
    }

    /// Order by a one-scalar measurement (the spheroid length family).
    pub fn order_by_spheroid(
        &self,
        measurement: &str,
        spheroid: &str,
        options: &OrderOptions,
    ) -> Result<OrderExpression> {
        let entry = self.measurement_entry(measurement, FunctionKind::ScalarMeasurement, 1)?;
        let call = self.builder.build(
            entry.canonical,
            None,
            &[BindValue::Text(spheroid.to_owned())],
            &options.scope_options(),
        )?;
        Ok(OrderExpression::new(call.to_predicate(), options))
    }

    /// Order by Hausdorff distance to a geometry, optionally densified.
    pub fn order_by_hausdorff_distance(
        &self,
        operand: &GeometryOperand<'_>,
        densify_frac: Option<f64>,
        options: &OrderOptions,
    ) -> Result<OrderExpression> {
        let trailing: Vec<BindValue> = densify_frac.map(BindValue::Float).into_iter().collect();
        let call = self.builder.build(
            "hausdorffdistance",
            Some(operand),
            &trailing,
            &options.scope_options(),
        )?;
        Ok(OrderExpression::new(call.to_predicate(), options))
    }

    /// Order by spheroid distance to a geometry; `spheroid` is the
    /// `SPHEROID["…"]` definition string.
    pub fn order_by_distance_spheroid(
        &self,
        operand: &GeometryOperand<'_>,
        spheroid: &str,
        options: &OrderOptions,
    ) -> Result<OrderExpression> {
        let call = self.builder.build(
            "distance_spheroid",
            Some(operand),
            &[BindValue::Text(spheroid.to_owned())],
            &options.scope_options(),
        )?;
        Ok(OrderExpression::new(call.to_predicate(), options))
    }

    fn filter_entry(
        &self,
        name: &str,
        required: FunctionKind,
        got: usize,
    ) -> Result<&'a crate::catalog::FunctionEntry> {
        let Some(entry) = self.catalog.lookup(name) else {
            return Err(self.catalog.unknown_relationship(name));
        };
        if entry.kind == required {
            return Ok(entry);
        }
        match entry.kind {
            FunctionKind::Relationship => Err(SpatialError::ArgumentCount { got, min: 1, max: 1 }),
            FunctionKind::DistanceRelationship => {
                Err(SpatialError::ArgumentCount { got, min: 2, max: 2 })
            }
            _ => Err(self.catalog.unknown_relationship(name)),
        }
    }

    fn measurement_entry(
        &self,
        name: &str,
        required: FunctionKind,
        got: usize,
    ) -> Result<&'a crate::catalog::FunctionEntry> {
        let Some(entry) = self.catalog.lookup(name) else {
            return Err(SpatialError::UnknownMeasurement(name.to_owned()));
        };
        if entry.kind == required {
            return Ok(entry);
        }
        let expected = match entry.kind {
            FunctionKind::ZeroArgMeasurement => 0,
            FunctionKind::GeometryMeasurement | FunctionKind::ScalarMeasurement => 1,
            // Relationships are not orderable at all.
            FunctionKind::Relationship | FunctionKind::DistanceRelationship => {
                return Err(SpatialError::UnknownMeasurement(name.to_owned()));
            }
        };
        if expected != got {
            Err(SpatialError::ArgumentCount {
                got,
                min: expected,
                max: expected,
            })
        } else {
            Err(SpatialError::UnknownMeasurement(name.to_owned()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::PgQuoting;
    use crate::catalog::SpatialCatalog;
    use crate::columns::{SchemaCache, SpatialColumnDescriptor, SpatialType, StaticColumnSource};
    use crate::config::SpatialConfig;
    use crate::version::PostgisVersion;

    struct Fixture {
        version: PostgisVersion,
        catalog: SpatialCatalog,
        config: SpatialConfig,
        schema: SchemaCache,
        source: StaticColumnSource,
        quoting: PgQuoting,
        foos: SpatialModel,
    }

    impl Fixture {
        fn new(version: PostgisVersion) -> Self {
            let mut source = StaticColumnSource::new();
            source.insert(SpatialColumnDescriptor::new(
                "foos",
                "the_geom",
                SpatialType::Geometry,
                4326,
            ));
            Self {
                version,
                catalog: SpatialCatalog::new(version),
                config: SpatialConfig::default(),
                schema: SchemaCache::new(),
                source,
                quoting: PgQuoting,
                foos: SpatialModel::new("Foo", "foos"),
            }
        }

        fn modern() -> Self {
            Self::new(PostgisVersion::new(2, 2, 1))
        }

        fn scope(&self) -> ScopeContext<'_> {
            ScopeContext::new(
                FunctionCallBuilder {
                    version: self.version,
                    config: &self.config,
                    schema: &self.schema,
                    source: &self.source,
                    quoting: &self.quoting,
                    model: &self.foos,
                },
                &self.catalog,
            )
        }
    }

    #[test]
    fn relationship_filter_builds_predicate() {
        let fixture = Fixture::modern();
        let operand = GeometryOperand::from("SRID=4326;POINT(1 1)");
        let predicate = fixture
            .scope()
            .filter("intersects", Some(&operand), &ScopeOptions::default())
            .unwrap()
            .unwrap();
        let sql = predicate.to_sql_inline(&fixture.quoting);
        assert!(sql.starts_with(r#"ST_intersects("foos"."the_geom", "#));
    }

    #[test]
    fn nil_operand_is_a_no_op() {
        let fixture = Fixture::modern();
        let result = fixture
            .scope()
            .filter("intersects", None, &ScopeOptions::default())
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn unknown_relationship_fails() {
        let fixture = Fixture::modern();
        let err = fixture
            .scope()
            .filter("adjacent_to", None, &ScopeOptions::default())
            .unwrap_err();
        assert!(matches!(err, SpatialError::UnknownRelationship { .. }));
    }

    #[test]
    fn distance_relationship_needs_its_distance() {
        let fixture = Fixture::modern();
        let operand = GeometryOperand::from("POINT(1 1)");
        let err = fixture
            .scope()
            .filter("dwithin", Some(&operand), &ScopeOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            SpatialError::ArgumentCount {
                got: 1,
                min: 2,
                max: 2
            }
        ));
    }

    #[test]
    fn plain_relationship_rejects_a_distance() {
        let fixture = Fixture::modern();
        let operand = GeometryOperand::from("POINT(1 1)");
        let err = fixture
            .scope()
            .filter_within_distance("contains", &operand, 10.0, &ScopeOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            SpatialError::ArgumentCount {
                got: 2,
                min: 1,
                max: 1
            }
        ));
    }

    #[test]
    fn dwithin_keeps_distance_as_bind() {
        let fixture = Fixture::modern();
        let operand = GeometryOperand::from("SRID=4326;POINT(1 1)");
        let predicate = fixture
            .scope()
            .filter_within_distance("dwithin", &operand, 100.0, &ScopeOptions::default())
            .unwrap();
        assert!(predicate.to_sql_placeholders().ends_with(", ?)"));
        assert_eq!(predicate.binds(), &[BindValue::Float(100.0)]);
        assert!(predicate
            .to_sql_inline(&fixture.quoting)
            .ends_with(", 100)"));
    }

    #[test]
    fn geometry_type_filter_uses_in_list() {
        let fixture = Fixture::modern();
        let predicate = fixture
            .scope()
            .filter_geometry_type(&["ST_Polygon", "ST_Point"], &ScopeOptions::default())
            .unwrap();
        assert_eq!(
            predicate.to_sql_placeholders(),
            r#"ST_GeometryType("foos"."the_geom") IN (?, ?)"#
        );
        assert_eq!(
            predicate.to_sql_inline(&fixture.quoting),
            r#"ST_GeometryType("foos"."the_geom") IN ('ST_Polygon', 'ST_Point')"#
        );
    }

    #[test]
    fn geometry_type_filter_needs_types() {
        let fixture = Fixture::modern();
        let err = fixture
            .scope()
            .filter_geometry_type(&[], &ScopeOptions::default())
            .unwrap_err();
        assert!(matches!(err, SpatialError::ArgumentCount { got: 0, .. }));
    }

    #[test]
    fn order_by_desc_nulls_last() {
        let fixture = Fixture::modern();
        let options = OrderOptions {
            nulls: Some(NullsOrder::Last),
            ..OrderOptions::desc()
        };
        let order = fixture.scope().order_by("area", &options).unwrap();
        assert_eq!(
            order.to_sql_inline(&fixture.quoting),
            r#"ST_area("foos"."the_geom") DESC NULLS LAST"#
        );
    }

    #[test]
    fn order_by_ascending_is_bare() {
        let fixture = Fixture::modern();
        let order = fixture
            .scope()
            .order_by("npoints", &OrderOptions::default())
            .unwrap();
        assert_eq!(
            order.to_sql_inline(&fixture.quoting),
            r#"ST_npoints("foos"."the_geom")"#
        );
    }

    #[test]
    fn order_by_resolves_version_aliases() {
        let modern = Fixture::modern();
        let order = modern
            .scope()
            .order_by("length3d", &OrderOptions::default())
            .unwrap();
        assert!(order
            .to_sql_inline(&modern.quoting)
            .starts_with("ST_3dlength("));

        let legacy = Fixture::new(PostgisVersion::new(1, 5, 0));
        let order = legacy
            .scope()
            .order_by("3dlength", &OrderOptions::default())
            .unwrap();
        assert!(order
            .to_sql_inline(&legacy.quoting)
            .starts_with("ST_length3d("));
    }

    #[test]
    fn order_by_rejects_geometry_measurements() {
        let fixture = Fixture::modern();
        let err = fixture
            .scope()
            .order_by("distance", &OrderOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            SpatialError::ArgumentCount {
                got: 0,
                min: 1,
                max: 1
            }
        ));
    }

    #[test]
    fn order_by_unknown_measurement() {
        let fixture = Fixture::modern();
        let err = fixture
            .scope()
            .order_by("volume", &OrderOptions::default())
            .unwrap_err();
        assert!(matches!(err, SpatialError::UnknownMeasurement(_)));
    }

    #[test]
    fn order_by_distance_to_geometry() {
        let fixture = Fixture::modern();
        let operand = GeometryOperand::from("SRID=4326;POINT(5 5)");
        let order = fixture
            .scope()
            .order_by_distance("distance", &operand, &OrderOptions::default())
            .unwrap();
        assert!(order
            .to_sql_inline(&fixture.quoting)
            .starts_with(r#"ST_distance("foos"."the_geom", "#));
    }

    #[test]
    fn order_by_distance_rejects_zero_argument_measurements() {
        let fixture = Fixture::modern();
        let operand = GeometryOperand::from("POINT(5 5)");
        let err = fixture
            .scope()
            .order_by_distance("area", &operand, &OrderOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            SpatialError::ArgumentCount {
                got: 1,
                min: 0,
                max: 0
            }
        ));
    }

    #[test]
    fn order_by_spheroid_binds_the_spheroid_string() {
        let fixture = Fixture::modern();
        let spheroid = r#"SPHEROID["WGS 84",6378137,298.257223563]"#;
        let order = fixture
            .scope()
            .order_by_spheroid("length_spheroid", spheroid, &OrderOptions::default())
            .unwrap();
        // 2.2 consolidates the spheroid lengths into ST_lengthspheroid.
        let sql = order.to_sql_inline(&fixture.quoting);
        assert!(sql.starts_with("ST_lengthspheroid("));
        assert!(sql.contains(r#"'SPHEROID["WGS 84",6378137,298.257223563]'"#));
    }

    #[test]
    fn order_by_hausdorff_distance_with_densify() {
        let fixture = Fixture::modern();
        let operand = GeometryOperand::from("SRID=4326;LINESTRING(0 0, 1 1)");
        let order = fixture
            .scope()
            .order_by_hausdorff_distance(&operand, Some(0.5), &OrderOptions::desc())
            .unwrap();
        let sql = order.to_sql_placeholders();
        assert!(sql.starts_with("ST_hausdorffdistance("));
        assert!(sql.ends_with(", ?) DESC"));
    }

    #[test]
    fn order_by_distance_spheroid() {
        let fixture = Fixture::modern();
        let operand = GeometryOperand::from("SRID=4326;POINT(5 5)");
        let order = fixture
            .scope()
            .order_by_distance_spheroid(&operand, "SPHEROID[\"WGS 84\",6378137,298.257223563]", &OrderOptions::default())
            .unwrap();
        assert!(order
            .to_sql_placeholders()
            .starts_with("ST_distance_spheroid("));
    }
}
