//! Batched-loader plumbing: row structs and executor bounds.

use georelate_diesel::prelude::*;

#[derive(diesel::QueryableByName, Clone, Debug, PartialEq)]
struct BarRow {
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    id: i64,
    #[diesel(sql_type = diesel::sql_types::Text, column_name = __spatial_ids__)]
    spatial_ids: String,
}

impl SpatialIdsRow for BarRow {
    fn spatial_ids(&self) -> &str {
        &self.spatial_ids
    }
}

// The executor must be constructible over any Pg LoadConnection; checked at
// compile time, no database needed.
#[allow(dead_code)]
fn executor_over_any_pg_connection<C>(conn: &mut C) -> DieselExecutor<'_, C, BarRow>
where
    C: diesel::connection::LoadConnection<Backend = diesel::pg::Pg>,
{
    DieselExecutor::new(conn).with_in_clause_limit(1_000)
}

#[test]
fn spatial_ids_column_round_trips() {
    let row = BarRow {
        id: 42,
        spatial_ids: "1,2,3".to_owned(),
    };
    assert_eq!(row.spatial_ids(), "1,2,3");
}

#[test]
fn batch_sql_matches_the_aggregation_join_shape() {
    let env = SpatialEnv::probe("2.2.1").expect("version parses");
    let schema = SchemaCache::new();
    let mut source = StaticColumnSource::new();
    source.insert(SpatialColumnDescriptor::new(
        "foos",
        "the_geom",
        SpatialType::Geometry,
        4326,
    ));
    source.insert(SpatialColumnDescriptor::new(
        "bars",
        "the_geom",
        SpatialType::Geometry,
        4326,
    ));
    let quoting = PgQuoting;
    let spatial = Spatial::new(&env, &schema, &source, &quoting);

    let foos = SpatialModel::new("Foo", "foos");
    let bars = SpatialModel::new("Bar", "bars");
    let association = SpatialAssociation::declare(
        "bars",
        &env.catalog,
        SpatialAssociationOptions::relationship("contains"),
    )
    .expect("valid association");

    let sql = spatial
        .preloader(&association, &foos, &bars)
        .batch_sql(&[1i64, 2, 3])
        .expect("sql builds");

    assert!(sql.starts_with(r#"SELECT "bars".*, array_to_string(array_agg("#));
    assert!(sql.contains(r#"INNER JOIN "foos" AS "__spatial_ids_join__""#));
    assert!(sql.contains(r#"ST_contains("__spatial_ids_join__"."the_geom", "bars"."the_geom")"#));
    assert!(sql.contains(r#""__spatial_ids_join__"."id" IN (1, 2, 3)"#));
    assert!(sql.ends_with(r#"GROUP BY "bars"."id""#));
}
