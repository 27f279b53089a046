//! Batched resolution of spatial associations.
//!
//! Spatial joins have no foreign key to batch on, so the usual keyed eager
//! loading doesn't apply. Instead, one query per chunk of owners joins the
//! target table to an aliased copy of the owner table on the spatial
//! predicate and aggregates the matching owner primary keys per target row:
//!
//! ```sql
//! SELECT "bars".*,
//!        array_to_string(array_agg("__spatial_ids_join__"."id"), ',')
//!          AS "__spatial_ids__"
//! FROM "bars"
//! INNER JOIN "foos" AS "__spatial_ids_join__"
//!   ON (ST_contains("__spatial_ids_join__"."the_geom", "bars"."the_geom"))
//! WHERE "__spatial_ids_join__"."id" IN (…)
//! GROUP BY "bars"."id"
//! ```
//!
//! Each returned row is then fanned back out to every owner named in its
//! aggregated key list. A target row may belong to several owners at once
//! (a point inside overlapping polygons), and owners with no matches end up
//! with an empty collection, not a missing entry. Chunks run strictly
//! sequentially.

use std::collections::HashMap;

use crate::associations::AssociationScope;
use crate::backend::{SpatialExecutor, SqlQuoting};
use crate::error::SpatialError;
use thiserror::Error;

/// Column alias carrying the aggregated owner-key list.
pub const SPATIAL_IDS_ALIAS: &str = "__spatial_ids__";
/// Table alias for the joined copy of the owner table.
pub const SPATIAL_JOIN_ALIAS: &str = "__spatial_ids_join__";

/// Errors from a batched load: either ours, or the executor's.
#[derive(Debug, Error)]
pub enum PreloadError<E>
where
    E: std::fmt::Debug + std::fmt::Display,
{
    #[error(transparent)]
    Spatial(#[from] SpatialError),

    #[error("spatial preload query failed: {0}")]
    Database(E),
}

/// An owner primary key that can cross the SQL boundary: rendered into the
/// `IN` list on the way out, parsed back from the aggregated key list on the
/// way in.
pub trait OwnerKey: Clone + Eq + std::hash::Hash {
    fn to_sql(&self, quoting: &dyn SqlQuoting) -> String;
    fn parse_key(raw: &str) -> Option<Self>;
}

macro_rules! integer_owner_key {
    ($($ty:ty),+) => {
        $(
            impl OwnerKey for $ty {
                fn to_sql(&self, _quoting: &dyn SqlQuoting) -> String {
                    self.to_string()
                }

                fn parse_key(raw: &str) -> Option<Self> {
                    raw.parse().ok()
                }
            }
        )+
    };
}

integer_owner_key!(i32, i64, u32, u64);

impl OwnerKey for String {
    fn to_sql(&self, quoting: &dyn SqlQuoting) -> String {
        quoting.quote_literal(self)
    }

    fn parse_key(raw: &str) -> Option<Self> {
        Some(raw.to_owned())
    }
}

/// The batched resolution engine for one association.
#[derive(Clone, Copy)]
pub struct Preloader<'a> {
    scope: AssociationScope<'a>,
}

impl<'a> Preloader<'a> {
    pub fn new(scope: AssociationScope<'a>) -> Self {
        Self { scope }
    }

    pub fn scope(&self) -> &AssociationScope<'a> {
        &self.scope
    }

    /// The aggregation-join query for one chunk of owner keys.
    pub fn batch_sql<K: OwnerKey>(&self, keys: &[K]) -> Result<String, SpatialError> {
        let quoting = self.scope.scope.builder.quoting;
        let owner = self.scope.owner();
        let target = self.scope.target();

        let target_table = quoting.quote_identifier(&target.table_name);
        let target_pk = quoting.quote_identifier(&target.primary_key);
        let owner_table = quoting.quote_identifier(&owner.table_name);
        let owner_pk = quoting.quote_identifier(&owner.primary_key);
        let join_alias = quoting.quote_identifier(SPATIAL_JOIN_ALIAS);
        let ids_alias = quoting.quote_identifier(SPATIAL_IDS_ALIAS);

        let join_condition = self
            .scope
            .join_predicate(SPATIAL_JOIN_ALIAS)?
            .to_sql_inline(quoting);

        let type_condition = self
            .scope
            .polymorphic_predicate()
            .map(|p| format!("{} AND ", p.to_sql_inline(quoting)))
            .unwrap_or_default();

        let key_list = keys
            .iter()
            .map(|key| key.to_sql(quoting))
            .collect::<Vec<_>>()
            .join(", ");

        Ok(format!(
            "SELECT {target_table}.*, \
             array_to_string(array_agg({join_alias}.{owner_pk}), ',') AS {ids_alias} \
             FROM {target_table} \
             INNER JOIN {owner_table} AS {join_alias} ON ({join_condition}) \
             WHERE {type_condition}{join_alias}.{owner_pk} IN ({key_list}) \
             GROUP BY {target_table}.{target_pk}"
        ))
    }

    /// Resolve the association for every owner key, in
    /// ⌈keys / max_in_clause_size⌉ queries.
    pub fn load<K, E>(
        &self,
        executor: &mut E,
        owner_keys: &[K],
    ) -> Result<HashMap<K, Vec<E::Row>>, PreloadError<E::Error>>
    where
        K: OwnerKey,
        E: SpatialExecutor,
    {
        let mut records: HashMap<K, Vec<E::Row>> = owner_keys
            .iter()
            .map(|key| (key.clone(), Vec::new()))
            .collect();
        if owner_keys.is_empty() {
            return Ok(records);
        }

        let chunk_size = executor
            .max_in_clause_size()
            .unwrap_or(owner_keys.len())
            .max(1);

        for chunk in owner_keys.chunks(chunk_size) {
            let sql = self.batch_sql(chunk)?;
            tracing::debug!(
                association = %self.scope.association().name,
                owners = chunk.len(),
                "resolving spatial association batch"
            );
            let rows = executor
                .load_with_keys(&sql)
                .map_err(PreloadError::Database)?;

            for (key_list, row) in rows {
                for raw_key in key_list.split(',') {
                    let Some(key) = K::parse_key(raw_key.trim()) else {
                        continue;
                    };
                    // Keys outside the requested set are ignored.
                    if let Some(bucket) = records.get_mut(&key) {
                        bucket.push(row.clone());
                    }
                }
            }
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::associations::{SpatialAssociation, SpatialAssociationOptions};
    use crate::backend::PgQuoting;
    use crate::catalog::SpatialCatalog;
    use crate::columns::{
        SchemaCache, SpatialColumnDescriptor, SpatialModel, SpatialType, StaticColumnSource,
    };
    use crate::config::SpatialConfig;
    use crate::function::FunctionCallBuilder;
    use crate::scopes::ScopeContext;
    use crate::version::PostgisVersion;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct TargetRow {
        id: i64,
    }

    #[derive(Debug)]
    struct MockError;

    impl std::fmt::Display for MockError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("mock database error")
        }
    }

    /// Plays back a fixed target→owners match table, honouring the `IN`
    /// list of each query the way the real database would.
    struct MockExecutor {
        matches: Vec<(i64, Vec<i64>)>,
        in_clause: Option<usize>,
        queries: Vec<String>,
    }

    impl MockExecutor {
        fn new(matches: Vec<(i64, Vec<i64>)>) -> Self {
            Self {
                matches,
                in_clause: None,
                queries: Vec::new(),
            }
        }

        fn with_in_clause(mut self, size: usize) -> Self {
            self.in_clause = Some(size);
            self
        }
    }

    fn keys_in_query(sql: &str) -> Vec<i64> {
        let start = sql.find(" IN (").expect("query has an IN list") + 5;
        let end = sql[start..].find(')').expect("IN list is closed") + start;
        sql[start..end]
            .split(',')
            .map(|part| part.trim().parse().expect("integer key"))
            .collect()
    }

    impl SpatialExecutor for MockExecutor {
        type Row = TargetRow;
        type Error = MockError;

        fn load_with_keys(&mut self, sql: &str) -> Result<Vec<(String, TargetRow)>, MockError> {
            self.queries.push(sql.to_owned());
            let requested = keys_in_query(sql);

            Ok(self
                .matches
                .iter()
                .filter_map(|(target_id, owners)| {
                    let hits: Vec<String> = owners
                        .iter()
                        .filter(|owner| requested.contains(owner))
                        .map(|owner| owner.to_string())
                        .collect();
                    if hits.is_empty() {
                        None
                    } else {
                        Some((hits.join(","), TargetRow { id: *target_id }))
                    }
                })
                .collect())
        }

        fn max_in_clause_size(&self) -> Option<usize> {
            self.in_clause
        }
    }

    struct Fixture {
        catalog: SpatialCatalog,
        config: SpatialConfig,
        schema: SchemaCache,
        source: StaticColumnSource,
        quoting: PgQuoting,
        foos: SpatialModel,
        bars: SpatialModel,
        association: SpatialAssociation,
    }

    impl Fixture {
        fn new() -> Self {
            let catalog = SpatialCatalog::new(PostgisVersion::new(2, 2, 1));
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
            let association = SpatialAssociation::declare(
                "bars",
                &catalog,
                SpatialAssociationOptions::relationship("contains"),
            )
            .unwrap();

            Self {
                catalog,
                config: SpatialConfig::default(),
                schema: SchemaCache::new(),
                source,
                quoting: PgQuoting,
                foos: SpatialModel::new("Foo", "foos"),
                bars: SpatialModel::new("Bar", "bars"),
                association,
            }
        }

        fn preloader(&self) -> Preloader<'_> {
            let builder = FunctionCallBuilder {
                version: self.catalog.version(),
                config: &self.config,
                schema: &self.schema,
                source: &self.source,
                quoting: &self.quoting,
                model: &self.bars,
            };
            Preloader::new(AssociationScope::new(
                ScopeContext::new(builder, &self.catalog),
                &self.association,
                &self.foos,
            ))
        }
    }

    #[test]
    fn batch_sql_shape() {
        let fixture = Fixture::new();
        let sql = fixture.preloader().batch_sql(&[1i64, 2]).unwrap();
        assert_eq!(
            sql,
            "SELECT \"bars\".*, \
             array_to_string(array_agg(\"__spatial_ids_join__\".\"id\"), ',') AS \"__spatial_ids__\" \
             FROM \"bars\" \
             INNER JOIN \"foos\" AS \"__spatial_ids_join__\" \
             ON (ST_contains(\"__spatial_ids_join__\".\"the_geom\", \"bars\".\"the_geom\")) \
             WHERE \"__spatial_ids_join__\".\"id\" IN (1, 2) \
             GROUP BY \"bars\".\"id\""
        );
    }

    #[test]
    fn string_keys_are_quoted() {
        let fixture = Fixture::new();
        let sql = fixture
            .preloader()
            .batch_sql(&["a".to_owned(), "b'c".to_owned()])
            .unwrap();
        assert!(sql.contains("IN ('a', 'b''c')"));
    }

    #[test]
    fn fan_out_including_empty_owners() {
        // Three owner polygons, five target points:
        //   owner 1 -> p1, p3; owner 2 -> nothing; owner 3 -> p2, p4, p5.
        let fixture = Fixture::new();
        let mut executor = MockExecutor::new(vec![
            (1, vec![1]),
            (2, vec![3]),
            (3, vec![1]),
            (4, vec![3]),
            (5, vec![3]),
        ]);

        let records = fixture
            .preloader()
            .load(&mut executor, &[1i64, 2, 3])
            .unwrap();

        assert_eq!(executor.queries.len(), 1);
        assert_eq!(records.len(), 3);

        let ids = |owner: i64| -> Vec<i64> {
            let mut ids: Vec<i64> = records[&owner].iter().map(|r| r.id).collect();
            ids.sort_unstable();
            ids
        };
        assert_eq!(ids(1), vec![1, 3]);
        assert_eq!(ids(2), Vec::<i64>::new());
        assert_eq!(ids(3), vec![2, 4, 5]);
    }

    #[test]
    fn shared_target_rows_fan_out_to_every_owner() {
        let fixture = Fixture::new();
        let mut executor = MockExecutor::new(vec![(7, vec![1, 2, 3])]);

        let records = fixture
            .preloader()
            .load(&mut executor, &[1i64, 2, 3])
            .unwrap();
        for owner in [1i64, 2, 3] {
            assert_eq!(records[&owner], vec![TargetRow { id: 7 }]);
        }
    }

    #[test]
    fn chunking_is_transparent() {
        let matches = vec![
            (1, vec![1]),
            (2, vec![3]),
            (3, vec![1]),
            // A target matched by owners that land in different chunks.
            (4, vec![1, 2, 3]),
        ];
        let owners = [1i64, 2, 3];
        let fixture = Fixture::new();

        let mut unchunked = MockExecutor::new(matches.clone());
        let expected = fixture.preloader().load(&mut unchunked, &owners).unwrap();
        assert_eq!(unchunked.queries.len(), 1);

        let mut chunked = MockExecutor::new(matches).with_in_clause(2);
        let records = fixture.preloader().load(&mut chunked, &owners).unwrap();

        // ceil(3 / 2) queries, identical per-owner results.
        assert_eq!(chunked.queries.len(), 2);
        for owner in owners {
            let sort = |rows: &Vec<TargetRow>| {
                let mut ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
                ids.sort_unstable();
                ids
            };
            assert_eq!(sort(&records[&owner]), sort(&expected[&owner]));
        }

        // Every chunk restricts the owner side to its own keys.
        assert_eq!(keys_in_query(&chunked.queries[0]), vec![1, 2]);
        assert_eq!(keys_in_query(&chunked.queries[1]), vec![3]);
    }

    #[test]
    fn no_owners_issues_no_queries() {
        let fixture = Fixture::new();
        let mut executor = MockExecutor::new(vec![(1, vec![1])]);
        let records = fixture
            .preloader()
            .load::<i64, _>(&mut executor, &[])
            .unwrap();
        assert!(records.is_empty());
        assert!(executor.queries.is_empty());
    }

    #[test]
    fn chunks_resolve_sequentially_in_key_order() {
        let fixture = Fixture::new();
        let mut executor = MockExecutor::new(vec![]).with_in_clause(1);
        fixture
            .preloader()
            .load(&mut executor, &[5i64, 6, 7])
            .unwrap();
        assert_eq!(executor.queries.len(), 3);
        assert_eq!(keys_in_query(&executor.queries[0]), vec![5]);
        assert_eq!(keys_in_query(&executor.queries[1]), vec![6]);
        assert_eq!(keys_in_query(&executor.queries[2]), vec![7]);
    }
}
