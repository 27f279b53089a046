//! Batched association loading through Diesel.
//!
//! The core preloader hands finished SQL to a
//! [`SpatialExecutor`](georelate_core::backend::SpatialExecutor);
//! [`DieselExecutor`] runs it with `diesel::sql_query` on any PostgreSQL
//! connection. Row structs derive `QueryableByName`, include the
//! `__spatial_ids__` aggregate column, and expose it through
//! [`SpatialIdsRow`]:
//!
//! ```rust,ignore
//! #[derive(diesel::QueryableByName, Clone)]
//! struct BarRow {
//!     #[diesel(sql_type = diesel::sql_types::BigInt)]
//!     id: i64,
//!     #[diesel(sql_type = diesel::sql_types::Text, column_name = __spatial_ids__)]
//!     spatial_ids: String,
//! }
//!
//! impl SpatialIdsRow for BarRow {
//!     fn spatial_ids(&self) -> &str {
//!         &self.spatial_ids
//!     }
//! }
//!
//! let records = spatial
//!     .preloader(&association, &foos, &bars)
//!     .load(&mut DieselExecutor::new(&mut conn), &owner_ids)?;
//! ```

use std::marker::PhantomData;

use diesel::connection::LoadConnection;
use diesel::deserialize::QueryableByName;
use diesel::pg::Pg;
use diesel::query_dsl::RunQueryDsl;

use georelate_core::backend::SpatialExecutor;

/// Access to the aggregated owner-key column of a batch result row.
pub trait SpatialIdsRow {
    fn spatial_ids(&self) -> &str;
}

/// A [`SpatialExecutor`] running batch queries on a Diesel connection.
pub struct DieselExecutor<'c, C, R> {
    conn: &'c mut C,
    in_clause_limit: Option<usize>,
    _row: PhantomData<R>,
}

impl<'c, C, R> DieselExecutor<'c, C, R> {
    pub fn new(conn: &'c mut C) -> Self {
        Self {
            conn,
            in_clause_limit: None,
            _row: PhantomData,
        }
    }

    /// Bound the number of owner keys a single query may name; the
    /// preloader chunks accordingly.
    pub fn with_in_clause_limit(mut self, limit: usize) -> Self {
        self.in_clause_limit = Some(limit);
        self
    }
}

impl<C, R> SpatialExecutor for DieselExecutor<'_, C, R>
where
    C: LoadConnection<Backend = Pg>,
    R: QueryableByName<Pg> + SpatialIdsRow + Clone + 'static,
{
    type Row = R;
    type Error = diesel::result::Error;

    fn load_with_keys(
        &mut self,
        sql: &str,
    ) -> Result<Vec<(String, Self::Row)>, diesel::result::Error> {
        let rows: Vec<R> = diesel::sql_query(sql.to_owned()).load(&mut *self.conn)?;
        Ok(rows
            .into_iter()
            .map(|row| (row.spatial_ids().to_owned(), row))
            .collect())
    }

    fn max_in_clause_size(&self) -> Option<usize> {
        self.in_clause_limit
    }
}
