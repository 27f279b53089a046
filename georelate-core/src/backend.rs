//! The database boundary: quoting and query execution.
//!
//! The core never talks to a connection directly. It quotes identifiers and
//! literals through [`SqlQuoting`] and hands finished SQL to a
//! [`SpatialExecutor`], which the integration crates (or tests) implement.

/// Identifier and literal quoting for the target database.
pub trait SqlQuoting {
    fn quote_identifier(&self, ident: &str) -> String;
    fn quote_literal(&self, value: &str) -> String;
}

/// PostgreSQL-style quoting: `"ident"` with doubled quotes, `'literal'`
/// with doubled single quotes.
#[derive(Debug, Default, Clone, Copy)]
pub struct PgQuoting;

impl SqlQuoting for PgQuoting {
    fn quote_identifier(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    fn quote_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }
}

/// Runs batched association queries.
///
/// `load_with_keys` executes one SQL statement and returns, per result row,
/// the aggregated owner-key list (the `__spatial_ids__` column) alongside
/// the row itself. `max_in_clause_size` bounds how many owner keys a single
/// statement may name; `None` means unbounded.
pub trait SpatialExecutor {
    type Row: Clone;
    type Error: std::fmt::Debug + std::fmt::Display;

    fn load_with_keys(
        &mut self,
        sql: &str,
    ) -> std::result::Result<Vec<(String, Self::Row)>, Self::Error>;

    fn max_in_clause_size(&self) -> Option<usize> {
        None
    }
}
