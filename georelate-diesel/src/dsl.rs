//! Turning core predicates and orderings into Diesel expressions.
//!
//! The core keeps bind values out-of-line; here they are rendered inline
//! with backend quoting and wrapped in `SqlLiteral` fragments, which is the
//! same bind-free shape the association scopes use (scope caching and
//! non-equality join conditions don't mix with prepared-statement binds).
//!
//! ```rust,ignore
//! use georelate_diesel::prelude::*;
//!
//! let predicate = spatial
//!     .scope(&bars)
//!     .filter("intersects", Some(&operand), &ScopeOptions::default())?
//!     .unwrap();
//!
//! bars::table
//!     .spatial_filter(&predicate, &PgQuoting)
//!     .load(&mut conn)?;
//! ```

use diesel::dsl;
use diesel::expression::SqlLiteral;
use diesel::query_dsl::methods::{FilterDsl, OrderDsl};
use diesel::sql_types::{Bool, Text};

use georelate_core::backend::SqlQuoting;
use georelate_core::function::Predicate;
use georelate_core::scopes::OrderExpression;

/// Render a core predicate as a Diesel boolean expression.
pub fn filter_sql(predicate: &Predicate, quoting: &dyn SqlQuoting) -> SqlLiteral<Bool> {
    dsl::sql::<Bool>(&predicate.to_sql_inline(quoting))
}

/// Render a core ordering as a Diesel `ORDER BY` expression.
pub fn order_sql(order: &OrderExpression, quoting: &dyn SqlQuoting) -> SqlLiteral<Text> {
    dsl::sql::<Text>(&order.to_sql_inline(quoting))
}

/// Method-style access to spatial scopes on any Diesel query.
pub trait SpatialQueryDsl: Sized {
    /// Filter by a compiled spatial predicate.
    fn spatial_filter(
        self,
        predicate: &Predicate,
        quoting: &dyn SqlQuoting,
    ) -> dsl::Filter<Self, SqlLiteral<Bool>>
    where
        Self: FilterDsl<SqlLiteral<Bool>>,
    {
        FilterDsl::filter(self, filter_sql(predicate, quoting))
    }

    /// Order by a compiled spatial measurement.
    fn spatial_order(
        self,
        order: &OrderExpression,
        quoting: &dyn SqlQuoting,
    ) -> dsl::Order<Self, SqlLiteral<Text>>
    where
        Self: OrderDsl<SqlLiteral<Text>>,
    {
        OrderDsl::order(self, order_sql(order, quoting))
    }
}

impl<T: Sized> SpatialQueryDsl for T {}
