//! The spatial function call builder.
//!
//! Compiles a (function, column, operand, options) tuple into a
//! [`SpatialFunctionCall`] expression tree and renders it as a
//! [`Predicate`]. Operand resolution handles column wrappers, literal
//! geometry quoting, foreign column references, SRID adjustment wrappers,
//! operand inversion and the null-tolerance disjunction.
//!
//! Resolution order when options combine: wrappers are resolved first, then
//! the fully-resolved operand list is inverted (at most once), then the
//! `OR column IS NULL` disjunction is appended around the whole call.

use crate::backend::SqlQuoting;
use crate::columns::{SchemaCache, SpatialColumnSource, SpatialModel, SpatialType};
use crate::config::SpatialConfig;
use crate::error::Result;
use crate::geometry::{self, GeometryInput, GeometryValue};
use crate::srid::{reconcile, SridAction};
use crate::version::PostgisVersion;

/// A value bound into generated SQL.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl BindValue {
    /// Render as a safely-quoted inline literal.
    pub fn render_inline(&self, quoting: &dyn SqlQuoting) -> String {
        match self {
            BindValue::Int(i) => i.to_string(),
            BindValue::Float(f) => f.to_string(),
            BindValue::Text(t) => quoting.quote_literal(t),
        }
    }
}

impl From<i64> for BindValue {
    fn from(v: i64) -> Self {
        BindValue::Int(v)
    }
}

impl From<i32> for BindValue {
    fn from(v: i32) -> Self {
        BindValue::Int(v.into())
    }
}

impl From<f64> for BindValue {
    fn from(v: f64) -> Self {
        BindValue::Float(v)
    }
}

impl From<&str> for BindValue {
    fn from(v: &str) -> Self {
        BindValue::Text(v.to_owned())
    }
}

impl From<String> for BindValue {
    fn from(v: String) -> Self {
        BindValue::Text(v)
    }
}

/// A SQL boolean expression with its bind values kept out-of-line.
///
/// The SQL is stored as fragments with one bind slot between consecutive
/// fragments, so it can be rendered with `$n` placeholders, `?`
/// placeholders, or inline quoted literals depending on the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    fragments: Vec<String>,
    binds: Vec<BindValue>,
}

impl Predicate {
    pub fn new() -> Self {
        Self {
            fragments: vec![String::new()],
            binds: Vec::new(),
        }
    }

    pub fn from_sql(sql: impl Into<String>) -> Self {
        Self {
            fragments: vec![sql.into()],
            binds: Vec::new(),
        }
    }

    pub fn push_sql(&mut self, sql: &str) {
        // fragments is never empty by construction
        if let Some(last) = self.fragments.last_mut() {
            last.push_str(sql);
        }
    }

    pub fn push_bind(&mut self, bind: BindValue) {
        self.binds.push(bind);
        self.fragments.push(String::new());
    }

    pub fn binds(&self) -> &[BindValue] {
        &self.binds
    }

    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    /// AND-combine with another predicate.
    pub fn and(mut self, other: Predicate) -> Predicate {
        let mut fragments = other.fragments.into_iter();
        if let (Some(last), Some(first)) = (self.fragments.last_mut(), fragments.next()) {
            last.push_str(" AND ");
            last.push_str(&first);
        }
        self.fragments.extend(fragments);
        self.binds.extend(other.binds);
        self
    }

    /// Render with numbered placeholders, starting at `$start`.
    pub fn to_sql_numbered(&self, start: usize) -> String {
        let mut out = String::new();
        for (i, fragment) in self.fragments.iter().enumerate() {
            if i > 0 {
                out.push_str(&format!("${}", start + i - 1));
            }
            out.push_str(fragment);
        }
        out
    }

    /// Render with `?` placeholders.
    pub fn to_sql_placeholders(&self) -> String {
        self.fragments.join("?")
    }

    /// Render with bind values inlined as quoted literals.
    pub fn to_sql_inline(&self, quoting: &dyn SqlQuoting) -> String {
        let mut out = String::new();
        for (i, fragment) in self.fragments.iter().enumerate() {
            if i > 0 {
                out.push_str(&self.binds[i - 1].render_inline(quoting));
            }
            out.push_str(fragment);
        }
        out
    }
}

impl Default for Predicate {
    fn default() -> Self {
        Self::new()
    }
}

/// A named SQL function wrapped around a column or geometry operand, e.g.
/// `envelope` or `buffer` with a distance argument.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionWrapper {
    pub name: String,
    pub args: Vec<BindValue>,
}

impl FunctionWrapper {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(name: impl Into<String>, args: Vec<BindValue>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// Names the table-side column a scope operates on, optionally wrapped.
/// A `None` name falls back to the configured default column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnSpec {
    pub name: Option<String>,
    pub wrapper: Option<FunctionWrapper>,
}

impl ColumnSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            wrapper: None,
        }
    }

    pub fn wrapped(self, wrapper: FunctionWrapper) -> Self {
        Self {
            wrapper: Some(wrapper),
            ..self
        }
    }

    pub(crate) fn name_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.name.as_deref().unwrap_or(default)
    }
}

impl From<&str> for ColumnSpec {
    fn from(name: &str) -> Self {
        ColumnSpec::named(name)
    }
}

impl From<String> for ColumnSpec {
    fn from(name: String) -> Self {
        ColumnSpec::named(name)
    }
}

/// Where a comparison operand comes from.
#[derive(Debug, Clone)]
pub enum OperandSource<'a> {
    /// An already-parsed geometry value.
    Value(&'a GeometryValue),
    /// Raw geometry input, parsed at build time (with `SRID=default;`
    /// substitution against the scoped column).
    Raw(GeometryInput<'a>),
    /// A column on another table, for joins.
    Column {
        model: &'a SpatialModel,
        column: Option<String>,
        table_alias: Option<String>,
    },
}

/// The comparison-side operand of a spatial function call.
#[derive(Debug, Clone)]
pub struct GeometryOperand<'a> {
    pub source: OperandSource<'a>,
    pub wrapper: Option<FunctionWrapper>,
}

impl<'a> GeometryOperand<'a> {
    pub fn value(value: &'a GeometryValue) -> Self {
        Self {
            source: OperandSource::Value(value),
            wrapper: None,
        }
    }

    pub fn raw(input: impl Into<GeometryInput<'a>>) -> Self {
        Self {
            source: OperandSource::Raw(input.into()),
            wrapper: None,
        }
    }

    /// The default geometry column of another model.
    pub fn column(model: &'a SpatialModel) -> Self {
        Self {
            source: OperandSource::Column {
                model,
                column: None,
                table_alias: None,
            },
            wrapper: None,
        }
    }

    pub fn column_named(model: &'a SpatialModel, column: impl Into<String>) -> Self {
        Self {
            source: OperandSource::Column {
                model,
                column: Some(column.into()),
                table_alias: None,
            },
            wrapper: None,
        }
    }

    /// Reference the column through a table alias instead of its table name.
    pub fn aliased(mut self, alias: impl Into<String>) -> Self {
        if let OperandSource::Column { table_alias, .. } = &mut self.source {
            *table_alias = Some(alias.into());
        }
        self
    }

    pub fn wrapped(mut self, wrapper: FunctionWrapper) -> Self {
        self.wrapper = Some(wrapper);
        self
    }
}

impl<'a> From<&'a str> for GeometryOperand<'a> {
    fn from(text: &'a str) -> Self {
        GeometryOperand::raw(text)
    }
}

impl<'a> From<&'a GeometryValue> for GeometryOperand<'a> {
    fn from(value: &'a GeometryValue) -> Self {
        GeometryOperand::value(value)
    }
}

/// Options recognised by every scope and by the builder itself.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeOptions {
    pub column: ColumnSpec,
    /// `ST_` (index-using) vs `_ST_` (non-index) function variants.
    pub use_index: bool,
    /// OR the predicate with `column IS NULL`.
    pub allow_null: bool,
    /// Flip the operand order from `f(A, B)` to `f(B, A)`.
    pub invert: bool,
}

impl Default for ScopeOptions {
    fn default() -> Self {
        Self {
            column: ColumnSpec::default(),
            use_index: true,
            allow_null: false,
            invert: false,
        }
    }
}

impl ScopeOptions {
    pub fn inverted() -> Self {
        Self {
            invert: true,
            ..Self::default()
        }
    }

    pub fn on_column(column: impl Into<ColumnSpec>) -> Self {
        Self {
            column: column.into(),
            ..Self::default()
        }
    }
}

/// A compiled spatial function call, ready to render.
///
/// Operand order already reflects any inversion; at least the table's own
/// column is always present.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialFunctionCall {
    /// Full SQL function name, `ST_`/`_ST_` prefix included.
    pub function: String,
    /// Rendered operand expressions, in emission order.
    pub operands: Vec<String>,
    /// Trailing arguments kept as bind slots.
    pub trailing: Vec<BindValue>,
    /// Own-column reference for the `OR ... IS NULL` augmentation.
    pub or_null_column: Option<String>,
}

impl SpatialFunctionCall {
    pub fn to_predicate(&self) -> Predicate {
        let mut predicate = Predicate::new();
        if self.or_null_column.is_some() {
            predicate.push_sql("(");
        }
        predicate.push_sql(&self.function);
        predicate.push_sql("(");
        predicate.push_sql(&self.operands.join(", "));
        for bind in &self.trailing {
            predicate.push_sql(", ");
            predicate.push_bind(bind.clone());
        }
        predicate.push_sql(")");
        if let Some(column) = &self.or_null_column {
            predicate.push_sql(&format!(" OR {column} IS NULL)"));
        }
        predicate
    }
}

/// `ST_`-prefix a function token, or `_ST_` for the non-index variant.
pub fn function_name(function: &str, use_index: bool) -> String {
    if use_index {
        format!("ST_{function}")
    } else {
        format!("_ST_{function}")
    }
}

/// Everything the builder needs to resolve operands for one model.
#[derive(Clone, Copy)]
pub struct FunctionCallBuilder<'a> {
    pub version: PostgisVersion,
    pub config: &'a SpatialConfig,
    pub schema: &'a SchemaCache,
    pub source: &'a dyn SpatialColumnSource,
    pub quoting: &'a dyn SqlQuoting,
    pub model: &'a SpatialModel,
}

impl<'a> FunctionCallBuilder<'a> {
    /// Compile one spatial function call.
    ///
    /// `function` is the bare catalog token (`intersects`, `area`,
    /// `GeometryType`, …); `trailing` arguments become bind slots after the
    /// geometry operands.
    pub fn build(
        &self,
        function: &str,
        operand: Option<&GeometryOperand<'_>>,
        trailing: &[BindValue],
        options: &ScopeOptions,
    ) -> Result<SpatialFunctionCall> {
        let column_name = options.column.name_or(&self.config.default_column_name);
        let descriptor =
            self.schema
                .column_by_name(self.source, &self.model.table_name, column_name)?;

        let own_column_ref = self.qualified_column(&self.model.table_name, column_name);
        let own_operand = self.wrap(own_column_ref.clone(), options.column.wrapper.as_ref());

        let mut operands = vec![own_operand];

        if let Some(operand) = operand {
            let resolved = match &operand.source {
                OperandSource::Value(value) => {
                    self.literal_operand(value, descriptor.srid, descriptor.spatial_type)?
                }
                OperandSource::Raw(input) => {
                    let value = geometry::read_with_column_srid(*input, descriptor.srid)?;
                    self.literal_operand(&value, descriptor.srid, descriptor.spatial_type)?
                }
                OperandSource::Column {
                    model,
                    column,
                    table_alias,
                } => {
                    let foreign_column = column
                        .as_deref()
                        .unwrap_or(&self.config.default_column_name);
                    let geom_srid =
                        self.schema
                            .srid_for(self.source, &model.table_name, foreign_column)?;
                    let table = table_alias.as_deref().unwrap_or(&model.table_name);
                    let reference = self.qualified_column(table, foreign_column);
                    self.srid_adjusted(
                        reference,
                        descriptor.srid,
                        geom_srid,
                        descriptor.spatial_type,
                    )
                }
            };
            operands.push(self.wrap(resolved, operand.wrapper.as_ref()));
        }

        // Inversion happens exactly once, after both operands are resolved.
        if options.invert && operands.len() > 1 {
            operands.reverse();
        }

        Ok(SpatialFunctionCall {
            function: function_name(function, options.use_index),
            operands,
            trailing: trailing.to_vec(),
            or_null_column: options.allow_null.then(|| own_column_ref),
        })
    }

    fn qualified_column(&self, table: &str, column: &str) -> String {
        format!(
            "{}.{}",
            self.quoting.quote_identifier(table),
            self.quoting.quote_identifier(column)
        )
    }

    fn literal_operand(
        &self,
        value: &GeometryValue,
        column_srid: i32,
        column_type: SpatialType,
    ) -> Result<String> {
        let quoted = self.quoting.quote_literal(&value.to_ewkb_hex()?);
        let param = format!("{}::{}", quoted, column_type.sql_name());
        let geom_srid = value.effective_srid(column_type, self.version);
        Ok(self.srid_adjusted(param, column_srid, geom_srid, column_type))
    }

    fn srid_adjusted(
        &self,
        expr: String,
        column_srid: i32,
        geom_srid: i32,
        column_type: SpatialType,
    ) -> String {
        match reconcile(column_srid, geom_srid, column_type, self.version) {
            SridAction::Identity => expr,
            SridAction::ForceSrid(srid) => {
                format!("{}({expr}, {srid})", function_name("SetSRID", true))
            }
            SridAction::Reproject(srid) => {
                format!("{}({expr}, {srid})", function_name("Transform", true))
            }
        }
    }

    fn wrap(&self, expr: String, wrapper: Option<&FunctionWrapper>) -> String {
        match wrapper {
            Some(wrapper) => {
                let mut args = vec![expr];
                args.extend(wrapper.args.iter().map(|a| a.render_inline(self.quoting)));
                format!("{}({})", function_name(&wrapper.name, true), args.join(", "))
            }
            None => expr,
        }
    }
}
