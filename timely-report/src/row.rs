//! Row definitions and their resolved form.
//!
//! A [`RowSpec`] is what callers declare: a title, an aggregation tag with
//! its column arguments, a scope and options. When a report is built each
//! spec is resolved into a [`Row`]: the tag is looked up in the
//! [`FunctionRegistry`] (failing on unknown tags or a wrong argument count),
//! a dynamic scope is evaluated against the report parameters, and defaults
//! are taken from the [`ReportConfig`].

use std::fmt;
use std::sync::Arc;

use crate::config::ReportConfig;
use crate::error::{ErrorContext, ReportError, Result};
use crate::functions::{AggregationFunction, BucketValues, FunctionRegistry, FunctionRequest};
use crate::report::ReportParams;
use crate::sources::Scope;
use crate::text::cache_slug;
use crate::value::{Transform, Value};

/// Builds a row's scope from the report parameters.
pub type ScopeFn = Arc<dyn Fn(&ReportParams) -> Scope + Send + Sync>;

/// User function applied to every value of a row, last.
pub type ValueMap = Arc<dyn Fn(Value) -> Value + Send + Sync>;

#[derive(Clone)]
enum ScopeSource {
    Fixed(Scope),
    Dynamic(ScopeFn),
}

/// Declaration of one aggregate row.
///
/// # Example
///
/// ```rust
/// use timely_report::row::RowSpec;
/// use timely_report::sources::Scope;
/// use timely_report::value::Transform;
///
/// let orders = RowSpec::new("Orders", "count", Scope::new("orders"));
/// let value = RowSpec::new("Avg. value", "average", Scope::new("orders"))
///     .arg("amount")
///     .transform(Transform::RoundTo(1));
/// let eu = RowSpec::new("EU orders", "count", Scope::new("orders"))
///     .scope_fn(|params| {
///         Scope::new("orders").where_eq("region", params.get_str("region").unwrap_or("eu"))
///     });
/// # let _ = (orders, value, eu);
/// ```
#[derive(Clone)]
pub struct RowSpec {
    title: String,
    kind: String,
    args: Vec<String>,
    scope: ScopeSource,
    date_column: Option<String>,
    transform: Option<Transform>,
    hidden: bool,
    percentage_of: Option<String>,
    map: Option<ValueMap>,
    cacheable: bool,
}

impl RowSpec {
    /// Declares a row aggregating `kind` over `scope`.
    pub fn new(title: impl Into<String>, kind: impl Into<String>, scope: Scope) -> Self {
        Self {
            title: title.into(),
            kind: kind.into(),
            args: Vec::new(),
            scope: ScopeSource::Fixed(scope),
            date_column: None,
            transform: None,
            hidden: false,
            percentage_of: None,
            map: None,
            cacheable: true,
        }
    }

    /// Appends one column argument.
    pub fn arg(mut self, column: impl Into<String>) -> Self {
        self.args.push(column.into());
        self
    }

    /// Replaces all column arguments.
    pub fn args<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Computes the scope from the report parameters instead of using a
    /// fixed one.
    pub fn scope_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&ReportParams) -> Scope + Send + Sync + 'static,
    {
        self.scope = ScopeSource::Dynamic(Arc::new(f));
        self
    }

    /// Column placing records in time. Defaults to the configured one.
    pub fn date_column(mut self, column: impl Into<String>) -> Self {
        self.date_column = Some(column.into());
        self
    }

    /// Overrides the aggregation's default transform.
    pub fn transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Keeps the row out of the output while summaries can still use it.
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Shows this row as a percentage of `reference` instead of raw values.
    pub fn percentage_of(mut self, reference: impl Into<String>) -> Self {
        self.percentage_of = Some(reference.into());
        self
    }

    /// Applies `f` to every value after the transform.
    pub fn map<F>(mut self, f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.map = Some(Arc::new(f));
        self
    }

    /// Never reads or writes the cache for this row.
    pub fn not_cacheable(mut self) -> Self {
        self.cacheable = false;
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub(crate) fn percentage_reference(&self) -> Option<&str> {
        self.percentage_of.as_deref()
    }

    /// Validates the declaration and binds it to a function and a scope.
    pub fn resolve(
        &self,
        registry: &FunctionRegistry,
        config: &ReportConfig,
        params: &ReportParams,
    ) -> Result<Row> {
        if self.title.trim().is_empty() {
            return Err(ReportError::configuration("row title must not be empty"));
        }
        let function = registry
            .resolve(&self.kind, self.args.len())
            .row_context(&self.title)?;

        let scope = match &self.scope {
            ScopeSource::Fixed(scope) => scope.clone(),
            ScopeSource::Dynamic(f) => f(params),
        };

        Ok(Row {
            title: self.title.clone(),
            transform: self
                .transform
                .unwrap_or_else(|| function.default_transform()),
            function,
            args: self.args.clone(),
            scope,
            date_column: self
                .date_column
                .clone()
                .unwrap_or_else(|| config.default_date_column.clone()),
            hidden: self.hidden || self.percentage_of.is_some(),
            map: self.map.clone(),
            cacheable: self.cacheable,
        })
    }
}

impl fmt::Debug for RowSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowSpec")
            .field("title", &self.title)
            .field("kind", &self.kind)
            .field("args", &self.args)
            .field("dynamic_scope", &matches!(self.scope, ScopeSource::Dynamic(_)))
            .field("date_column", &self.date_column)
            .field("transform", &self.transform)
            .field("hidden", &self.hidden)
            .field("percentage_of", &self.percentage_of)
            .field("cacheable", &self.cacheable)
            .finish()
    }
}

/// A row bound to its aggregation function and scope.
#[derive(Clone)]
pub struct Row {
    title: String,
    function: Arc<dyn AggregationFunction>,
    args: Vec<String>,
    scope: Scope,
    date_column: String,
    transform: Transform,
    hidden: bool,
    map: Option<ValueMap>,
    cacheable: bool,
}

impl Row {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn function(&self) -> &dyn AggregationFunction {
        self.function.as_ref()
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn date_column(&self) -> &str {
        &self.date_column
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn is_cacheable(&self) -> bool {
        self.cacheable
    }

    /// Row part of a cell fingerprint: `title.kind[.arg-arg]`, with the
    /// title in [`cache_slug`] form.
    pub fn cache_key(&self) -> String {
        let mut key = format!("{}.{}", cache_slug(&self.title), self.function.name());
        if !self.args.is_empty() {
            key.push('.');
            key.push_str(&self.args.join("-"));
        }
        key
    }

    /// Request handed to the aggregation function.
    pub fn request(&self, max_concurrency: usize) -> FunctionRequest {
        FunctionRequest {
            scope: self.scope.clone(),
            date_column: self.date_column.clone(),
            args: self.args.clone(),
            max_concurrency,
        }
    }

    /// Turns a raw aggregate into the displayed value: transform, then map.
    pub fn finish(&self, raw: Value, precision: u32) -> Value {
        let value = self.transform.apply(raw, precision);
        match &self.map {
            Some(f) => f(value).normalized(),
            None => value,
        }
    }

    /// Applies [`Row::finish`] to every bucket.
    pub fn finish_all(&self, raw: BucketValues, precision: u32) -> BucketValues {
        raw.into_iter()
            .map(|(key, value)| (key, self.finish(value, precision)))
            .collect()
    }
}

impl fmt::Debug for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Row")
            .field("title", &self.title)
            .field("function", &self.function.name())
            .field("args", &self.args)
            .field("scope", &self.scope.to_string())
            .field("date_column", &self.date_column)
            .field("transform", &self.transform)
            .field("hidden", &self.hidden)
            .field("cacheable", &self.cacheable)
            .finish()
    }
}

/// Materialized values of a row or summary row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowValues {
    /// One value per column, keyed by bucket key
    pub buckets: BucketValues,
    /// Value of the totals column, when totals are shown
    pub total: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(spec: &RowSpec) -> Result<Row> {
        resolve_with(spec, &ReportParams::new())
    }

    fn resolve_with(spec: &RowSpec, params: &ReportParams) -> Result<Row> {
        spec.resolve(&FunctionRegistry::default(), &ReportConfig::default(), params)
    }

    #[test]
    fn test_defaults_come_from_function_and_config() {
        let row = resolve(&RowSpec::new("Revenue", "sum", Scope::new("orders")).arg("amount")).unwrap();
        assert_eq!(row.transform(), Transform::Truncate);
        assert_eq!(row.date_column(), "created_at");
        assert_eq!(row.cache_key(), "revenue.sum.amount");
        assert!(row.is_cacheable());
        assert!(!row.is_hidden());
    }

    #[test]
    fn test_unknown_kind_and_arity_fail_at_definition() {
        let err = resolve(&RowSpec::new("Median", "median", Scope::new("orders"))).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("Median"));

        let err = resolve(
            &RowSpec::new("Lead time", "avg_days_between", Scope::new("orders")).arg("created_at"),
        )
        .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_dynamic_scope_uses_params() {
        let spec = RowSpec::new("Orders", "count", Scope::new("orders")).scope_fn(|params| {
            Scope::new("orders").where_eq("region", params.get_str("region").unwrap_or("any"))
        });
        let row = resolve_with(&spec, &ReportParams::new().with("region", "eu")).unwrap();
        assert_eq!(row.scope().to_string(), "orders WHERE region = \"eu\"");
    }

    #[test]
    fn test_finish_applies_transform_then_map() {
        let row = resolve(
            &RowSpec::new("Avg", "average", Scope::new("orders"))
                .arg("amount")
                .map(|v| v.multiply(Value::Long(10))),
        )
        .unwrap();
        // rounds 1.234 to 1.23 first, then scales
        assert_eq!(row.finish(Value::Double(1.234), 2), Value::Double(12.3));
        assert_eq!(row.finish(Value::Double(1.2), 2), Value::Long(12));
    }

    #[test]
    fn test_percentage_row_is_hidden() {
        let row = resolve(&RowSpec::new("Paid", "count", Scope::new("orders")).percentage_of("Orders"))
            .unwrap();
        assert!(row.is_hidden());
    }
}
