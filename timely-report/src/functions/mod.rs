//! Aggregation functions: how each row kind turns windows into values.
//!
//! Every row of a report is bound to one [`AggregationFunction`]. A function
//! knows which [`Measure`] it asks the data source for, how many column
//! arguments it takes, which transform its values get by default, and how
//! its value in the totals column is obtained.
//!
//! Functions are looked up by tag in a [`FunctionRegistry`]; an unknown tag or
//! a wrong argument count is rejected when the row is defined, before any
//! query runs.
//!
//! ## Built-in kinds
//!
//! | tag | args | per bucket | total |
//! |-----|------|------------|-------|
//! | `count` | 0 | records in bucket | sum of buckets |
//! | `cumulative` | 0 | all records up to bucket end | last bucket |
//! | `present` | 1 | records with a non-empty field | sum of buckets |
//! | `sum` | 1 | field sum, truncated | sum of buckets |
//! | `average` | 1 | field mean, rounded | recomputed over the full window |
//! | `standard_deviation` | 1 | population stddev, rounded | recomputed |
//! | `avg_days_between` | 2 | mean day difference, rounded | recomputed |
//! | `avg_hours_between` | 2 | mean hour difference, rounded | recomputed |
//! | `avg_week_hours_between` | 2 | mean weekday hours, rounded | recomputed |
//! | `total_count` | 0 | all records before bucket end | value at report end |
//! | `total_sum` | 1 | field sum before bucket end, truncated | value at report end |

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::column::Column;
use crate::error::Result;
use crate::sources::{AggregateQuery, DataSource, Measure, Scope, Window};
use crate::value::{Transform, Value};

pub mod advanced;
pub mod basic;
mod registry;

pub use registry::FunctionRegistry;

/// Values keyed by column bucket key.
pub type BucketValues = BTreeMap<String, Value>;

/// How a function fills the totals column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotalStrategy {
    /// Add up the bucket values.
    SumOfBuckets,
    /// Take the value of the last bucket.
    LastBucket,
    /// Query the source again over the whole report window.
    Recompute,
}

/// Everything a function needs to know about the row it evaluates.
#[derive(Debug, Clone)]
pub struct FunctionRequest {
    /// Records the row aggregates over
    pub scope: Scope,
    /// Column placing each record in time
    pub date_column: String,
    /// Column arguments, already checked against the function's arity
    pub args: Vec<String>,
    /// Upper bound on concurrent source queries
    pub max_concurrency: usize,
}

impl FunctionRequest {
    /// Builds the source query for `measure`.
    pub fn query(&self, measure: Measure) -> AggregateQuery {
        AggregateQuery::new(self.scope.clone(), self.date_column.clone(), measure)
    }

    /// Column argument at `idx`, empty if absent.
    pub fn arg(&self, idx: usize) -> String {
        self.args.get(idx).cloned().unwrap_or_default()
    }
}

/// One aggregation kind.
///
/// Implementations return *raw* values; the owning row applies the transform
/// and any user map afterwards.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use timely_report::functions::{AggregationFunction, FunctionRequest};
/// use timely_report::sources::Measure;
///
/// #[derive(Debug)]
/// struct RefundCount;
///
/// #[async_trait]
/// impl AggregationFunction for RefundCount {
///     fn name(&self) -> &str {
///         "refund_count"
///     }
///
///     fn arity(&self) -> usize {
///         0
///     }
///
///     fn measure(&self, _request: &FunctionRequest) -> Measure {
///         Measure::CountPresent("refunded_at".to_string())
///     }
/// }
/// ```
#[async_trait]
pub trait AggregationFunction: Send + Sync + Debug {
    /// Tag the function is registered under.
    fn name(&self) -> &str;

    /// Returns a description of what this function computes.
    fn description(&self) -> &str {
        ""
    }

    /// Number of column arguments the function takes.
    fn arity(&self) -> usize;

    /// Transform applied to every value unless the row overrides it.
    fn default_transform(&self) -> Transform {
        Transform::None
    }

    /// How the totals column is filled.
    fn total_strategy(&self) -> TotalStrategy {
        TotalStrategy::SumOfBuckets
    }

    /// Measure requested from the data source.
    fn measure(&self, request: &FunctionRequest) -> Measure;

    /// Computes one raw value per column.
    ///
    /// The result holds exactly the keys of `columns`; empty buckets are 0.
    async fn evaluate(
        &self,
        source: &dyn DataSource,
        request: &FunctionRequest,
        columns: &[Column],
    ) -> Result<BucketValues> {
        let query = request.query(self.measure(request));
        let raw = source
            .aggregate_buckets(&query, columns, request.max_concurrency)
            .await?;
        Ok(fill_buckets(columns, |key| raw.get(key).copied().flatten()))
    }

    /// Computes the raw totals value over `span`, the whole report window.
    ///
    /// Only called for [`TotalStrategy::Recompute`].
    async fn evaluate_total(
        &self,
        source: &dyn DataSource,
        request: &FunctionRequest,
        span: &Column,
    ) -> Result<Value> {
        let query = request.query(self.measure(request));
        let value = source.aggregate(&query, &Window::from(span)).await?;
        Ok(value.map_or(Value::ZERO, Value::from_f64))
    }
}

/// Builds a bucket map with one entry per column, defaulting to zero.
pub(crate) fn fill_buckets<F>(columns: &[Column], mut lookup: F) -> BucketValues
where
    F: FnMut(&str) -> Option<f64>,
{
    columns
        .iter()
        .map(|column| {
            let key = column.key();
            let value = lookup(&key).map_or(Value::ZERO, Value::from_f64);
            (key, value)
        })
        .collect()
}
