//! Data sources that reports aggregate over.
//!
//! The engine never talks to storage directly. Every aggregation kind reduces
//! to an [`AggregateQuery`]: a [`Scope`] (table plus filter), the date column
//! that places records in time, and a [`Measure`]. A [`DataSource`] answers
//! that query for a [`Window`] of time.
//!
//! Two sources ship with the crate:
//!
//! - [`MemorySource`] holds JSON records in process and computes everything in
//!   Rust. Good for tests, demos and small datasets.
//! - `DataFusionSource` (feature `datafusion-source`) runs SQL against tables
//!   registered in a DataFusion `SessionContext`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt::{self, Debug};

use crate::column::Column;
use crate::error::Result;

mod memory;
#[cfg(feature = "datafusion-source")]
mod sql;

pub use memory::MemorySource;
#[cfg(feature = "datafusion-source")]
pub use sql::DataFusionSource;

/// Aggregated value per column key. `None` means no records matched.
pub type BucketMap = BTreeMap<String, Option<f64>>;

/// A single filter condition on a record field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Equals(String, JsonValue),
    NotEquals(String, JsonValue),
    IsNull(String),
    IsNotNull(String),
    In(String, Vec<JsonValue>),
}

impl Condition {
    /// Field the condition applies to.
    pub fn field(&self) -> &str {
        match self {
            Condition::Equals(f, _)
            | Condition::NotEquals(f, _)
            | Condition::IsNull(f)
            | Condition::IsNotNull(f)
            | Condition::In(f, _) => f,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Equals(field, v) => write!(f, "{field} = {v}"),
            Condition::NotEquals(field, v) => write!(f, "{field} != {v}"),
            Condition::IsNull(field) => write!(f, "{field} IS NULL"),
            Condition::IsNotNull(field) => write!(f, "{field} IS NOT NULL"),
            Condition::In(field, values) => {
                let list: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "{field} IN ({})", list.join(", "))
            }
        }
    }
}

/// A table plus the conditions its records must satisfy.
///
/// ```rust
/// use timely_report::sources::Scope;
///
/// let scope = Scope::new("orders")
///     .where_eq("status", "paid")
///     .where_not_null("shipped_at");
/// assert_eq!(scope.to_string(), "orders WHERE status = \"paid\" AND shipped_at IS NOT NULL");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scope {
    table: String,
    conditions: Vec<Condition>,
}

impl Scope {
    /// Creates a scope matching every record of `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            conditions: Vec::new(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Adds an arbitrary condition.
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn where_eq(self, field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.with_condition(Condition::Equals(field.into(), value.into()))
    }

    pub fn where_not_eq(self, field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.with_condition(Condition::NotEquals(field.into(), value.into()))
    }

    pub fn where_null(self, field: impl Into<String>) -> Self {
        self.with_condition(Condition::IsNull(field.into()))
    }

    pub fn where_not_null(self, field: impl Into<String>) -> Self {
        self.with_condition(Condition::IsNotNull(field.into()))
    }

    pub fn where_in<I, V>(self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<JsonValue>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.with_condition(Condition::In(field.into(), values))
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.table)?;
        for (i, condition) in self.conditions.iter().enumerate() {
            let joiner = if i == 0 { " WHERE " } else { " AND " };
            write!(f, "{joiner}{condition}")?;
        }
        Ok(())
    }
}

/// The quantity computed over the records of a window.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Measure {
    /// Number of records.
    Count,
    /// Number of records whose field is non-null and non-empty.
    CountPresent(String),
    /// Sum of a numeric field.
    Sum(String),
    /// Arithmetic mean of a numeric field.
    Mean(String),
    /// Population standard deviation of a numeric field.
    StdDev(String),
    /// Mean calendar-day difference between two date fields.
    MeanDaysBetween(String, String),
    /// Mean whole-minute difference between two timestamps, in hours.
    MeanHoursBetween(String, String),
    /// Mean weekday hours between two timestamps.
    MeanWeekHoursBetween(String, String),
}

impl Measure {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Measure::Count => "count",
            Measure::CountPresent(_) => "count_present",
            Measure::Sum(_) => "sum",
            Measure::Mean(_) => "mean",
            Measure::StdDev(_) => "stddev",
            Measure::MeanDaysBetween(..) => "mean_days_between",
            Measure::MeanHoursBetween(..) => "mean_hours_between",
            Measure::MeanWeekHoursBetween(..) => "mean_week_hours_between",
        }
    }

    /// Fields read by the measure, in argument order.
    pub fn fields(&self) -> Vec<&str> {
        match self {
            Measure::Count => vec![],
            Measure::CountPresent(f) | Measure::Sum(f) | Measure::Mean(f) | Measure::StdDev(f) => {
                vec![f.as_str()]
            }
            Measure::MeanDaysBetween(a, b)
            | Measure::MeanHoursBetween(a, b)
            | Measure::MeanWeekHoursBetween(a, b) => vec![a.as_str(), b.as_str()],
        }
    }
}

/// What to aggregate, independent of the time window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateQuery {
    pub scope: Scope,
    pub date_column: String,
    pub measure: Measure,
}

impl AggregateQuery {
    pub fn new(scope: Scope, date_column: impl Into<String>, measure: Measure) -> Self {
        Self {
            scope,
            date_column: date_column.into(),
            measure,
        }
    }
}

/// A half-open time window. An open start means "since the beginning".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: Option<DateTime<Utc>>,
    pub end: DateTime<Utc>,
}

impl Window {
    /// `[start, end)`
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end,
        }
    }

    /// Everything strictly before `end`.
    pub fn before(end: DateTime<Utc>) -> Self {
        Self { start: None, end }
    }

    /// Returns true if `t` falls inside the window.
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t < self.end && self.start.map_or(true, |s| s <= t)
    }
}

impl From<&Column> for Window {
    fn from(column: &Column) -> Self {
        Window::between(column.starts_at(), column.ends_at())
    }
}

/// A queryable dataset that reports aggregate over.
///
/// Implementations must be idempotent: the same query over the same closed
/// window always returns the same value. Errors propagate unmodified to the
/// report caller; the engine never retries.
///
/// # Examples
///
/// ```rust,ignore
/// use timely_report::sources::{AggregateQuery, DataSource, Measure, Scope, Window};
///
/// # async fn example(source: &dyn DataSource) -> timely_report::error::Result<()> {
/// let query = AggregateQuery::new(Scope::new("orders"), "created_at", Measure::Count);
/// let count = source.aggregate(&query, &Window::before(chrono::Utc::now())).await?;
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait DataSource: Debug + Send + Sync {
    /// Computes one measure over the records of `window`.
    ///
    /// Counts return `Some(0.0)` for an empty window; every other measure
    /// returns `None` when no record contributes.
    async fn aggregate(&self, query: &AggregateQuery, window: &Window) -> Result<Option<f64>>;

    /// Computes one measure per column, keyed by [`Column::key`].
    ///
    /// The default issues one [`aggregate`](DataSource::aggregate) call per
    /// column with at most `max_concurrency` in flight. Sources that can group
    /// in a single pass should override it.
    async fn aggregate_buckets(
        &self,
        query: &AggregateQuery,
        columns: &[Column],
        max_concurrency: usize,
    ) -> Result<BucketMap> {
        let futures: Vec<_> = columns
            .iter()
            .map(|column| async move {
                let value = self.aggregate(query, &Window::from(column)).await?;
                Ok::<_, crate::error::ReportError>((column.key(), value))
            })
            .collect();
        let results: Vec<(String, Option<f64>)> = stream::iter(futures)
            .buffered(max_concurrency.max(1))
            .try_collect()
            .await?;

        Ok(results.into_iter().collect())
    }

    /// Number of matching records strictly before `t`.
    async fn count_before(&self, scope: &Scope, date_column: &str, t: DateTime<Utc>) -> Result<i64> {
        let query = AggregateQuery::new(scope.clone(), date_column, Measure::Count);
        let count = self.aggregate(&query, &Window::before(t)).await?;
        Ok(count.unwrap_or(0.0) as i64)
    }

    /// Returns a human-readable description of this data source.
    fn description(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_scope_display() {
        let scope = Scope::new("orders")
            .where_in("region", ["eu", "us"])
            .where_null("refunded_at")
            .where_not_eq("total", 0);
        assert_eq!(
            scope.to_string(),
            "orders WHERE region IN (\"eu\", \"us\") AND refunded_at IS NULL AND total != 0"
        );
    }

    #[test]
    fn test_measure_fields() {
        assert!(Measure::Count.fields().is_empty());
        assert_eq!(Measure::Sum("amount".into()).fields(), vec!["amount"]);
        assert_eq!(
            Measure::MeanDaysBetween("created_at".into(), "shipped_at".into()).fields(),
            vec!["created_at", "shipped_at"]
        );
    }

    #[test]
    fn test_window_contains() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();

        let window = Window::between(start, end);
        assert!(window.contains(start));
        assert!(!window.contains(end));

        let open = Window::before(end);
        assert!(open.contains(Utc.with_ymd_and_hms(1999, 1, 1, 0, 0, 0).unwrap()));
    }
}
