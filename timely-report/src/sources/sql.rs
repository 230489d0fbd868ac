//! DataFusion-backed data source.

use arrow::array::{Array, Float64Array, Int64Array};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use datafusion::prelude::SessionContext;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::instrument;

use super::{AggregateQuery, Condition, DataSource, Measure, Scope, Window};
use crate::calendar;
use crate::error::{ReportError, Result};
use crate::log_query;
use crate::logging::{truncate_query, LogConfig};

/// Runs aggregate queries as SQL against a DataFusion [`SessionContext`].
///
/// Tables named by a [`Scope`] must already be registered with the context.
/// Date columns may be timestamps, dates or strings DataFusion can cast to a
/// timestamp; the window filter goes through `to_unixtime`.
///
/// Date-interval measures fetch the raw timestamp pairs and reduce them in
/// Rust so the weekday arithmetic matches every other source exactly.
///
/// # Example
///
/// ```rust,ignore
/// use datafusion::prelude::*;
/// use timely_report::sources::DataFusionSource;
///
/// # async fn example() -> timely_report::error::Result<()> {
/// let ctx = SessionContext::new();
/// ctx.register_csv("orders", "orders.csv", CsvReadOptions::new()).await?;
/// let source = DataFusionSource::new(ctx);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct DataFusionSource {
    ctx: Arc<SessionContext>,
    log_config: LogConfig,
}

impl std::fmt::Debug for DataFusionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataFusionSource")
            .field("log_config", &self.log_config)
            .finish_non_exhaustive()
    }
}

impl DataFusionSource {
    /// Wraps a session context.
    pub fn new(ctx: SessionContext) -> Self {
        Self::from_arc(Arc::new(ctx))
    }

    /// Wraps a shared session context.
    pub fn from_arc(ctx: Arc<SessionContext>) -> Self {
        Self {
            ctx,
            log_config: LogConfig::default(),
        }
    }

    /// Sets the logging configuration for query logging.
    pub fn with_log_config(mut self, log_config: LogConfig) -> Self {
        self.log_config = log_config;
        self
    }

    /// Returns the underlying session context.
    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    async fn scalar(&self, sql: &str) -> Result<Option<f64>> {
        let batches = self.ctx.sql(sql).await?.collect().await?;
        let Some(batch) = batches.iter().find(|b| b.num_rows() > 0) else {
            return Ok(None);
        };

        let column = batch.column(0);
        if column.is_null(0) {
            return Ok(None);
        }
        let values = column
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or_else(|| ReportError::TypeMismatch {
                expected: "Float64".to_string(),
                found: column.data_type().to_string(),
            })?;
        Ok(Some(values.value(0)))
    }

    async fn mean_interval(
        &self,
        sql: &str,
        f: fn(DateTime<Utc>, DateTime<Utc>) -> f64,
    ) -> Result<Option<f64>> {
        let batches = self.ctx.sql(sql).await?.collect().await?;

        let mut total = 0.0;
        let mut count = 0usize;
        for batch in &batches {
            let older = int64_column(batch.column(0))?;
            let newer = int64_column(batch.column(1))?;
            for i in 0..batch.num_rows() {
                if older.is_null(i) || newer.is_null(i) {
                    continue;
                }
                if let (Some(a), Some(b)) = (
                    DateTime::from_timestamp(older.value(i), 0),
                    DateTime::from_timestamp(newer.value(i), 0),
                ) {
                    total += f(a, b);
                    count += 1;
                }
            }
        }

        Ok((count > 0).then(|| total / count as f64))
    }
}

#[async_trait]
impl DataSource for DataFusionSource {
    #[instrument(skip(self, query), fields(table = %query.scope.table(), measure = query.measure.name()))]
    async fn aggregate(&self, query: &AggregateQuery, window: &Window) -> Result<Option<f64>> {
        let sql = build_sql(query, window)?;
        log_query!(
            self.log_config,
            sql = %truncate_query(&sql, self.log_config.max_query_length),
            "Executing aggregate query"
        );

        match &query.measure {
            Measure::MeanDaysBetween(..) => {
                self.mean_interval(&sql, |a, b| calendar::days_between(a, b) as f64)
                    .await
            }
            Measure::MeanHoursBetween(..) => {
                self.mean_interval(&sql, calendar::hours_between).await
            }
            Measure::MeanWeekHoursBetween(..) => {
                self.mean_interval(&sql, calendar::week_hours_between).await
            }
            _ => self.scalar(&sql).await,
        }
    }

    fn description(&self) -> String {
        "DataFusion session".to_string()
    }
}

fn int64_column(column: &Arc<dyn Array>) -> Result<&Int64Array> {
    column
        .as_any()
        .downcast_ref::<Int64Array>()
        .ok_or_else(|| ReportError::TypeMismatch {
            expected: "Int64".to_string(),
            found: column.data_type().to_string(),
        })
}

fn ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn literal(value: &JsonValue) -> Result<String> {
    match value {
        JsonValue::Null => Ok("NULL".to_string()),
        JsonValue::Bool(b) => Ok(if *b { "TRUE" } else { "FALSE" }.to_string()),
        JsonValue::Number(n) => Ok(n.to_string()),
        JsonValue::String(s) => Ok(format!("'{}'", s.replace('\'', "''"))),
        other => Err(ReportError::NotSupported(format!(
            "cannot compare a column against {other}"
        ))),
    }
}

fn condition_sql(condition: &Condition) -> Result<String> {
    Ok(match condition {
        Condition::Equals(f, v) => format!("{} = {}", ident(f), literal(v)?),
        Condition::NotEquals(f, v) => format!("{} <> {}", ident(f), literal(v)?),
        Condition::IsNull(f) => format!("{} IS NULL", ident(f)),
        Condition::IsNotNull(f) => format!("{} IS NOT NULL", ident(f)),
        // IN () is not valid SQL
        Condition::In(_, values) if values.is_empty() => "FALSE".to_string(),
        Condition::In(f, values) => {
            let list = values.iter().map(literal).collect::<Result<Vec<_>>>()?;
            format!("{} IN ({})", ident(f), list.join(", "))
        }
    })
}

fn where_clause(scope: &Scope, date_column: &str, window: &Window, extra: &[String]) -> Result<String> {
    let date = format!("to_unixtime({})", ident(date_column));
    let mut predicates = Vec::new();
    if let Some(start) = window.start {
        predicates.push(format!("{date} >= {}", start.timestamp()));
    }
    predicates.push(format!("{date} < {}", window.end.timestamp()));
    for condition in scope.conditions() {
        predicates.push(condition_sql(condition)?);
    }
    predicates.extend(extra.iter().cloned());
    Ok(predicates.join(" AND "))
}

/// Builds the SQL text for one aggregate query over one window.
pub(crate) fn build_sql(query: &AggregateQuery, window: &Window) -> Result<String> {
    let table = ident(query.scope.table());
    let (select, extra) = match &query.measure {
        Measure::Count => ("CAST(COUNT(*) AS DOUBLE)".to_string(), vec![]),
        Measure::CountPresent(f) => (
            "CAST(COUNT(*) AS DOUBLE)".to_string(),
            vec![
                format!("{} IS NOT NULL", ident(f)),
                format!("CAST({} AS VARCHAR) <> ''", ident(f)),
            ],
        ),
        Measure::Sum(f) => (format!("CAST(SUM({}) AS DOUBLE)", ident(f)), vec![]),
        Measure::Mean(f) => (format!("CAST(AVG({}) AS DOUBLE)", ident(f)), vec![]),
        Measure::StdDev(f) => (format!("CAST(STDDEV_POP({}) AS DOUBLE)", ident(f)), vec![]),
        Measure::MeanDaysBetween(a, b)
        | Measure::MeanHoursBetween(a, b)
        | Measure::MeanWeekHoursBetween(a, b) => (
            format!("to_unixtime({}), to_unixtime({})", ident(a), ident(b)),
            vec![
                format!("{} IS NOT NULL", ident(a)),
                format!("{} IS NOT NULL", ident(b)),
            ],
        ),
    };

    let filter = where_clause(&query.scope, &query.date_column, window, &extra)?;
    Ok(format!("SELECT {select} FROM {table} WHERE {filter}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{StringArray, TimestampSecondArray};
    use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
    use arrow::record_batch::RecordBatch;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    async fn create_test_source() -> DataFusionSource {
        let schema = Arc::new(Schema::new(vec![
            Field::new("created_at", DataType::Timestamp(TimeUnit::Second, None), true),
            Field::new("shipped_at", DataType::Timestamp(TimeUnit::Second, None), true),
            Field::new("amount", DataType::Float64, true),
            Field::new("status", DataType::Utf8, true),
        ]));

        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(TimestampSecondArray::from(vec![
                    Some(at(2024, 1, 5, 10).timestamp()),
                    Some(at(2024, 1, 20, 8).timestamp()),
                    Some(at(2024, 2, 2, 0).timestamp()),
                    None,
                ])),
                Arc::new(TimestampSecondArray::from(vec![
                    Some(at(2024, 1, 8, 10).timestamp()),
                    None,
                    Some(at(2024, 2, 3, 0).timestamp()),
                    None,
                ])),
                Arc::new(Float64Array::from(vec![Some(10.0), Some(30.0), Some(20.0), Some(99.0)])),
                Arc::new(StringArray::from(vec![Some("paid"), Some(""), Some("refunded"), Some("paid")])),
            ],
        )
        .unwrap();

        let ctx = SessionContext::new();
        ctx.register_batch("orders", batch).unwrap();
        DataFusionSource::new(ctx)
    }

    fn query(measure: Measure) -> AggregateQuery {
        AggregateQuery::new(Scope::new("orders"), "created_at", measure)
    }

    #[test]
    fn test_build_sql() {
        let q = AggregateQuery::new(
            Scope::new("orders").where_eq("status", "it's"),
            "created_at",
            Measure::Sum("amount".to_string()),
        );
        let sql = build_sql(&q, &Window::between(at(2024, 1, 1, 0), at(2024, 2, 1, 0))).unwrap();
        assert_eq!(
            sql,
            "SELECT CAST(SUM(\"amount\") AS DOUBLE) FROM \"orders\" WHERE \
             to_unixtime(\"created_at\") >= 1704067200 AND to_unixtime(\"created_at\") < 1706745600 \
             AND \"status\" = 'it''s'"
        );
    }

    #[test]
    fn test_build_sql_rejects_nested_literals() {
        let q = AggregateQuery::new(
            Scope::new("orders").where_eq("meta", json!({"a": 1})),
            "created_at",
            Measure::Count,
        );
        let err = build_sql(&q, &Window::before(at(2024, 1, 1, 0))).unwrap_err();
        assert!(matches!(err, ReportError::NotSupported(_)));
    }

    #[tokio::test]
    async fn test_count_and_sum() {
        let source = create_test_source().await;
        let jan = Window::between(at(2024, 1, 1, 0), at(2024, 2, 1, 0));

        assert_eq!(source.aggregate(&query(Measure::Count), &jan).await.unwrap(), Some(2.0));
        assert_eq!(
            source.aggregate(&query(Measure::Sum("amount".into())), &jan).await.unwrap(),
            Some(40.0)
        );

        let empty = Window::between(at(2023, 1, 1, 0), at(2023, 2, 1, 0));
        assert_eq!(source.aggregate(&query(Measure::Count), &empty).await.unwrap(), Some(0.0));
        assert_eq!(
            source.aggregate(&query(Measure::Mean("amount".into())), &empty).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_present_and_scope() {
        let source = create_test_source().await;
        let all = Window::before(at(2030, 1, 1, 0));

        let present = source
            .aggregate(&query(Measure::CountPresent("status".into())), &all)
            .await
            .unwrap();
        assert_eq!(present, Some(2.0));

        let paid = AggregateQuery::new(
            Scope::new("orders").where_eq("status", "paid"),
            "created_at",
            Measure::Count,
        );
        assert_eq!(source.aggregate(&paid, &all).await.unwrap(), Some(1.0));
    }

    #[tokio::test]
    async fn test_interval_measures() {
        let source = create_test_source().await;
        let all = Window::before(at(2030, 1, 1, 0));

        let days = source
            .aggregate(&query(Measure::MeanDaysBetween("created_at".into(), "shipped_at".into())), &all)
            .await
            .unwrap();
        assert_eq!(days, Some(2.0));

        let hours = source
            .aggregate(&query(Measure::MeanHoursBetween("created_at".into(), "shipped_at".into())), &all)
            .await
            .unwrap();
        assert_eq!(hours, Some(48.0));
    }

    #[tokio::test]
    async fn test_unknown_table_propagates() {
        let source = create_test_source().await;
        let q = AggregateQuery::new(Scope::new("missing"), "created_at", Measure::Count);
        assert!(source.aggregate(&q, &Window::before(at(2030, 1, 1, 0))).await.is_err());
    }
}
