//! In-process data source over JSON records.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use super::{AggregateQuery, BucketMap, Condition, DataSource, Measure, Scope, Window};
use crate::calendar;
use crate::column::Column;
use crate::error::{ReportError, Result};

type Record = Map<String, JsonValue>;

const SOURCE_TYPE: &str = "memory";

/// A data source holding named tables of JSON objects.
///
/// Timestamps may be RFC 3339 strings, `YYYY-MM-DD HH:MM:SS` strings (UTC),
/// plain dates, or integer epoch seconds. Records whose date column is null or
/// missing never fall into any window.
///
/// # Example
///
/// ```rust
/// use serde_json::json;
/// use timely_report::sources::MemorySource;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let source = MemorySource::new();
/// source
///     .insert("orders", json!({"created_at": "2024-03-02T10:00:00Z", "amount": 12.5}))
///     .await
///     .unwrap();
/// assert_eq!(source.len("orders").await, 1);
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    tables: Arc<RwLock<HashMap<String, Vec<Record>>>>,
}

impl MemorySource {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a source with one table already loaded.
    pub fn with_table(
        table: impl Into<String>,
        records: impl IntoIterator<Item = JsonValue>,
    ) -> Result<Self> {
        let records = records
            .into_iter()
            .map(into_record)
            .collect::<Result<Vec<_>>>()?;
        let mut tables = HashMap::new();
        tables.insert(table.into(), records);
        Ok(Self {
            tables: Arc::new(RwLock::new(tables)),
        })
    }

    /// Appends one record to `table`, creating the table if needed.
    pub async fn insert(&self, table: &str, record: JsonValue) -> Result<()> {
        self.extend(table, std::iter::once(record)).await
    }

    /// Appends records to `table`, creating the table if needed.
    pub async fn extend(
        &self,
        table: &str,
        records: impl IntoIterator<Item = JsonValue>,
    ) -> Result<()> {
        let records = records
            .into_iter()
            .map(into_record)
            .collect::<Result<Vec<_>>>()?;
        self.tables
            .write()
            .await
            .entry(table.to_string())
            .or_default()
            .extend(records);
        Ok(())
    }

    /// Number of records in `table`.
    pub async fn len(&self, table: &str) -> usize {
        self.tables.read().await.get(table).map_or(0, Vec::len)
    }

    /// Returns true if `table` holds no records.
    pub async fn is_empty(&self, table: &str) -> bool {
        self.len(table).await == 0
    }
}

#[async_trait]
impl DataSource for MemorySource {
    #[instrument(skip(self, query), fields(table = %query.scope.table(), measure = query.measure.name()))]
    async fn aggregate(&self, query: &AggregateQuery, window: &Window) -> Result<Option<f64>> {
        let tables = self.tables.read().await;
        let records = table(&tables, &query.scope)?;
        require_fields(records, query)?;

        let mut matched = Vec::new();
        for record in records {
            if !matches_scope(record, &query.scope) {
                continue;
            }
            if let Some(t) = timestamp(record, &query.date_column)? {
                if window.contains(t) {
                    matched.push(record);
                }
            }
        }

        debug!(matched = matched.len(), "Aggregating window");
        reduce(&query.measure, &matched)
    }

    /// Groups matching records by column in a single scan.
    #[instrument(skip(self, query, columns), fields(table = %query.scope.table(), measure = query.measure.name(), columns = columns.len()))]
    async fn aggregate_buckets(
        &self,
        query: &AggregateQuery,
        columns: &[Column],
        _max_concurrency: usize,
    ) -> Result<BucketMap> {
        let tables = self.tables.read().await;
        let records = table(&tables, &query.scope)?;
        require_fields(records, query)?;

        let mut groups: Vec<Vec<&Record>> = vec![Vec::new(); columns.len()];
        for record in records {
            if !matches_scope(record, &query.scope) {
                continue;
            }
            let Some(t) = timestamp(record, &query.date_column)? else {
                continue;
            };
            if let Some(idx) = columns.iter().position(|c| c.contains(t)) {
                groups[idx].push(record);
            }
        }

        columns
            .iter()
            .zip(groups)
            .map(|(column, group)| Ok((column.key(), reduce(&query.measure, &group)?)))
            .collect()
    }

    fn description(&self) -> String {
        "in-memory record tables".to_string()
    }
}

fn into_record(value: JsonValue) -> Result<Record> {
    match value {
        JsonValue::Object(map) => Ok(map),
        other => Err(ReportError::TypeMismatch {
            expected: "JSON object".to_string(),
            found: json_type(&other).to_string(),
        }),
    }
}

fn table<'a>(tables: &'a HashMap<String, Vec<Record>>, scope: &Scope) -> Result<&'a [Record]> {
    tables
        .get(scope.table())
        .map(Vec::as_slice)
        .ok_or_else(|| ReportError::data_source(SOURCE_TYPE, format!("unknown table '{}'", scope.table())))
}

/// A field is known once any record of the table carries the key, even as
/// null. Empty tables accept every field.
fn require_fields(records: &[Record], query: &AggregateQuery) -> Result<()> {
    if records.is_empty() {
        return Ok(());
    }
    let scope_fields = query.scope.conditions().iter().map(Condition::field);
    let mut fields = std::iter::once(query.date_column.as_str())
        .chain(query.measure.fields())
        .chain(scope_fields);

    match fields.find(|name| !records.iter().any(|r| r.contains_key(*name))) {
        Some(missing) => Err(ReportError::ColumnNotFound {
            table: query.scope.table().to_string(),
            column: missing.to_string(),
        }),
        None => Ok(()),
    }
}

fn field<'a>(record: &'a Record, name: &str) -> &'a JsonValue {
    record.get(name).unwrap_or(&JsonValue::Null)
}

fn matches_scope(record: &Record, scope: &Scope) -> bool {
    for condition in scope.conditions() {
        let value = field(record, condition.field());
        let matched = match condition {
            Condition::IsNull(_) => value.is_null(),
            Condition::IsNotNull(_) => !value.is_null(),
            // SQL semantics: comparisons against NULL never match
            Condition::Equals(_, expected) => !value.is_null() && json_eq(value, expected),
            Condition::NotEquals(_, expected) => !value.is_null() && !json_eq(value, expected),
            Condition::In(_, options) => {
                !value.is_null() && options.iter().any(|o| json_eq(value, o))
            }
        };
        if !matched {
            return false;
        }
    }
    true
}

fn json_eq(a: &JsonValue, b: &JsonValue) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn json_type(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

fn timestamp(record: &Record, name: &str) -> Result<Option<DateTime<Utc>>> {
    let value = field(record, name);
    let parsed = match value {
        JsonValue::Null => return Ok(None),
        JsonValue::Number(n) => n.as_i64().and_then(|s| DateTime::from_timestamp(s, 0)),
        JsonValue::String(s) => parse_timestamp(s),
        _ => None,
    };
    parsed.map(Some).ok_or_else(|| ReportError::TypeMismatch {
        expected: format!("timestamp in '{name}'"),
        found: value.to_string(),
    })
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    for pattern in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(s, pattern) {
            return Some(t.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc())
}

fn number(record: &Record, name: &str) -> Result<Option<f64>> {
    let value = field(record, name);
    match value {
        JsonValue::Null => Ok(None),
        JsonValue::Number(n) => Ok(n.as_f64()),
        JsonValue::String(s) => s.trim().parse::<f64>().map(Some).map_err(|_| mismatch(name, value)),
        _ => Err(mismatch(name, value)),
    }
}

fn mismatch(name: &str, value: &JsonValue) -> ReportError {
    ReportError::TypeMismatch {
        expected: format!("number in '{name}'"),
        found: value.to_string(),
    }
}

fn is_present(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::String(s) => !s.is_empty(),
        _ => true,
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn reduce(measure: &Measure, records: &[&Record]) -> Result<Option<f64>> {
    let numbers = |name: &str| -> Result<Vec<f64>> {
        let mut out = Vec::with_capacity(records.len());
        for record in records {
            if let Some(v) = number(record, name)? {
                out.push(v);
            }
        }
        Ok(out)
    };
    let intervals = |a: &str, b: &str, f: fn(DateTime<Utc>, DateTime<Utc>) -> f64| -> Result<Vec<f64>> {
        let mut out = Vec::with_capacity(records.len());
        for record in records {
            if let (Some(older), Some(newer)) = (timestamp(record, a)?, timestamp(record, b)?) {
                out.push(f(older, newer));
            }
        }
        Ok(out)
    };

    Ok(match measure {
        Measure::Count => Some(records.len() as f64),
        Measure::CountPresent(name) => Some(
            records
                .iter()
                .filter(|r| is_present(field(r, name)))
                .count() as f64,
        ),
        Measure::Sum(name) => {
            let values = numbers(name)?;
            (!values.is_empty()).then(|| values.iter().sum::<f64>())
        }
        Measure::Mean(name) => mean(&numbers(name)?),
        Measure::StdDev(name) => {
            let values = numbers(name)?;
            mean(&values).map(|m| {
                let variance =
                    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
                variance.sqrt()
            })
        }
        Measure::MeanDaysBetween(a, b) => {
            mean(&intervals(a, b, |x, y| calendar::days_between(x, y) as f64)?)
        }
        Measure::MeanHoursBetween(a, b) => mean(&intervals(a, b, calendar::hours_between)?),
        Measure::MeanWeekHoursBetween(a, b) => {
            mean(&intervals(a, b, calendar::week_hours_between)?)
        }
    })
}
