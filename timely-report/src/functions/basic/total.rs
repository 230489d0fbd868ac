//! Lifetime totals: everything recorded before a point in time.

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::instrument;

use crate::column::Column;
use crate::error::{ReportError, Result};
use crate::functions::{AggregationFunction, BucketValues, FunctionRequest, TotalStrategy};
use crate::sources::{DataSource, Measure, Window};
use crate::value::{Transform, Value};

/// Aggregates all matching records dated before each column's end.
async fn evaluate_through(
    source: &dyn DataSource,
    request: &FunctionRequest,
    measure: Measure,
    columns: &[Column],
) -> Result<BucketValues> {
    let query = request.query(measure);
    let futures: Vec<_> = columns
        .iter()
        .map(|column| {
            let query = &query;
            async move {
                let value = source.aggregate(query, &Window::before(column.ends_at())).await?;
                Ok::<_, ReportError>((column.key(), value.map_or(Value::ZERO, Value::from_f64)))
            }
        })
        .collect();
    let values: Vec<(String, Value)> = stream::iter(futures)
        .buffered(request.max_concurrency.max(1))
        .try_collect()
        .await?;
    Ok(values.into_iter().collect())
}

async fn total_through(
    source: &dyn DataSource,
    request: &FunctionRequest,
    measure: Measure,
    span: &Column,
) -> Result<Value> {
    let query = request.query(measure);
    let value = source.aggregate(&query, &Window::before(span.ends_at())).await?;
    Ok(value.map_or(Value::ZERO, Value::from_f64))
}

/// Number of matching records dated before the end of each column.
///
/// The totals column holds the count through the end of the report.
#[derive(Debug, Clone, Copy, Default)]
pub struct TotalCountFunction;

#[async_trait]
impl AggregationFunction for TotalCountFunction {
    fn name(&self) -> &str {
        "total_count"
    }

    fn description(&self) -> &str {
        "Counts all records dated before the end of each period"
    }

    fn arity(&self) -> usize {
        0
    }

    fn total_strategy(&self) -> TotalStrategy {
        TotalStrategy::Recompute
    }

    fn measure(&self, _request: &FunctionRequest) -> Measure {
        Measure::Count
    }

    #[instrument(skip_all, fields(function = "total_count"))]
    async fn evaluate(
        &self,
        source: &dyn DataSource,
        request: &FunctionRequest,
        columns: &[Column],
    ) -> Result<BucketValues> {
        evaluate_through(source, request, self.measure(request), columns).await
    }

    async fn evaluate_total(
        &self,
        source: &dyn DataSource,
        request: &FunctionRequest,
        span: &Column,
    ) -> Result<Value> {
        total_through(source, request, self.measure(request), span).await
    }
}

/// Sum of a field over matching records dated before the end of each column.
#[derive(Debug, Clone, Copy, Default)]
pub struct TotalSumFunction;

#[async_trait]
impl AggregationFunction for TotalSumFunction {
    fn name(&self) -> &str {
        "total_sum"
    }

    fn description(&self) -> &str {
        "Sums a field over all records dated before the end of each period"
    }

    fn arity(&self) -> usize {
        1
    }

    fn default_transform(&self) -> Transform {
        Transform::Truncate
    }

    fn total_strategy(&self) -> TotalStrategy {
        TotalStrategy::Recompute
    }

    fn measure(&self, request: &FunctionRequest) -> Measure {
        Measure::Sum(request.arg(0))
    }

    #[instrument(skip_all, fields(function = "total_sum"))]
    async fn evaluate(
        &self,
        source: &dyn DataSource,
        request: &FunctionRequest,
        columns: &[Column],
    ) -> Result<BucketValues> {
        evaluate_through(source, request, self.measure(request), columns).await
    }

    async fn evaluate_total(
        &self,
        source: &dyn DataSource,
        request: &FunctionRequest,
        span: &Column,
    ) -> Result<Value> {
        total_through(source, request, self.measure(request), span).await
    }
}
