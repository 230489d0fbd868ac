//! Running record count.

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, instrument};

use crate::column::Column;
use crate::error::{ReportError, Result};
use crate::functions::{AggregationFunction, BucketValues, FunctionRequest, TotalStrategy};
use crate::sources::{DataSource, Measure, Window};
use crate::value::Value;

/// Counts every matching record up to the end of each bucket.
///
/// The running total starts from a base: the number of records strictly
/// before the first requested column. Each bucket then adds the records of
/// the window from the previous bucket's end to its own end, so gaps between
/// non-adjacent columns are still counted.
#[derive(Debug, Clone, Copy, Default)]
pub struct CumulativeFunction;

#[async_trait]
impl AggregationFunction for CumulativeFunction {
    fn name(&self) -> &str {
        "cumulative"
    }

    fn description(&self) -> &str {
        "Counts all records up to the end of each period"
    }

    fn arity(&self) -> usize {
        0
    }

    fn total_strategy(&self) -> TotalStrategy {
        TotalStrategy::LastBucket
    }

    fn measure(&self, _request: &FunctionRequest) -> Measure {
        Measure::Count
    }

    #[instrument(skip(self, source, request, columns), fields(function = "cumulative", columns = columns.len()))]
    async fn evaluate(
        &self,
        source: &dyn DataSource,
        request: &FunctionRequest,
        columns: &[Column],
    ) -> Result<BucketValues> {
        let mut ordered: Vec<&Column> = columns.iter().collect();
        ordered.sort_by_key(|c| c.starts_at());

        let Some(first) = ordered.first() else {
            return Ok(BucketValues::new());
        };

        let base = source
            .count_before(&request.scope, &request.date_column, first.starts_at())
            .await?;
        debug!(base, "Computed cumulative base");

        let mut windows = Vec::with_capacity(ordered.len());
        let mut cursor = first.starts_at();
        for column in &ordered {
            windows.push(Window::between(cursor, column.ends_at()));
            cursor = column.ends_at();
        }

        let query = request.query(Measure::Count);
        let increments: Vec<f64> = stream::iter(windows)
            .map(|window| {
                let query = &query;
                async move {
                    let count = source.aggregate(query, &window).await?;
                    Ok::<_, ReportError>(count.unwrap_or(0.0))
                }
            })
            .buffered(request.max_concurrency.max(1))
            .try_collect()
            .await?;

        let mut running = Value::Long(base);
        let mut buckets = BucketValues::new();
        for (column, increment) in ordered.iter().zip(increments) {
            running = running.add(Value::from_f64(increment));
            buckets.insert(column.key(), running);
        }
        Ok(buckets)
    }
}
