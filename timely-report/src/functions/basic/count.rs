//! Record count per bucket.

use async_trait::async_trait;

use crate::functions::{AggregationFunction, FunctionRequest};
use crate::sources::Measure;

/// Counts the records whose date falls in each bucket.
///
/// # Example
///
/// ```rust,ignore
/// use timely_report::functions::basic::CountFunction;
///
/// let buckets = CountFunction.evaluate(&source, &request, &columns).await?;
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct CountFunction;

#[async_trait]
impl AggregationFunction for CountFunction {
    fn name(&self) -> &str {
        "count"
    }

    fn description(&self) -> &str {
        "Counts the records in each period"
    }

    fn arity(&self) -> usize {
        0
    }

    fn measure(&self, _request: &FunctionRequest) -> Measure {
        Measure::Count
    }
}
