//! Field mean per bucket.

use async_trait::async_trait;

use crate::functions::{AggregationFunction, FunctionRequest, TotalStrategy};
use crate::sources::Measure;
use crate::value::Transform;

/// Mean of a numeric field, rounded to the configured precision.
///
/// The totals column is the mean over every record of the report window, not
/// the mean of the bucket means.
#[derive(Debug, Clone, Copy, Default)]
pub struct AverageFunction;

#[async_trait]
impl AggregationFunction for AverageFunction {
    fn name(&self) -> &str {
        "average"
    }

    fn description(&self) -> &str {
        "Computes the average of a numeric field in each period"
    }

    fn arity(&self) -> usize {
        1
    }

    fn default_transform(&self) -> Transform {
        Transform::Round
    }

    fn total_strategy(&self) -> TotalStrategy {
        TotalStrategy::Recompute
    }

    fn measure(&self, request: &FunctionRequest) -> Measure {
        Measure::Mean(request.arg(0))
    }
}
