//! Standard deviation of a field per bucket.

use async_trait::async_trait;

use crate::functions::{AggregationFunction, FunctionRequest, TotalStrategy};
use crate::sources::Measure;
use crate::value::Transform;

/// Population standard deviation of a numeric field.
///
/// Like the mean, the totals value is computed over the whole report window.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardDeviationFunction;

#[async_trait]
impl AggregationFunction for StandardDeviationFunction {
    fn name(&self) -> &str {
        "standard_deviation"
    }

    fn description(&self) -> &str {
        "Computes the population standard deviation of a numeric field in each period"
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
        Measure::StdDev(request.arg(0))
    }
}
