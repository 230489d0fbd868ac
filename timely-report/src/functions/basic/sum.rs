//! Field sum per bucket.

use async_trait::async_trait;

use crate::functions::{AggregationFunction, FunctionRequest};
use crate::sources::Measure;
use crate::value::Transform;

/// Sums a numeric field; values are truncated to integers by default.
#[derive(Debug, Clone, Copy, Default)]
pub struct SumFunction;

#[async_trait]
impl AggregationFunction for SumFunction {
    fn name(&self) -> &str {
        "sum"
    }

    fn description(&self) -> &str {
        "Sums a numeric field in each period"
    }

    fn arity(&self) -> usize {
        1
    }

    fn default_transform(&self) -> Transform {
        Transform::Truncate
    }

    fn measure(&self, request: &FunctionRequest) -> Measure {
        Measure::Sum(request.arg(0))
    }
}
