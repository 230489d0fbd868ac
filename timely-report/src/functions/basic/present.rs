//! Count of records with a filled-in field.

use async_trait::async_trait;

use crate::functions::{AggregationFunction, FunctionRequest};
use crate::sources::Measure;

/// Counts records whose field is neither null nor an empty string.
#[derive(Debug, Clone, Copy, Default)]
pub struct PresentFunction;

#[async_trait]
impl AggregationFunction for PresentFunction {
    fn name(&self) -> &str {
        "present"
    }

    fn description(&self) -> &str {
        "Counts the records in each period where a field is present"
    }

    fn arity(&self) -> usize {
        1
    }

    fn measure(&self, request: &FunctionRequest) -> Measure {
        Measure::CountPresent(request.arg(0))
    }
}
