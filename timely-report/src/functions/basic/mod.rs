//! Counting and summing aggregation kinds.
//!
//! These cover the everyday rows of a report: how many records landed in each
//! period, how many had a field filled in, running and lifetime counts, and
//! sums and means of a numeric field.

mod average;
mod count;
mod cumulative;
mod present;
mod sum;
mod total;

pub use average::AverageFunction;
pub use count::CountFunction;
pub use cumulative::CumulativeFunction;
pub use present::PresentFunction;
pub use sum::SumFunction;
pub use total::{TotalCountFunction, TotalSumFunction};
