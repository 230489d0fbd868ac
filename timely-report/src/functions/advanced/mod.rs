//! Statistical and date-interval aggregation kinds.
//!
//! All of these are averaging kinds: their totals column is recomputed over
//! the whole report window and their values are rounded by default.

mod date_interval;
mod standard_deviation;

pub use date_interval::{DateIntervalFunction, IntervalUnit};
pub use standard_deviation::StandardDeviationFunction;
