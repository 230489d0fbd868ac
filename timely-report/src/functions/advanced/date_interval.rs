//! Mean time elapsed between two date fields.

use async_trait::async_trait;

use crate::functions::{AggregationFunction, FunctionRequest, TotalStrategy};
use crate::sources::Measure;
use crate::value::Transform;

/// Unit in which an interval is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalUnit {
    /// Calendar days between the two dates.
    Days,
    /// Whole minutes between the two timestamps, in hours.
    Hours,
    /// Hours between the two timestamps that fall on a weekday.
    WeekHours,
}

/// Mean interval from an older to a newer date field.
///
/// The two arguments are the older and the newer field, in that order.
/// Records missing either value are skipped.
///
/// # Example
///
/// ```rust
/// use timely_report::functions::advanced::{DateIntervalFunction, IntervalUnit};
/// use timely_report::functions::AggregationFunction;
///
/// let f = DateIntervalFunction::new(IntervalUnit::WeekHours);
/// assert_eq!(f.name(), "avg_week_hours_between");
/// assert_eq!(f.arity(), 2);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct DateIntervalFunction {
    unit: IntervalUnit,
}

impl DateIntervalFunction {
    pub fn new(unit: IntervalUnit) -> Self {
        Self { unit }
    }

    pub fn unit(&self) -> IntervalUnit {
        self.unit
    }
}

#[async_trait]
impl AggregationFunction for DateIntervalFunction {
    fn name(&self) -> &str {
        match self.unit {
            IntervalUnit::Days => "avg_days_between",
            IntervalUnit::Hours => "avg_hours_between",
            IntervalUnit::WeekHours => "avg_week_hours_between",
        }
    }

    fn description(&self) -> &str {
        match self.unit {
            IntervalUnit::Days => "Averages the days elapsed between two dates",
            IntervalUnit::Hours => "Averages the hours elapsed between two timestamps",
            IntervalUnit::WeekHours => {
                "Averages the weekday hours elapsed between two timestamps"
            }
        }
    }

    fn arity(&self) -> usize {
        2
    }

    fn default_transform(&self) -> Transform {
        Transform::Round
    }

    fn total_strategy(&self) -> TotalStrategy {
        TotalStrategy::Recompute
    }

    fn measure(&self, request: &FunctionRequest) -> Measure {
        let (older, newer) = (request.arg(0), request.arg(1));
        match self.unit {
            IntervalUnit::Days => Measure::MeanDaysBetween(older, newer),
            IntervalUnit::Hours => Measure::MeanHoursBetween(older, newer),
            IntervalUnit::WeekHours => Measure::MeanWeekHoursBetween(older, newer),
        }
    }
}
