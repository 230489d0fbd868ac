//! Interval arithmetic between two timestamps.
//!
//! These helpers back the date-interval aggregation kinds. Sources that
//! cannot express the arithmetic natively fetch raw timestamp pairs and reduce
//! them here, so every source produces identical numbers.

use chrono::{DateTime, Utc};

const SECS_PER_HOUR: f64 = 3_600.0;
const SECS_PER_WEEK: i64 = 604_800;
const WEEKEND_SECS: i64 = 172_800;
/// Offset of Saturday 00:00 from Monday 00:00.
const WEEKDAY_SECS: i64 = 432_000;
/// 1970-01-05 00:00 UTC, the first Monday after the epoch.
const REFERENCE_MONDAY: i64 = 345_600;

/// Whole calendar days from `older` to `newer`, ignoring time of day.
pub fn days_between(older: DateTime<Utc>, newer: DateTime<Utc>) -> i64 {
    (newer.date_naive() - older.date_naive()).num_days()
}

/// Whole minutes from `older` to `newer`, expressed in hours.
pub fn hours_between(older: DateTime<Utc>, newer: DateTime<Utc>) -> f64 {
    (newer - older).num_minutes() as f64 / 60.0
}

/// Hours from `older` to `newer` that fall on a weekday.
///
/// Weekend time (Saturday 00:00 to Monday 00:00) is excluded only where it
/// lies between the two endpoints. An endpoint inside a weekend therefore
/// only loses the part of that weekend on the inner side of the interval.
/// This is exact weekday time, not week-number arithmetic: a `newer` on a
/// weekday never gets time back for the weekend before it.
pub fn week_hours_between(older: DateTime<Utc>, newer: DateTime<Utc>) -> f64 {
    let a = older.timestamp();
    let b = newer.timestamp();
    let weekend = weekend_secs_until(b) - weekend_secs_until(a);
    ((b - a) - weekend) as f64 / SECS_PER_HOUR
}

/// Weekend seconds elapsed between the reference Monday and `t`.
fn weekend_secs_until(t: i64) -> i64 {
    let since = t - REFERENCE_MONDAY;
    let weeks = since.div_euclid(SECS_PER_WEEK);
    let into_week = since.rem_euclid(SECS_PER_WEEK);
    weeks * WEEKEND_SECS + (into_week - WEEKDAY_SECS).max(0)
}
