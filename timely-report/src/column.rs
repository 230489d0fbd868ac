//! One time window of a report.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use crate::config::ReportConfig;
use crate::period::Period;

/// A half-open window `[starts_at, ends_at)` spanning exactly one period.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Column {
    period: Period,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
}

impl Column {
    /// Creates the column for the period containing `t`.
    pub fn new(period: Period, t: DateTime<Utc>) -> Self {
        let starts_at = period.start_of(t);
        Self {
            period,
            starts_at,
            ends_at: period.advance(starts_at, 1),
        }
    }

    /// Creates a window that is not aligned to a single period.
    ///
    /// Used for the totals column, which spans a whole report.
    pub fn spanning(period: Period, starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> Self {
        Self {
            period,
            starts_at,
            ends_at,
        }
    }

    pub fn period(&self) -> Period {
        self.period
    }

    pub fn starts_at(&self) -> DateTime<Utc> {
        self.starts_at
    }

    pub fn ends_at(&self) -> DateTime<Utc> {
        self.ends_at
    }

    /// Halfway point of the window, handy as an x value for charts.
    pub fn midpoint(&self) -> DateTime<Utc> {
        let half = (self.ends_at - self.starts_at).num_seconds() / 2;
        self.starts_at + TimeDelta::seconds(half)
    }

    /// Sortable bucket key of the window start.
    pub fn key(&self) -> String {
        self.period.bucket_key(self.starts_at)
    }

    /// Human heading formatted with the configured pattern.
    pub fn title(&self, config: &ReportConfig) -> String {
        self.period
            .title(self.starts_at, config.date_format(self.period))
    }

    /// `"{starts_epoch}{sep}{ends_epoch}"`.
    pub fn cache_key(&self, separator: &str) -> String {
        format!(
            "{}{separator}{}",
            self.starts_at.timestamp(),
            self.ends_at.timestamp()
        )
    }

    /// A closed window can never change, so its values may be cached.
    pub fn is_cacheable(&self, now: DateTime<Utc>) -> bool {
        self.ends_at <= now
    }

    /// Returns true if `t` falls inside the window.
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.starts_at <= t && t < self.ends_at
    }
}

/// Builds `length` consecutive columns starting at `starts_at`.
pub fn columns_for(period: Period, starts_at: DateTime<Utc>, length: u32) -> Vec<Column> {
    let start = period.start_of(starts_at);
    (0..length as i64)
        .map(|i| Column::new(period, period.advance(start, i)))
        .collect()
}
