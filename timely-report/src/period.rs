//! Calendar periods and the bucketing arithmetic built on them.
//!
//! A [`Period`] is the granularity a report is bucketed by. All calendar math
//! in the crate goes through the methods here so that column boundaries,
//! bucket keys and data-source windows always agree:
//!
//! - [`Period::start_of`] rounds a timestamp down to the start of its period.
//!   Weeks start on Monday (ISO convention) everywhere.
//! - [`Period::advance`] shifts a timestamp by a signed number of periods.
//!   Quarters are always three calendar months, so month arithmetic (variable
//!   month length, leap years) has a single implementation.
//! - [`Period::bucket_key`] produces a compact, sortable key per bucket.
//! - [`Period::title`] formats a human heading from a strftime pattern.
//!
//! All timestamps are UTC.
//!
//! # Example
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use timely_report::period::Period;
//!
//! let t = Utc.with_ymd_and_hms(2024, 5, 17, 13, 45, 0).unwrap();
//! let start = Period::Quarter.start_of(t);
//! assert_eq!(start, Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap());
//! assert_eq!(Period::Quarter.bucket_key(start), "20242");
//! assert_eq!(Period::Month.advance(start, 3), Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap());
//! ```

use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveTime, TimeDelta, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write};
use std::str::FromStr;

use crate::error::ReportError;

/// Calendar granularity used to bucket time.
///
/// Variants are ordered from coarsest to finest, so `Period::Year < Period::Hour`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Year,
    Quarter,
    Month,
    Week,
    Day,
    Hour,
}

impl Period {
    /// Every period, coarsest first.
    pub const ALL: [Period; 6] = [
        Period::Year,
        Period::Quarter,
        Period::Month,
        Period::Week,
        Period::Day,
        Period::Hour,
    ];

    /// Returns the lowercase name of the period.
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Year => "year",
            Period::Quarter => "quarter",
            Period::Month => "month",
            Period::Week => "week",
            Period::Day => "day",
            Period::Hour => "hour",
        }
    }

    /// Rounds `t` down to the start of the period containing it.
    pub fn start_of(&self, t: DateTime<Utc>) -> DateTime<Utc> {
        let date = t.date_naive();
        match self {
            Period::Hour => {
                let time = NaiveTime::from_hms_opt(t.hour(), 0, 0).unwrap_or(NaiveTime::MIN);
                date.and_time(time).and_utc()
            }
            Period::Day => midnight(date),
            Period::Week => {
                let offset = date.weekday().num_days_from_monday() as i64;
                midnight(date - TimeDelta::days(offset))
            }
            Period::Month => midnight(month_start(date)),
            Period::Quarter => {
                let first = month_start(date);
                let back = Months::new(first.month0() % 3);
                midnight(first.checked_sub_months(back).unwrap_or(first))
            }
            Period::Year => midnight(date - TimeDelta::days(date.ordinal0() as i64)),
        }
    }

    /// Shifts `t` by `n` whole periods (negative `n` moves backwards).
    ///
    /// Month-based periods clamp to the end of shorter months, e.g. Jan 31 plus
    /// one month is Feb 28/29. Results saturate at the representable range.
    pub fn advance(&self, t: DateTime<Utc>, n: i64) -> DateTime<Utc> {
        match self {
            Period::Hour => shift(t, TimeDelta::try_hours(n)),
            Period::Day => shift(t, TimeDelta::try_days(n)),
            Period::Week => shift(t, TimeDelta::try_weeks(n)),
            Period::Month => shift_months(t, n),
            Period::Quarter => shift_months(t, n.saturating_mul(3)),
            Period::Year => shift_months(t, n.saturating_mul(12)),
        }
    }

    /// Returns the sortable bucket key for the period containing `t`.
    ///
    /// | period  | key          |
    /// |---------|--------------|
    /// | year    | `YYYY`       |
    /// | quarter | `YYYYq`      |
    /// | month   | `YYYYMM`     |
    /// | week    | `YYYYWW` (ISO year and week) |
    /// | day     | `YYYYMMDD`   |
    /// | hour    | `YYYYMMDDHH` |
    pub fn bucket_key(&self, t: DateTime<Utc>) -> String {
        match self {
            Period::Year => format!("{:04}", t.year()),
            Period::Quarter => format!("{:04}{}", t.year(), t.month0() / 3 + 1),
            Period::Month => format!("{:04}{:02}", t.year(), t.month()),
            Period::Week => {
                let week = t.iso_week();
                format!("{:04}{:02}", week.year(), week.week())
            }
            Period::Day => format!("{:04}{:02}{:02}", t.year(), t.month(), t.day()),
            Period::Hour => format!(
                "{:04}{:02}{:02}{:02}",
                t.year(),
                t.month(),
                t.day(),
                t.hour()
            ),
        }
    }

    /// Formats a human heading for `t` using a strftime `pattern`.
    ///
    /// Falls back to the bucket key if the pattern cannot be rendered.
    pub fn title(&self, t: DateTime<Utc>, pattern: &str) -> String {
        let mut out = String::new();
        if write!(out, "{}", t.format(pattern)).is_err() {
            return self.bucket_key(t);
        }
        out
    }

    /// Returns the smallest `n` such that `advance(start, n) >= end`.
    pub fn periods_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> u32 {
        if end <= start {
            return 0;
        }

        let mut n: i64 = match self.fixed_millis() {
            Some(unit) => {
                let span = (end - start).num_milliseconds();
                (span + unit - 1) / unit
            }
            None => {
                let months_per = match self {
                    Period::Quarter => 3,
                    Period::Year => 12,
                    _ => 1,
                };
                let months = (end.year() as i64 - start.year() as i64) * 12
                    + (end.month() as i64 - start.month() as i64);
                (months / months_per - 1).max(0)
            }
        };

        // Settle the estimate exactly against the calendar.
        while n > 0 && self.advance(start, n - 1) >= end {
            n -= 1;
        }
        while self.advance(start, n) < end {
            n += 1;
        }

        u32::try_from(n).unwrap_or(u32::MAX)
    }

    fn fixed_millis(&self) -> Option<i64> {
        match self {
            Period::Hour => Some(3_600_000),
            Period::Day => Some(86_400_000),
            Period::Week => Some(604_800_000),
            _ => None,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Period::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s.trim().to_ascii_lowercase())
            .ok_or_else(|| {
                let names: Vec<&str> = Period::ALL.iter().map(|p| p.as_str()).collect();
                ReportError::configuration(format!(
                    "period must be in the list: {} (provided {s})",
                    names.join(", ")
                ))
            })
    }
}

/// Per-period lookup table used by configuration (lengths, title formats).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodTable<T> {
    pub year: T,
    pub quarter: T,
    pub month: T,
    pub week: T,
    pub day: T,
    pub hour: T,
}

impl<T> PeriodTable<T> {
    /// Returns the entry for `period`.
    pub fn get(&self, period: Period) -> &T {
        match period {
            Period::Year => &self.year,
            Period::Quarter => &self.quarter,
            Period::Month => &self.month,
            Period::Week => &self.week,
            Period::Day => &self.day,
            Period::Hour => &self.hour,
        }
    }

    /// Replaces the entry for `period`.
    pub fn set(&mut self, period: Period, value: T) {
        match period {
            Period::Year => self.year = value,
            Period::Quarter => self.quarter = value,
            Period::Month => self.month = value,
            Period::Week => self.week = value,
            Period::Day => self.day = value,
            Period::Hour => self.hour = value,
        }
    }
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn month_start(date: NaiveDate) -> NaiveDate {
    date - TimeDelta::days(date.day0() as i64)
}

fn shift(t: DateTime<Utc>, delta: Option<TimeDelta>) -> DateTime<Utc> {
    delta
        .and_then(|d| t.checked_add_signed(d))
        .unwrap_or(if delta.map_or(true, |d| d >= TimeDelta::zero()) {
            DateTime::<Utc>::MAX_UTC
        } else {
            DateTime::<Utc>::MIN_UTC
        })
}

fn shift_months(t: DateTime<Utc>, n: i64) -> DateTime<Utc> {
    let months = u32::try_from(n.unsigned_abs()).ok().map(Months::new);
    let shifted = match months {
        Some(m) if n >= 0 => t.checked_add_months(m),
        Some(m) => t.checked_sub_months(m),
        None => None,
    };
    shifted.unwrap_or(if n >= 0 {
        DateTime::<Utc>::MAX_UTC
    } else {
        DateTime::<Utc>::MIN_UTC
    })
}
