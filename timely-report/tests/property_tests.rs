//! Property-based tests for period arithmetic and report windows.
//!
//! ## Test Categories
//!
//! ### 1. Period alignment
//! - `start_of` is idempotent and never moves a timestamp forward
//! - every timestamp falls inside the period starting at `start_of`
//!
//! ### 2. Columns
//! - columns are contiguous and their bucket keys strictly increase
//!
//! ### 3. Window length
//! - `periods_between` is the smallest count of periods reaching the end
//! - `Report::set_ends_at` agrees with it
//!
//! ### 4. Values
//! - safe division never fails and yields zero for zero denominators

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;
use timely_report::column::columns_for;
use timely_report::prelude::*;

// ============================================================================
// Test Data Generation Utilities
// ============================================================================

fn any_period() -> impl Strategy<Value = Period> {
    prop::sample::select(Period::ALL.to_vec())
}

/// Timestamps between 2000 and 2050, at second resolution.
fn any_instant() -> impl Strategy<Value = DateTime<Utc>> {
    (946_684_800i64..2_524_608_000i64).prop_map(|secs| Utc.timestamp_opt(secs, 0).unwrap())
}

// ============================================================================
// Property Tests for Period Alignment
// ============================================================================

proptest! {
    #[test]
    fn test_start_of_contains_instant(period in any_period(), t in any_instant()) {
        let start = period.start_of(t);
        prop_assert!(start <= t);
        prop_assert!(t < period.advance(start, 1));
        prop_assert_eq!(period.start_of(start), start);
    }

    #[test]
    fn test_advance_is_reversible_from_period_starts(
        period in any_period(),
        t in any_instant(),
        n in -60i64..60
    ) {
        let start = period.start_of(t);
        let moved = period.advance(start, n);
        prop_assert_eq!(period.start_of(moved), moved);
        prop_assert_eq!(period.advance(moved, -n), start);
    }
}

// ============================================================================
// Property Tests for Columns
// ============================================================================

proptest! {
    #[test]
    fn test_columns_are_contiguous_and_sorted(
        period in any_period(),
        t in any_instant(),
        length in 1u32..40
    ) {
        let columns = columns_for(period, period.start_of(t), length);
        prop_assert_eq!(columns.len(), length as usize);

        for pair in columns.windows(2) {
            prop_assert_eq!(pair[0].ends_at(), pair[1].starts_at());
            prop_assert!(pair[0].key() < pair[1].key());
        }
        for column in &columns {
            prop_assert!(column.contains(column.starts_at()));
            prop_assert!(!column.contains(column.ends_at()));
            prop_assert!(column.contains(column.midpoint()));
        }
    }
}

// ============================================================================
// Property Tests for Window Length
// ============================================================================

proptest! {
    #[test]
    fn test_periods_between_is_a_ceiling(
        period in any_period(),
        start in any_instant(),
        offset_secs in 1i64..200_000_000
    ) {
        let start = period.start_of(start);
        let end = start + chrono::TimeDelta::seconds(offset_secs);
        let n = period.periods_between(start, end);

        prop_assert!(n >= 1);
        prop_assert!(period.advance(start, i64::from(n)) >= end);
        prop_assert!(period.advance(start, i64::from(n) - 1) < end);
    }

    #[test]
    fn test_set_ends_at_matches_periods_between(
        period in any_period(),
        start in any_instant(),
        offset_secs in 1i64..50_000_000
    ) {
        let mut report = Report::builder("Window", period)
            .starts_at(start)
            .length(1)
            .now(start)
            .build()
            .unwrap();
        let aligned = report.starts_at();
        let end = start + chrono::TimeDelta::seconds(offset_secs);

        report.set_ends_at(end).unwrap();
        prop_assert_eq!(report.length(), period.periods_between(aligned, end));
        prop_assert_eq!(report.columns().len(), report.length() as usize);
        prop_assert!(report.ends_at() >= end);
    }
}

// ============================================================================
// Property Tests for Values
// ============================================================================

proptest! {
    #[test]
    fn test_safe_divide_by_zero_is_zero(numerator in -1_000_000i64..1_000_000) {
        prop_assert_eq!(Value::Long(numerator).safe_divide(Value::ZERO), Value::ZERO);
        prop_assert_eq!(Value::Double(numerator as f64).safe_divide(Value::Double(0.0)), Value::ZERO);
    }

    #[test]
    fn test_sum_combinator_matches_integer_sum(values in prop::collection::vec(-10_000i64..10_000, 1..20)) {
        let expected: i64 = values.iter().sum();
        let inputs: Vec<Value> = values.into_iter().map(Value::Long).collect();
        prop_assert_eq!(Combinator::Sum.apply(&inputs), Value::Long(expected));
    }
}
