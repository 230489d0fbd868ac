//! Report engine configuration.
//!
//! [`ReportConfig`] is an explicit value handed to every report builder. There
//! is no process-wide mutable state; share one config by cloning it or
//! wrapping it in an `Arc`.
//!
//! # Example
//!
//! ```rust
//! use timely_report::config::{CacheAddressing, ReportConfig};
//! use timely_report::period::Period;
//!
//! let config = ReportConfig::default()
//!     .with_precision(3)
//!     .with_default_length(Period::Week, 12)
//!     .with_cache_addressing(CacheAddressing::Hash);
//!
//! assert_eq!(config.default_length(Period::Week), 12);
//! assert_eq!(config.date_format(Period::Month), "%b %Y");
//! ```

use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};

use crate::error::{ReportError, Result};
use crate::period::{Period, PeriodTable};

/// How cell fingerprints map onto cache keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheAddressing {
    /// One key per cell: `report{sep}row{sep}column`.
    #[default]
    Flat,
    /// One hash per row (`report{sep}row`) with one field per column.
    Hash,
}

/// Configuration shared by every component of a report.
///
/// Missing JSON fields fall back to their defaults. The per-period tables must
/// be given in full when present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Decimal places kept by rounding transforms
    pub precision: u32,
    /// Number of columns a report gets when no length is given
    pub default_lengths: PeriodTable<u32>,
    /// strftime patterns for column headings
    pub date_formats: PeriodTable<String>,
    /// Separator used when joining cache key parts
    pub cache_separator: String,
    /// Cache addressing strategy
    pub cache_addressing: CacheAddressing,
    /// Date column used by rows that don't name one
    pub default_date_column: String,
    /// Upper bound on concurrent data-source queries per row
    pub max_concurrency: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            precision: 2,
            default_lengths: PeriodTable {
                year: 3,
                quarter: 6,
                month: 6,
                week: 5,
                day: 7,
                hour: 8,
            },
            date_formats: PeriodTable {
                year: "%Y".to_string(),
                quarter: "%b %Y".to_string(),
                month: "%b %Y".to_string(),
                week: "%-d %b".to_string(),
                day: "%-d %b".to_string(),
                hour: "%-I %p (%m/%-d)".to_string(),
            },
            cache_separator: ":".to_string(),
            cache_addressing: CacheAddressing::Flat,
            default_date_column: "created_at".to_string(),
            max_concurrency: num_cpus::get(),
        }
    }
}

impl ReportConfig {
    /// Parses a JSON document and validates the result.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: ReportConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration for values no report could run with.
    pub fn validate(&self) -> Result<()> {
        if self.precision > 15 {
            return Err(ReportError::configuration(format!(
                "precision must be at most 15 (provided {})",
                self.precision
            )));
        }
        if self.cache_separator.is_empty() {
            return Err(ReportError::configuration(
                "cache_separator must not be empty",
            ));
        }
        if self.default_date_column.trim().is_empty() {
            return Err(ReportError::configuration(
                "default_date_column must not be empty",
            ));
        }
        if self.max_concurrency == 0 {
            return Err(ReportError::configuration(
                "max_concurrency must be at least 1",
            ));
        }
        for period in Period::ALL {
            if *self.default_lengths.get(period) == 0 {
                return Err(ReportError::configuration(format!(
                    "default length for {period} must be at least 1"
                )));
            }
            let pattern = self.date_formats.get(period);
            if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
                return Err(ReportError::configuration(format!(
                    "invalid date format for {period}: {pattern:?}"
                )));
            }
        }
        Ok(())
    }

    /// Number of columns used when a report doesn't set a length.
    pub fn default_length(&self, period: Period) -> u32 {
        *self.default_lengths.get(period)
    }

    /// Heading pattern for `period`.
    pub fn date_format(&self, period: Period) -> &str {
        self.date_formats.get(period)
    }

    /// Sets the rounding precision.
    pub fn with_precision(mut self, precision: u32) -> Self {
        self.precision = precision;
        self
    }

    /// Sets the default length for one period.
    pub fn with_default_length(mut self, period: Period, length: u32) -> Self {
        self.default_lengths.set(period, length);
        self
    }

    /// Sets the heading pattern for one period.
    pub fn with_date_format(mut self, period: Period, pattern: impl Into<String>) -> Self {
        self.date_formats.set(period, pattern.into());
        self
    }

    /// Sets the cache key separator.
    pub fn with_cache_separator(mut self, separator: impl Into<String>) -> Self {
        self.cache_separator = separator.into();
        self
    }

    /// Sets the cache addressing strategy.
    pub fn with_cache_addressing(mut self, addressing: CacheAddressing) -> Self {
        self.cache_addressing = addressing;
        self
    }

    /// Sets the date column used by rows that don't name one.
    pub fn with_default_date_column(mut self, column: impl Into<String>) -> Self {
        self.default_date_column = column.into();
        self
    }

    /// Sets the per-row concurrency bound.
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReportConfig::default();
        assert_eq!(config.precision, 2);
        assert_eq!(config.default_length(Period::Year), 3);
        assert_eq!(config.default_length(Period::Hour), 8);
        assert_eq!(config.date_format(Period::Hour), "%-I %p (%m/%-d)");
        assert_eq!(config.cache_separator, ":");
        assert_eq!(config.cache_addressing, CacheAddressing::Flat);
        assert!(config.max_concurrency >= 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_partial() {
        let config = ReportConfig::from_json(
            r#"{"precision": 4, "cache_separator": "/", "cache_addressing": "hash"}"#,
        )
        .unwrap();
        assert_eq!(config.precision, 4);
        assert_eq!(config.cache_separator, "/");
        assert_eq!(config.cache_addressing, CacheAddressing::Hash);
        assert_eq!(config.default_length(Period::Month), 6);
    }

    #[test]
    fn test_from_json_rejects_invalid_values() {
        let err = ReportConfig::from_json(r#"{"max_concurrency": 0}"#).unwrap_err();
        assert!(err.is_configuration());

        let err = ReportConfig::from_json(r#"{"cache_addressing": "tree"}"#).unwrap_err();
        assert!(matches!(err, ReportError::Serialization(_)));
    }

    #[test]
    fn test_invalid_date_format() {
        let config = ReportConfig::default().with_date_format(Period::Day, "%Q");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("day"));
    }

    #[test]
    fn test_zero_default_length() {
        let config = ReportConfig::default().with_default_length(Period::Week, 0);
        assert!(config.validate().is_err());
    }
}
