//! Report definition and orchestration.
//!
//! A [`Report`] is built with a [`ReportBuilder`]: the period and window are
//! fixed, row declarations are validated and resolved, and the columns are
//! derived from the calendar. [`Report::run`] then materializes every cell
//! against a [`DataSource`], optionally through a [`CacheStore`], and returns
//! a [`ReportTable`].
//!
//! # Example
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use serde_json::json;
//! use timely_report::prelude::*;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let source = MemorySource::with_table(
//!     "orders",
//!     vec![
//!         json!({"created_at": "2024-01-05T10:00:00Z", "amount": 12}),
//!         json!({"created_at": "2024-02-11T09:30:00Z", "amount": 30}),
//!     ],
//! )
//! .unwrap();
//!
//! let report = Report::builder("Sales", Period::Month)
//!     .starts_at(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
//!     .length(2)
//!     .show_totals(true)
//!     .row(RowSpec::new("Orders", "count", Scope::new("orders")))
//!     .row(RowSpec::new("Revenue", "sum", Scope::new("orders")).arg("amount"))
//!     .build()
//!     .unwrap();
//!
//! let table = report.run(&source, None).await.unwrap();
//! assert_eq!(table.value("Orders", "total"), Some(Value::Long(2)));
//! assert_eq!(table.value("Revenue", "202402"), Some(Value::Long(30)));
//! # });
//! ```

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use crate::cache::CacheStore;
use crate::column::{columns_for, Column};
use crate::config::ReportConfig;
use crate::error::{ReportError, Result};
use crate::functions::FunctionRegistry;
use crate::period::Period;
use crate::row::{Row, RowSpec};
use crate::sources::DataSource;
use crate::summary::SummaryRow;
use crate::text::cache_slug;

mod params;
mod runner;
mod table;

pub use params::ReportParams;
pub use runner::{ProgressCallback, ReportRunner};
pub use table::{Heading, ReportTable, TableRow, TOTAL_KEY, TOTAL_TITLE};

/// One declared line of a report, in declaration order.
#[derive(Debug, Clone)]
pub enum ReportLine {
    Row(Row),
    Summary(SummaryRow),
}

impl ReportLine {
    pub fn title(&self) -> &str {
        match self {
            ReportLine::Row(row) => row.title(),
            ReportLine::Summary(summary) => summary.title(),
        }
    }

    pub fn is_hidden(&self) -> bool {
        match self {
            ReportLine::Row(row) => row.is_hidden(),
            ReportLine::Summary(summary) => summary.is_hidden(),
        }
    }
}

#[derive(Debug, Clone)]
enum Declaration {
    Row(RowSpec),
    Summary(SummaryRow),
}

/// Builder for [`Report`].
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    title: String,
    period: Period,
    length: Option<u32>,
    starts_at: Option<DateTime<Utc>>,
    ends_at: Option<DateTime<Utc>>,
    show_totals: bool,
    now: Option<DateTime<Utc>>,
    config: ReportConfig,
    registry: Option<Arc<FunctionRegistry>>,
    params: ReportParams,
    cache_key: Option<String>,
    declarations: Vec<Declaration>,
}

impl ReportBuilder {
    /// Number of columns. Defaults to the configured length for the period.
    pub fn length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    /// First column's start; aligned down to the period start.
    ///
    /// Defaults to the current period moved back `length - 1` periods, so the
    /// last column is the one containing now.
    pub fn starts_at(mut self, starts_at: DateTime<Utc>) -> Self {
        self.starts_at = Some(starts_at);
        self
    }

    /// Sets the end instead of the length; the length becomes the smallest
    /// count of periods reaching `ends_at`.
    pub fn ends_at(mut self, ends_at: DateTime<Utc>) -> Self {
        self.ends_at = Some(ends_at);
        self
    }

    /// Adds a totals column.
    pub fn show_totals(mut self, show: bool) -> Self {
        self.show_totals = show;
        self
    }

    /// Overrides the wall clock used for defaults and cacheability.
    pub fn now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    pub fn config(mut self, config: ReportConfig) -> Self {
        self.config = config;
        self
    }

    /// Resolves row kinds against `registry` instead of the built-in one.
    pub fn registry(mut self, registry: Arc<FunctionRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// External filter values handed to dynamic row scopes.
    pub fn params(mut self, params: ReportParams) -> Self {
        self.params = params;
        self
    }

    /// Overrides the cache namespace derived from title and parameters.
    pub fn cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    /// Declares the next row.
    pub fn row(mut self, spec: RowSpec) -> Self {
        self.declarations.push(Declaration::Row(spec));
        self
    }

    /// Declares the next summary row.
    pub fn summary(mut self, summary: SummaryRow) -> Self {
        self.declarations.push(Declaration::Summary(summary));
        self
    }

    /// Validates the declarations and derives the columns.
    ///
    /// Unknown kinds, wrong arities, unknown combinators, duplicate titles and
    /// an invalid window are all rejected here, before any query runs. A
    /// summary referencing a row declared after it is only detected by
    /// [`Report::run`].
    pub fn build(self) -> Result<Report> {
        self.config.validate()?;

        let now = self.now.unwrap_or_else(Utc::now);
        let length = self
            .length
            .unwrap_or_else(|| self.config.default_length(self.period));
        if length == 0 {
            return Err(ReportError::configuration("report length must be at least 1"));
        }

        let starts_at = match self.starts_at {
            Some(t) => self.period.start_of(t),
            None => self
                .period
                .advance(self.period.start_of(now), 1 - i64::from(length)),
        };

        let length = match self.ends_at {
            Some(ends_at) if ends_at <= starts_at => {
                return Err(ReportError::configuration(format!(
                    "report ends_at {ends_at} is not after starts_at {starts_at}"
                )))
            }
            Some(ends_at) => self.period.periods_between(starts_at, ends_at),
            None => length,
        };

        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(FunctionRegistry::default()));
        let lines = resolve_lines(&self.declarations, &registry, &self.config, &self.params)?;

        let cache_key = match self.cache_key {
            Some(key) => key,
            None => {
                let mut key = cache_slug(&self.title);
                if let Some(digest) = self.params.digest() {
                    key.push('-');
                    key.push_str(&digest);
                }
                key
            }
        };

        debug!(
            title = %self.title,
            period = %self.period,
            length,
            lines = lines.len(),
            "Built report"
        );

        Ok(Report {
            columns: columns_for(self.period, starts_at, length),
            title: self.title,
            period: self.period,
            length,
            starts_at,
            show_totals: self.show_totals,
            now,
            config: self.config,
            params: self.params,
            cache_key,
            lines,
        })
    }
}

fn resolve_lines(
    declarations: &[Declaration],
    registry: &FunctionRegistry,
    config: &ReportConfig,
    params: &ReportParams,
) -> Result<Vec<ReportLine>> {
    let mut lines = Vec::with_capacity(declarations.len());
    let mut titles = HashSet::new();
    let mut row_keys: HashMap<String, String> = HashMap::new();
    let mut push = |line: ReportLine, lines: &mut Vec<ReportLine>| {
        if !titles.insert(line.title().to_string()) {
            return Err(ReportError::configuration(format!(
                "duplicate row title '{}'",
                line.title()
            )));
        }
        // Cell fingerprints must stay unique per row
        if let ReportLine::Row(row) = &line {
            let key = row.cache_key();
            if let Some(other) = row_keys.insert(key.clone(), row.title().to_string()) {
                return Err(ReportError::configuration(format!(
                    "rows '{other}' and '{}' share the cache key '{key}'",
                    row.title()
                )));
            }
        }
        lines.push(line);
        Ok(())
    };

    for declaration in declarations {
        match declaration {
            Declaration::Row(spec) => {
                let row = spec.resolve(registry, config, params)?;
                push(ReportLine::Row(row), &mut lines)?;
                if let Some(reference) = spec.percentage_reference() {
                    let summary = SummaryRow::percentage(spec.title(), reference);
                    push(ReportLine::Summary(summary), &mut lines)?;
                }
            }
            Declaration::Summary(summary) => {
                summary.validate()?;
                push(ReportLine::Summary(summary.clone()), &mut lines)?;
            }
        }
    }
    Ok(lines)
}

/// A fully defined report: window, columns and resolved rows.
#[derive(Debug, Clone)]
pub struct Report {
    title: String,
    period: Period,
    length: u32,
    starts_at: DateTime<Utc>,
    show_totals: bool,
    now: DateTime<Utc>,
    config: ReportConfig,
    params: ReportParams,
    cache_key: String,
    columns: Vec<Column>,
    lines: Vec<ReportLine>,
}

impl Report {
    pub fn builder(title: impl Into<String>, period: Period) -> ReportBuilder {
        ReportBuilder {
            title: title.into(),
            period,
            length: None,
            starts_at: None,
            ends_at: None,
            show_totals: false,
            now: None,
            config: ReportConfig::default(),
            registry: None,
            params: ReportParams::new(),
            cache_key: None,
            declarations: Vec::new(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn period(&self) -> Period {
        self.period
    }

    /// Number of columns.
    pub fn length(&self) -> u32 {
        self.length
    }

    pub fn starts_at(&self) -> DateTime<Utc> {
        self.starts_at
    }

    /// `starts_at` advanced by `length` periods.
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.period.advance(self.starts_at, i64::from(self.length))
    }

    /// Moves the end of the window, recomputing length and columns.
    pub fn set_ends_at(&mut self, ends_at: DateTime<Utc>) -> Result<()> {
        if ends_at <= self.starts_at {
            return Err(ReportError::configuration(format!(
                "report ends_at {ends_at} is not after starts_at {}",
                self.starts_at
            )));
        }
        self.length = self.period.periods_between(self.starts_at, ends_at);
        self.columns = columns_for(self.period, self.starts_at, self.length);
        Ok(())
    }

    pub fn show_totals(&self) -> bool {
        self.show_totals
    }

    /// Wall clock the report was built at.
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    pub fn params(&self) -> &ReportParams {
        &self.params
    }

    /// Cache namespace shared by all cells of this report.
    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Rows and summaries in declaration order, hidden ones included.
    pub fn lines(&self) -> &[ReportLine] {
        &self.lines
    }

    /// A single column spanning the whole report window.
    pub fn total_column(&self) -> Column {
        Column::spanning(self.period, self.starts_at, self.ends_at())
    }

    /// Column headings, with the totals heading when enabled.
    pub fn headings(&self) -> Vec<Heading> {
        let mut headings: Vec<Heading> = self
            .columns
            .iter()
            .map(|column| Heading {
                key: column.key(),
                title: column.title(&self.config),
            })
            .collect();
        if self.show_totals {
            headings.push(Heading {
                key: TOTAL_KEY.to_string(),
                title: TOTAL_TITLE.to_string(),
            });
        }
        headings
    }

    /// Materializes every cell and returns the visible table.
    pub async fn run(
        &self,
        source: &dyn DataSource,
        cache: Option<&dyn CacheStore>,
    ) -> Result<ReportTable> {
        let mut runner = ReportRunner::new(self, source);
        if let Some(cache) = cache {
            runner = runner.with_cache(cache);
        }
        runner.run().await
    }
}
