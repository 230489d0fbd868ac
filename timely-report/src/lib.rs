//! # timely-report - Time-Bucketed Reports for Rust
//!
//! timely-report computes tabular reports over a queryable dataset. Rows are
//! named metrics (counts, sums, averages, standard deviations, presence
//! checks, date-interval averages, cumulative and lifetime totals), columns
//! are consecutive calendar-aligned windows (hour, day, week, month, quarter
//! or year) and every cell is one aggregate. Cells of windows that have
//! already closed are cached, so past periods are computed only once.
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use serde_json::json;
//! use timely_report::prelude::*;
//!
//! # async fn example() -> timely_report::error::Result<()> {
//! let source = MemorySource::with_table(
//!     "orders",
//!     vec![
//!         json!({"created_at": "2024-01-03T09:00:00Z", "amount": 40, "paid_at": "2024-01-04T09:00:00Z"}),
//!         json!({"created_at": "2024-02-14T18:20:00Z", "amount": 25, "paid_at": null}),
//!     ],
//! )?;
//! let cache = InMemoryCacheStore::new();
//!
//! let report = Report::builder("Sales", Period::Month)
//!     .starts_at(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
//!     .length(3)
//!     .show_totals(true)
//!     .row(RowSpec::new("Orders", "count", Scope::new("orders")))
//!     .row(RowSpec::new("Paid", "present", Scope::new("orders")).arg("paid_at").percentage_of("Orders"))
//!     .row(RowSpec::new("Avg. value", "average", Scope::new("orders")).arg("amount"))
//!     .build()?;
//!
//! let table = report.run(&source, Some(&cache)).await?;
//! println!("{}", HumanFormatter::new().format(&table)?);
//! # Ok(())
//! # }
//! # tokio::runtime::Runtime::new().unwrap().block_on(example()).unwrap();
//! ```
//!
//! ## Key Features
//!
//! ### Calendar-aligned columns
//!
//! [`period::Period`] holds all bucketing math: aligning a timestamp to the
//! start of its period, moving by whole periods (quarters are three months)
//! and producing sortable bucket keys such as `202403` or `202411` (ISO week).
//! Weeks start on Monday.
//!
//! ### Aggregations as a registry
//!
//! Row kinds are looked up by tag in a [`functions::FunctionRegistry`]. An
//! unknown tag or a wrong number of column arguments fails when the report is
//! built, before any query runs. Custom kinds implement
//! [`functions::AggregationFunction`].
//!
//! ### Summary rows
//!
//! [`summary::SummaryRow`] combines rows declared before it with `sum`,
//! `safe_divide` (zero denominators yield 0) or `multiply`.
//! `RowSpec::percentage_of` is shorthand for a rounded percentage summary.
//!
//! ### Closed-window caching
//!
//! Any [`cache::CacheStore`] can back a report. Cells are addressed by a
//! report/row/column fingerprint, either as flat keys or grouped per row in
//! a hash so a row's history can be evicted at once.
//!
//! ### Data sources
//!
//! - [`sources::MemorySource`]: JSON records held in process
//! - `sources::DataFusionSource`: SQL over a DataFusion `SessionContext`
//!   (feature `datafusion-source`, on by default)
//!
//! ## Architecture
//!
//! - **`period`**, **`calendar`**: time bucketing and date differences
//! - **`column`**: one time window of a report
//! - **`functions`**: aggregation kinds and their registry
//! - **`row`**, **`summary`**: row declarations and derived rows
//! - **`cell`**, **`cache`**: cell identity, state and cache stores
//! - **`report`**: builder, runner and the finished [`report::ReportTable`]
//! - **`sources`**: the data-source contract and its implementations
//! - **`formatters`**: JSON, text, Markdown and CSV output

pub mod cache;
pub mod calendar;
pub mod cell;
pub mod column;
pub mod config;
pub mod error;
pub mod formatters;
pub mod functions;
pub mod logging;
pub mod period;
pub mod prelude;
pub mod report;
pub mod row;
pub mod sources;
pub mod summary;
pub mod text;
pub mod value;
