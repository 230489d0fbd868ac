//! Materialization of a report's cells.

use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::{Report, ReportLine, ReportTable, TableRow, TOTAL_KEY};
use crate::cache::{CacheStore, CellCache};
use crate::cell::{Cell, Fingerprint};
use crate::error::Result;
use crate::functions::{BucketValues, TotalStrategy};
use crate::logging::LogConfig;
use crate::row::{Row, RowValues};
use crate::sources::DataSource;
use crate::value::Value;
use crate::{cell_debug, log_cache_io};

/// Type alias for progress callback function.
pub type ProgressCallback = Arc<dyn Fn(f64) + Send + Sync>;

/// Computes the cells of one [`Report`] in declaration order.
///
/// Rows are materialized one after another so that summary rows always see
/// the rows declared before them. Within a row, cache reads and writes run
/// concurrently up to `max_concurrency`, and all missing cells are handed to
/// the aggregation function in one batch.
///
/// # Example
///
/// ```rust,ignore
/// use timely_report::prelude::*;
///
/// let table = ReportRunner::new(&report, &source)
///     .with_cache(&cache)
///     .on_progress(|progress| println!("{:.0}%", progress * 100.0))
///     .run()
///     .await?;
/// ```
pub struct ReportRunner<'a> {
    report: &'a Report,
    source: &'a dyn DataSource,
    cache: Option<&'a dyn CacheStore>,
    on_progress: Option<ProgressCallback>,
    log_config: LogConfig,
}

impl<'a> ReportRunner<'a> {
    pub fn new(report: &'a Report, source: &'a dyn DataSource) -> Self {
        Self {
            report,
            source,
            cache: None,
            on_progress: None,
            log_config: LogConfig::default(),
        }
    }

    /// Reads and writes closed-window cells through `cache`.
    pub fn with_cache(mut self, cache: &'a dyn CacheStore) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Sets a progress callback that will be called after each row.
    ///
    /// The callback receives a float between 0.0 and 1.0 indicating progress.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    pub fn with_log_config(mut self, log_config: LogConfig) -> Self {
        self.log_config = log_config;
        self
    }

    /// Materializes every row and summary and returns the visible table.
    ///
    /// Data-source errors and cache read errors abort the run. Cache write
    /// errors are logged and the computed value is kept.
    #[instrument(skip(self), fields(
        report = %self.report.title(),
        period = %self.report.period(),
        columns = self.report.columns().len(),
        lines = self.report.lines().len(),
    ))]
    pub async fn run(&self) -> Result<ReportTable> {
        let started = Instant::now();
        info!(
            "Starting report with {} lines over {} columns",
            self.report.lines().len(),
            self.report.columns().len()
        );

        let bucket_keys: Vec<String> = self.report.columns().iter().map(|c| c.key()).collect();
        let precision = self.report.config().precision;
        let total_lines = self.report.lines().len().max(1) as f64;

        let mut computed: HashMap<String, RowValues> = HashMap::new();
        for (idx, line) in self.report.lines().iter().enumerate() {
            let values = match line {
                ReportLine::Row(row) => self.materialize_row(row).await?,
                ReportLine::Summary(summary) => {
                    debug!(summary = summary.title(), "Evaluating summary row");
                    let mut values = summary.evaluate(&computed, &bucket_keys, precision)?;
                    if !self.report.show_totals() {
                        values.total = None;
                    }
                    values
                }
            };
            computed.insert(line.title().to_string(), values);

            if let Some(ref callback) = self.on_progress {
                callback((idx + 1) as f64 / total_lines);
            }
        }

        let rows = self
            .report
            .lines()
            .iter()
            .filter(|line| !line.is_hidden())
            .filter_map(|line| {
                computed
                    .remove(line.title())
                    .map(|values| table_row(line.title(), &bucket_keys, values))
            })
            .collect();

        info!(
            "Report completed in {:.2}s",
            started.elapsed().as_secs_f64()
        );

        Ok(ReportTable {
            title: self.report.title().to_string(),
            period: self.report.period(),
            starts_at: self.report.starts_at(),
            ends_at: self.report.ends_at(),
            generated_at: self.report.now(),
            headings: self.report.headings(),
            rows,
        })
    }

    fn cell_cache(&self) -> Option<CellCache<'_>> {
        let config = self.report.config();
        self.cache
            .map(|store| CellCache::new(store, config.cache_addressing, &config.cache_separator))
    }

    #[instrument(skip(self, row), fields(row = row.title(), function = row.function().name()))]
    async fn materialize_row(&self, row: &Row) -> Result<RowValues> {
        let config = self.report.config();
        let now = self.report.now();
        let cache = self.cell_cache().filter(|_| row.is_cacheable());
        let row_key = row.cache_key();
        let columns = self.report.columns();

        let mut cells: Vec<Cell> = columns
            .iter()
            .map(|column| {
                let fingerprint = Fingerprint::new(
                    self.report.cache_key(),
                    row_key.clone(),
                    column.cache_key(&config.cache_separator),
                );
                Cell::new(fingerprint, column, cache.is_some() && column.is_cacheable(now))
            })
            .collect();
        for cell in cells.iter_mut() {
            cell.begin()?;
        }

        // Read-through for closed windows
        if let Some(cache) = cache {
            let hits: Vec<(usize, Option<Value>)> = stream::iter(
                cells
                    .iter()
                    .enumerate()
                    .filter(|(_, cell)| cell.is_cacheable())
                    .map(|(idx, cell)| async move {
                        cache.read(cell.fingerprint()).await.map(|hit| (idx, hit))
                    }),
            )
            .buffered(config.max_concurrency)
            .try_collect()
            .await?;

            for (idx, hit) in hits {
                if let Some(value) = hit {
                    log_cache_io!(self.log_config, fingerprint = %cells[idx].fingerprint(), "Cache hit");
                    cells[idx].resolve(value)?;
                }
            }
        }

        let missing: Vec<usize> = (0..cells.len())
            .filter(|&idx| cells[idx].value().is_none())
            .collect();
        cell_debug!(
            self.log_config,
            missing = missing.len(),
            cached = cells.len() - missing.len(),
            "Evaluating row"
        );

        if !missing.is_empty() {
            let request = row.request(config.max_concurrency);
            let miss_columns: Vec<_> = missing.iter().map(|&idx| columns[idx].clone()).collect();
            let raw = row
                .function()
                .evaluate(self.source, &request, &miss_columns)
                .await?;
            let finished = row.finish_all(raw, config.precision);

            for &idx in &missing {
                let value = finished
                    .get(cells[idx].bucket_key())
                    .copied()
                    .unwrap_or(Value::ZERO);
                cells[idx].resolve(value)?;
            }

            if let Some(cache) = cache {
                let writes: Vec<&Cell> = missing
                    .iter()
                    .map(|&idx| &cells[idx])
                    .filter(|cell| cell.is_cacheable())
                    .collect();
                self.write_back(&cache, &writes).await;
            }
        }

        let buckets: BucketValues = cells
            .iter()
            .map(|cell| {
                (
                    cell.bucket_key().to_string(),
                    cell.value().unwrap_or(Value::ZERO),
                )
            })
            .collect();

        let total = if self.report.show_totals() {
            Some(self.row_total(row, &row_key, &buckets, cache).await?)
        } else {
            None
        };

        Ok(RowValues { buckets, total })
    }

    async fn write_back(&self, cache: &CellCache<'_>, cells: &[&Cell]) {
        let concurrency = self.report.config().max_concurrency;
        let results: Vec<(String, Result<()>)> = stream::iter(cells.iter().map(|cell| async move {
            let value = cell.value().unwrap_or(Value::ZERO);
            (
                cell.fingerprint().to_string(),
                cache.write(cell.fingerprint(), value).await,
            )
        }))
        .buffer_unordered(concurrency)
        .collect()
        .await;

        for (fingerprint, result) in results {
            match result {
                Ok(()) => log_cache_io!(self.log_config, fingerprint = %fingerprint, "Cached cell"),
                Err(e) => warn!(fingerprint = %fingerprint, error = %e, "Failed to cache cell"),
            }
        }
    }

    /// Value of the totals column for one row.
    ///
    /// Recomputed totals are cached under the full-window column key once
    /// the whole report window has closed.
    async fn row_total(
        &self,
        row: &Row,
        row_key: &str,
        buckets: &BucketValues,
        cache: Option<CellCache<'_>>,
    ) -> Result<Value> {
        let config = self.report.config();
        let columns = self.report.columns();

        match row.function().total_strategy() {
            TotalStrategy::SumOfBuckets => Ok(buckets.values().copied().fold(Value::ZERO, Value::add)),
            TotalStrategy::LastBucket => Ok(columns
                .last()
                .and_then(|column| buckets.get(&column.key()))
                .copied()
                .unwrap_or(Value::ZERO)),
            TotalStrategy::Recompute => {
                let span = self.report.total_column();
                let mut cell = Cell::new(
                    Fingerprint::new(
                        self.report.cache_key(),
                        row_key,
                        span.cache_key(&config.cache_separator),
                    ),
                    &span,
                    cache.is_some() && span.is_cacheable(self.report.now()),
                );
                cell.begin()?;

                if let Some(cache) = cache.filter(|_| cell.is_cacheable()) {
                    if let Some(value) = cache.read(cell.fingerprint()).await? {
                        log_cache_io!(self.log_config, fingerprint = %cell.fingerprint(), "Cache hit");
                        return cell.resolve(value);
                    }
                }

                let request = row.request(config.max_concurrency);
                let raw = row
                    .function()
                    .evaluate_total(self.source, &request, &span)
                    .await?;
                let value = cell.resolve(row.finish(raw, config.precision))?;

                if let Some(cache) = cache.filter(|_| cell.is_cacheable()) {
                    self.write_back(&cache, &[&cell]).await;
                }
                Ok(value)
            }
        }
    }
}

fn table_row(title: &str, bucket_keys: &[String], values: RowValues) -> TableRow {
    let mut cells: Vec<(String, Value)> = bucket_keys
        .iter()
        .map(|key| {
            (
                key.clone(),
                values.buckets.get(key).copied().unwrap_or(Value::ZERO),
            )
        })
        .collect();
    if let Some(total) = values.total {
        cells.push((TOTAL_KEY.to_string(), total));
    }
    TableRow {
        title: title.to_string(),
        values: cells,
    }
}
