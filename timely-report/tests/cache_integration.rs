//! Integration tests for closed-window caching.

mod common;

use async_trait::async_trait;
use common::{at, orders_source, CountingSource};
use timely_report::cache::CellCache;
use timely_report::prelude::*;
use timely_report::report::ReportBuilder;

fn orders() -> Scope {
    Scope::new("orders")
}

fn sales(now: chrono::DateTime<chrono::Utc>) -> ReportBuilder {
    Report::builder("Sales", Period::Month)
        .starts_at(at(2024, 1, 1))
        .length(3)
        .now(now)
}

#[tokio::test]
async fn test_warm_run_reads_closed_cells_from_cache() {
    let report = sales(at(2024, 6, 1))
        .row(RowSpec::new("Orders", "count", orders()))
        .build()
        .unwrap();
    let source = CountingSource::new(orders_source());
    let cache = InMemoryCacheStore::new();

    let cold = report.run(&source, Some(&cache)).await.unwrap();
    assert_eq!(source.calls(), 3);
    assert_eq!(cache.len().await, 3);

    let warm = report.run(&source, Some(&cache)).await.unwrap();
    assert_eq!(source.calls(), 3);
    assert_eq!(cold.rows, warm.rows);
    assert_eq!(
        cache.get("sales:orders.count:1704067200:1706745600").await.unwrap(),
        Some("2".to_string())
    );
}

#[tokio::test]
async fn test_rows_with_alike_titles_keep_separate_cells() {
    for (first, second) in [("注文", "返品"), ("Orders (EU)", "Orders EU")] {
        let report = sales(at(2024, 6, 1))
            .row(RowSpec::new(first, "count", orders().where_eq("region", "eu")))
            .row(RowSpec::new(second, "count", orders().where_eq("region", "us")))
            .build()
            .unwrap();
        let source = CountingSource::new(orders_source());
        let cache = InMemoryCacheStore::new();

        let uncached = report.run(&orders_source(), None).await.unwrap();
        let cold = report.run(&source, Some(&cache)).await.unwrap();
        assert_eq!(source.calls(), 6);
        assert_eq!(cache.len().await, 6);
        let warm = report.run(&source, Some(&cache)).await.unwrap();
        assert_eq!(source.calls(), 6);

        assert_eq!(cold.rows, uncached.rows);
        assert_eq!(warm.rows, uncached.rows);
        assert_eq!(warm.value(first, "202402"), Some(Value::Long(2)));
        assert_eq!(warm.value(second, "202401"), Some(Value::Long(1)));
    }
}

#[tokio::test]
async fn test_open_window_is_never_cached() {
    let report = sales(at(2024, 3, 15))
        .row(RowSpec::new("Orders", "count", orders()))
        .build()
        .unwrap();
    let source = CountingSource::new(orders_source());
    let cache = InMemoryCacheStore::new();

    report.run(&source, Some(&cache)).await.unwrap();
    assert_eq!(cache.len().await, 2);

    report.run(&source, Some(&cache)).await.unwrap();
    // only March is queried again
    assert_eq!(source.calls(), 4);
}

#[tokio::test]
async fn test_recomputed_total_is_cached_once_the_window_closes() {
    let report = sales(at(2024, 6, 1))
        .show_totals(true)
        .row(RowSpec::new("Avg. value", "average", orders()).arg("amount"))
        .build()
        .unwrap();
    let source = CountingSource::new(orders_source());
    let cache = InMemoryCacheStore::new();

    let cold = report.run(&source, Some(&cache)).await.unwrap();
    assert_eq!(source.calls(), 4);
    let warm = report.run(&source, Some(&cache)).await.unwrap();
    assert_eq!(source.calls(), 4);
    assert_eq!(warm.value("Avg. value", "total"), Some(Value::Double(6.67)));
    assert_eq!(cold.rows, warm.rows);
}

#[tokio::test]
async fn test_hash_addressing_and_row_eviction() {
    let config = ReportConfig::default().with_cache_addressing(CacheAddressing::Hash);
    let report = sales(at(2024, 6, 1))
        .config(config)
        .row(RowSpec::new("Orders", "count", orders()))
        .row(RowSpec::new("Revenue", "sum", orders()).arg("amount"))
        .build()
        .unwrap();
    let source = CountingSource::new(orders_source());
    let cache = InMemoryCacheStore::new();

    report.run(&source, Some(&cache)).await.unwrap();
    assert_eq!(source.calls(), 6);
    assert_eq!(
        cache
            .hget("sales:revenue.sum.amount", "1706745600:1709251200")
            .await
            .unwrap(),
        Some("10".to_string())
    );

    let cells = CellCache::new(
        &cache,
        report.config().cache_addressing,
        &report.config().cache_separator,
    );
    assert_eq!(cells.evict_row(report.cache_key(), "orders.count").await.unwrap(), 3);

    report.run(&source, Some(&cache)).await.unwrap();
    // the evicted row is recomputed, the other one stays cached
    assert_eq!(source.calls(), 9);
}

#[tokio::test]
async fn test_file_system_store_survives_between_runs() {
    let dir = tempfile::tempdir().unwrap();
    let report = sales(at(2024, 6, 1))
        .row(RowSpec::new("Revenue", "sum", orders()).arg("amount"))
        .build()
        .unwrap();
    let source = CountingSource::new(orders_source());

    let first = {
        let store = FileSystemCacheStore::new(dir.path()).unwrap();
        report.run(&source, Some(&store)).await.unwrap()
    };
    assert_eq!(source.calls(), 3);

    let store = FileSystemCacheStore::new(dir.path()).unwrap();
    let second = report.run(&source, Some(&store)).await.unwrap();
    assert_eq!(source.calls(), 3);
    assert_eq!(first.rows, second.rows);
    assert_eq!(second.value("Revenue", "202401"), Some(Value::Long(30)));
}

#[tokio::test]
async fn test_rows_opting_out_skip_the_cache() {
    let report = sales(at(2024, 6, 1))
        .row(RowSpec::new("Orders", "count", orders()).not_cacheable())
        .build()
        .unwrap();
    let source = CountingSource::new(orders_source());
    let cache = InMemoryCacheStore::new();

    report.run(&source, Some(&cache)).await.unwrap();
    report.run(&source, Some(&cache)).await.unwrap();
    assert!(cache.is_empty().await);
    assert_eq!(source.calls(), 6);
}

/// Store whose reads or writes always fail.
#[derive(Debug, Default)]
struct BrokenStore {
    fail_reads: bool,
}

#[async_trait]
impl CacheStore for BrokenStore {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        if self.fail_reads {
            Err(ReportError::cache("connection refused"))
        } else {
            Ok(None)
        }
    }

    async fn set(&self, _key: &str, _value: String) -> Result<()> {
        Err(ReportError::cache("read-only replica"))
    }

    async fn hget(&self, hash_key: &str, _field: &str) -> Result<Option<String>> {
        self.get(hash_key).await
    }

    async fn hset(&self, hash_key: &str, _field: &str, value: String) -> Result<()> {
        self.set(hash_key, value).await
    }

    async fn delete_hash(&self, _hash_key: &str) -> Result<usize> {
        Ok(0)
    }
}

#[tokio::test]
async fn test_failed_cache_writes_keep_computed_values() {
    let report = sales(at(2024, 6, 1))
        .row(RowSpec::new("Orders", "count", orders()))
        .build()
        .unwrap();

    let table = report
        .run(&orders_source(), Some(&BrokenStore::default()))
        .await
        .unwrap();
    assert_eq!(table.value("Orders", "202402"), Some(Value::Long(4)));
}

#[tokio::test]
async fn test_failed_cache_reads_abort_the_run() {
    let report = sales(at(2024, 6, 1))
        .row(RowSpec::new("Orders", "count", orders()))
        .build()
        .unwrap();

    let err = report
        .run(&orders_source(), Some(&BrokenStore { fail_reads: true }))
        .await
        .unwrap_err();
    assert!(matches!(err, ReportError::Cache { .. }));
}
