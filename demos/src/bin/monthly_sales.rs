//! Monthly sales report over an in-memory order book
//!
//! Usage: `cargo run -p timely-report-demos --bin monthly_sales -- [json|human|markdown|csv]`

use anyhow::Result;
use chrono::{DateTime, Datelike, TimeDelta, Utc};
use serde_json::json;
use timely_report::logging::setup::{init_logging, SubscriberConfig};
use timely_report::prelude::*;
use tracing::Level;

/// A year of orders, a few per day, with some paid and some shipped.
fn order_book(start: DateTime<Utc>) -> Vec<serde_json::Value> {
    (0..1_200)
        .map(|i: i64| {
            let created = start + TimeDelta::hours(i * 7);
            let paid = (i % 4 != 0).then(|| (created + TimeDelta::hours(i % 30)).to_rfc3339());
            let shipped = (i % 5 == 0).then(|| (created + TimeDelta::days(1 + i % 6)).to_rfc3339());
            json!({
                "created_at": created.to_rfc3339(),
                "paid_at": paid,
                "shipped_at": shipped,
                "amount": 15 + (i * 37) % 120,
                "channel": if created.weekday().num_days_from_monday() < 5 { "web" } else { "store" },
            })
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging(&SubscriberConfig::default().with_default_level(Level::WARN))?;

    let format = std::env::args().nth(1).unwrap_or_else(|| "human".to_string());
    let year_start: DateTime<Utc> = "2024-01-01T00:00:00Z".parse()?;
    let source = MemorySource::with_table("orders", order_book(year_start + TimeDelta::hours(9)))?;
    let orders = || Scope::new("orders");

    let report = Report::builder("Monthly sales", Period::Month)
        .starts_at(year_start)
        .length(6)
        .now("2024-09-01T00:00:00Z".parse()?)
        .show_totals(true)
        .params(ReportParams::new().with("channel", "web"))
        .row(RowSpec::new("Orders", "count", orders()))
        .row(RowSpec::new("Web orders", "count", orders()).scope_fn(|params| {
            Scope::new("orders").where_eq("channel", params.get_str("channel").unwrap_or("web"))
        }))
        .row(RowSpec::new("Paid", "present", orders()).arg("paid_at").percentage_of("Orders"))
        .row(RowSpec::new("Revenue", "sum", orders()).arg("amount"))
        .row(RowSpec::new("Avg. value", "average", orders()).arg("amount"))
        .row(RowSpec::new("Days to ship", "avg_days_between", orders()).args(["created_at", "shipped_at"]))
        .row(RowSpec::new("All-time orders", "total_count", orders()))
        .summary(SummaryRow::new("Revenue per order", Combinator::SafeDivide, ["Revenue", "Orders"]))
        .build()?;

    let cache_dir = tempfile::tempdir()?;
    let cache = FileSystemCacheStore::new(cache_dir.path())?;

    // The second run is answered from the cache for every closed month
    report.run(&source, Some(&cache)).await?;
    let table = report.run(&source, Some(&cache)).await?;

    let formatters = FormatterRegistry::default();
    println!("{}", formatters.format(&format, &table)?);
    Ok(())
}
