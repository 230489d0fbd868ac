//! Integration tests for report evaluation against the in-memory source.

mod common;

use common::{at, orders_source};
use std::sync::{Arc, Mutex};
use timely_report::prelude::*;
use timely_report::report::ReportRunner;

fn orders() -> Scope {
    Scope::new("orders")
}

fn quarter_report() -> timely_report::report::ReportBuilder {
    Report::builder("Sales", Period::Month)
        .starts_at(at(2024, 1, 1))
        .length(3)
        .now(at(2024, 6, 1))
        .show_totals(true)
}

#[tokio::test]
async fn test_count_and_cumulative_example() {
    let report = quarter_report()
        .row(RowSpec::new("Orders", "count", orders()))
        .row(RowSpec::new("Running orders", "cumulative", orders()))
        .build()
        .unwrap();

    let table = report.run(&orders_source(), None).await.unwrap();

    let count = table.row("Orders").unwrap();
    assert_eq!(count.get("202401"), Some(Value::Long(2)));
    assert_eq!(count.get("202402"), Some(Value::Long(4)));
    assert_eq!(count.get("202403"), Some(Value::Long(0)));
    assert_eq!(count.total(), Some(Value::Long(6)));

    // base of 10 orders before January
    let cumulative = table.row("Running orders").unwrap();
    assert_eq!(cumulative.get("202401"), Some(Value::Long(12)));
    assert_eq!(cumulative.get("202402"), Some(Value::Long(16)));
    assert_eq!(cumulative.get("202403"), Some(Value::Long(16)));
    assert_eq!(cumulative.total(), Some(Value::Long(16)));
}

#[tokio::test]
async fn test_average_total_is_not_a_mean_of_means() {
    let report = quarter_report()
        .row(RowSpec::new("Avg. value", "average", orders()).arg("amount"))
        .build()
        .unwrap();

    let table = report.run(&orders_source(), None).await.unwrap();
    let row = table.row("Avg. value").unwrap();

    assert_eq!(row.get("202401"), Some(Value::Long(15)));
    assert_eq!(row.get("202402"), Some(Value::Double(2.5)));
    assert_eq!(row.get("202403"), Some(Value::ZERO));
    // (10 + 20 + 1 + 2 + 3 + 4) / 6, where the mean of the bucket means would be 8.75
    assert_eq!(row.total(), Some(Value::Double(6.67)));
}

#[tokio::test]
async fn test_sum_present_and_lifetime_totals() {
    let report = quarter_report()
        .row(RowSpec::new("Revenue", "sum", orders()).arg("amount"))
        .row(RowSpec::new("Paid", "present", orders()).arg("paid_at"))
        .row(RowSpec::new("All orders", "total_count", orders()))
        .row(RowSpec::new("All revenue", "total_sum", orders()).arg("amount"))
        .build()
        .unwrap();

    let table = report.run(&orders_source(), None).await.unwrap();

    assert_eq!(table.value("Revenue", "202401"), Some(Value::Long(30)));
    assert_eq!(table.value("Revenue", "total"), Some(Value::Long(40)));
    assert_eq!(table.value("Paid", "202401"), Some(Value::Long(1)));
    assert_eq!(table.value("Paid", "total"), Some(Value::Long(5)));

    assert_eq!(table.value("All orders", "202401"), Some(Value::Long(12)));
    assert_eq!(table.value("All orders", "202403"), Some(Value::Long(16)));
    assert_eq!(table.value("All orders", "total"), Some(Value::Long(16)));
    assert_eq!(table.value("All revenue", "202401"), Some(Value::Long(40)));
    assert_eq!(table.value("All revenue", "202402"), Some(Value::Long(50)));
    assert_eq!(table.value("All revenue", "total"), Some(Value::Long(50)));
}

#[tokio::test]
async fn test_summary_rows_and_safe_divide() {
    let report = quarter_report()
        .row(RowSpec::new("Orders", "count", orders()))
        .row(RowSpec::new("Revenue", "sum", orders()).arg("amount").hidden())
        .summary(SummaryRow::new(
            "Revenue per order",
            Combinator::SafeDivide,
            ["Revenue", "Orders"],
        ))
        .build()
        .unwrap();

    let table = report.run(&orders_source(), None).await.unwrap();

    assert_eq!(table.row_titles(), vec!["Orders", "Revenue per order"]);
    assert_eq!(table.value("Revenue per order", "202401"), Some(Value::Long(15)));
    assert_eq!(table.value("Revenue per order", "202402"), Some(Value::Double(2.5)));
    // zero orders in March
    assert_eq!(table.value("Revenue per order", "202403"), Some(Value::ZERO));
    assert_eq!(
        table.value("Revenue per order", "total"),
        Some(Value::Double(40.0 / 6.0))
    );
}

#[tokio::test]
async fn test_percentage_of() {
    let report = quarter_report()
        .row(RowSpec::new("Orders", "count", orders()))
        .row(
            RowSpec::new("Paid", "present", orders())
                .arg("paid_at")
                .percentage_of("Orders"),
        )
        .build()
        .unwrap();

    let table = report.run(&orders_source(), None).await.unwrap();

    assert_eq!(table.row_titles(), vec!["Orders", "Paid %"]);
    assert_eq!(table.value("Paid %", "202401"), Some(Value::Long(50)));
    assert_eq!(table.value("Paid %", "202402"), Some(Value::Long(100)));
    assert_eq!(table.value("Paid %", "202403"), Some(Value::ZERO));
    assert_eq!(table.value("Paid %", "total"), Some(Value::Double(83.3)));
}

#[tokio::test]
async fn test_summary_referencing_a_later_row_fails() {
    let report = quarter_report()
        .row(RowSpec::new("Orders", "count", orders()))
        .summary(SummaryRow::new(
            "Paid ratio",
            Combinator::SafeDivide,
            ["Paid", "Orders"],
        ))
        .row(RowSpec::new("Paid", "present", orders()).arg("paid_at"))
        .build()
        .unwrap();

    let err = report.run(&orders_source(), None).await.unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("'Paid'"));
}

#[tokio::test]
async fn test_dynamic_scope_and_params() {
    let report = quarter_report()
        .params(ReportParams::new().with("region", "eu"))
        .row(RowSpec::new("Orders", "count", orders()).scope_fn(|params| {
            Scope::new("orders").where_eq("region", params.get_str("region").unwrap_or("us"))
        }))
        .build()
        .unwrap();

    assert!(report.cache_key().starts_with("sales-"));
    let table = report.run(&orders_source(), None).await.unwrap();
    assert_eq!(table.value("Orders", "202401"), Some(Value::Long(1)));
    assert_eq!(table.value("Orders", "202402"), Some(Value::Long(2)));
    assert_eq!(table.value("Orders", "total"), Some(Value::Long(3)));
}

#[tokio::test]
async fn test_map_runs_after_transform() {
    let report = quarter_report()
        .show_totals(false)
        .row(
            RowSpec::new("Avg. value (cents)", "average", orders())
                .arg("amount")
                .map(|v| v.multiply(Value::Long(100))),
        )
        .build()
        .unwrap();

    let table = report.run(&orders_source(), None).await.unwrap();
    assert_eq!(table.value("Avg. value (cents)", "202402"), Some(Value::Long(250)));
    assert_eq!(table.value("Avg. value (cents)", "total"), None);
    assert!(!table.has_totals());
}

#[tokio::test]
async fn test_data_source_errors_propagate() {
    let report = quarter_report()
        .row(RowSpec::new("Refunds", "count", Scope::new("refunds")))
        .build()
        .unwrap();

    let err = report.run(&orders_source(), None).await.unwrap_err();
    assert!(matches!(err, ReportError::DataSource { .. }));
}

#[tokio::test]
async fn test_misspelled_field_is_an_error() {
    let report = quarter_report()
        .row(RowSpec::new("Revenue", "sum", orders()).arg("amout"))
        .build()
        .unwrap();

    let err = report.run(&orders_source(), None).await.unwrap_err();
    assert!(matches!(err, ReportError::ColumnNotFound { ref column, .. } if column == "amout"));
}

#[tokio::test]
async fn test_progress_reports_each_line() {
    let report = quarter_report()
        .row(RowSpec::new("Orders", "count", orders()))
        .row(RowSpec::new("Revenue", "sum", orders()).arg("amount"))
        .build()
        .unwrap();
    let source = orders_source();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = seen.clone();
    ReportRunner::new(&report, &source)
        .on_progress(move |p| recorder.lock().unwrap().push(p))
        .run()
        .await
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![0.5, 1.0]);
}

#[tokio::test]
async fn test_weekly_report_with_ends_at() {
    let report = Report::builder("Weekly", Period::Week)
        .starts_at(at(2024, 1, 24))
        .ends_at(at(2024, 2, 10))
        .now(at(2024, 6, 1))
        .row(RowSpec::new("Orders", "count", orders()))
        .build()
        .unwrap();

    // Monday 22 Jan through the week containing 10 Feb
    assert_eq!(report.starts_at(), at(2024, 1, 22));
    assert_eq!(report.length(), 3);

    let table = report.run(&orders_source(), None).await.unwrap();
    let keys: Vec<&str> = table.headings.iter().map(|h| h.key.as_str()).collect();
    assert_eq!(keys, vec!["202404", "202405", "202406"]);
    assert_eq!(table.value("Orders", "202404"), Some(Value::Long(1)));
    assert_eq!(table.value("Orders", "202405"), Some(Value::Long(1)));
    assert_eq!(table.value("Orders", "202406"), Some(Value::Long(1)));
}
