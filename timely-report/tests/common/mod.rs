//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use timely_report::error::Result;
use timely_report::sources::{AggregateQuery, DataSource, MemorySource, Window};

pub fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

/// Orders spread around the first quarter of 2024.
///
/// - 10 orders during 2023, amount 1 each, never paid
/// - January 2024: 2 orders, amounts 10 and 20, one paid
/// - February 2024: 4 orders, amounts 1 to 4, all paid
/// - March 2024: nothing
pub fn orders_source() -> MemorySource {
    let mut records = Vec::new();
    for month in 1..=10 {
        records.push(json!({
            "created_at": format!("2023-{month:02}-15T12:00:00Z"),
            "amount": 1,
            "paid_at": null,
            "region": "us",
        }));
    }
    records.push(json!({"created_at": "2024-01-03T09:00:00Z", "amount": 10, "paid_at": "2024-01-04T09:00:00Z", "region": "eu"}));
    records.push(json!({"created_at": "2024-01-28T17:45:00Z", "amount": 20, "paid_at": "", "region": "us"}));
    for (day, amount) in [(1, 1), (8, 2), (15, 3), (29, 4)] {
        records.push(json!({
            "created_at": format!("2024-02-{day:02}T08:00:00Z"),
            "amount": amount,
            "paid_at": format!("2024-02-{day:02}T20:00:00Z"),
            "region": if amount % 2 == 0 { "eu" } else { "us" },
        }));
    }
    MemorySource::with_table("orders", records).unwrap()
}

/// Delegates to a [`MemorySource`] and counts the queries it receives.
#[derive(Debug, Clone)]
pub struct CountingSource {
    inner: MemorySource,
    calls: Arc<AtomicUsize>,
}

impl CountingSource {
    pub fn new(inner: MemorySource) -> Self {
        Self {
            inner,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataSource for CountingSource {
    async fn aggregate(&self, query: &AggregateQuery, window: &Window) -> Result<Option<f64>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.aggregate(query, window).await
    }

    fn description(&self) -> String {
        format!("counting({})", self.inner.description())
    }
}
