//! The finished, formatter-facing form of a report.

use chrono::{DateTime, Utc};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::period::Period;
use crate::value::Value;

/// Bucket key of the totals column.
pub const TOTAL_KEY: &str = "total";

/// Title of the totals column.
pub const TOTAL_TITLE: &str = "Total";

/// One column heading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Heading {
    /// Bucket key, or [`TOTAL_KEY`]
    pub key: String,
    /// Human title
    pub title: String,
}

/// Values of one visible row, in column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub title: String,
    #[serde(serialize_with = "ordered_values")]
    pub values: Vec<(String, Value)>,
}

impl TableRow {
    /// Value under a bucket key (or [`TOTAL_KEY`]).
    pub fn get(&self, key: &str) -> Option<Value> {
        self.values
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, value)| *value)
    }

    /// Value of the totals column, if shown.
    pub fn total(&self) -> Option<Value> {
        self.get(TOTAL_KEY)
    }
}

/// Ordered mapping of row title to ordered bucket values, plus headings.
///
/// Hidden rows are not part of the table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportTable {
    pub title: String,
    pub period: Period,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
    pub headings: Vec<Heading>,
    #[serde(serialize_with = "ordered_rows")]
    pub rows: Vec<TableRow>,
}

impl ReportTable {
    /// Looks up a visible row by title.
    pub fn row(&self, title: &str) -> Option<&TableRow> {
        self.rows.iter().find(|row| row.title == title)
    }

    /// Value of one cell.
    pub fn value(&self, row_title: &str, key: &str) -> Option<Value> {
        self.row(row_title).and_then(|row| row.get(key))
    }

    /// Row titles in output order.
    pub fn row_titles(&self) -> Vec<&str> {
        self.rows.iter().map(|row| row.title.as_str()).collect()
    }

    /// Returns true if the table has a totals column.
    pub fn has_totals(&self) -> bool {
        self.headings.iter().any(|heading| heading.key == TOTAL_KEY)
    }
}

fn ordered_values<S>(values: &[(String, Value)], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(values.len()))?;
    for (key, value) in values {
        map.serialize_entry(key, value)?;
    }
    map.end()
}

fn ordered_rows<S>(rows: &[TableRow], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    struct Values<'a>(&'a [(String, Value)]);

    impl Serialize for Values<'_> {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            ordered_values(self.0, serializer)
        }
    }

    let mut map = serializer.serialize_map(Some(rows.len()))?;
    for row in rows {
        map.serialize_entry(&row.title, &Values(&row.values))?;
    }
    map.end()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> ReportTable {
        ReportTable {
            title: "Sales".to_string(),
            period: Period::Month,
            starts_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            ends_at: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            generated_at: Utc.with_ymd_and_hms(2024, 4, 2, 8, 30, 0).unwrap(),
            headings: vec![
                Heading { key: "202401".into(), title: "Jan 2024".into() },
                Heading { key: "202402".into(), title: "Feb 2024".into() },
                Heading { key: TOTAL_KEY.into(), title: TOTAL_TITLE.into() },
            ],
            rows: vec![
                TableRow {
                    title: "Orders".into(),
                    values: vec![
                        ("202401".into(), Value::Long(2)),
                        ("202402".into(), Value::Long(4)),
                        (TOTAL_KEY.into(), Value::Long(6)),
                    ],
                },
                TableRow {
                    title: "Avg. value".into(),
                    values: vec![
                        ("202401".into(), Value::Double(15.45)),
                        ("202402".into(), Value::Long(5)),
                        (TOTAL_KEY.into(), Value::Double(8.48)),
                    ],
                },
            ],
        }
    }

    #[test]
    fn test_lookups() {
        let table = sample();
        assert_eq!(table.value("Orders", "202402"), Some(Value::Long(4)));
        assert_eq!(table.row("Orders").unwrap().total(), Some(Value::Long(6)));
        assert_eq!(table.value("Missing", "202402"), None);
        assert_eq!(table.row_titles(), vec!["Orders", "Avg. value"]);
        assert!(table.has_totals());
    }

    #[test]
    fn test_serialization_keeps_order() {
        let json = serde_json::to_string(&sample()).unwrap();
        let orders = json.find("\"Orders\"").unwrap();
        let avg = json.find("\"Avg. value\"").unwrap();
        assert!(orders < avg);
        assert!(json.contains("{\"202401\":2,\"202402\":4,\"total\":6}"));
        assert!(json.contains("\"period\":\"month\""));
    }
}
