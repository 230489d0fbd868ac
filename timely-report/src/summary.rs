//! Summary rows: arithmetic over rows computed earlier in the same report.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{ReportError, Result};
use crate::functions::BucketValues;
use crate::row::{RowValues, ValueMap};
use crate::value::{Transform, Value};

/// Bucket-wise arithmetic applied to the source rows of a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Combinator {
    /// Adds all sources.
    Sum,
    /// Divides the first source by each following one; a zero denominator
    /// yields 0.
    SafeDivide,
    /// Multiplies all sources.
    Multiply,
}

impl Combinator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Combinator::Sum => "sum",
            Combinator::SafeDivide => "safe_divide",
            Combinator::Multiply => "multiply",
        }
    }

    /// Smallest number of source rows the combinator accepts.
    pub fn min_sources(&self) -> usize {
        match self {
            Combinator::SafeDivide => 2,
            Combinator::Sum | Combinator::Multiply => 1,
        }
    }

    /// Combines one value per source, in source order.
    pub fn apply(&self, values: &[Value]) -> Value {
        let mut iter = values.iter().copied();
        match self {
            Combinator::Sum => iter.fold(Value::ZERO, Value::add),
            Combinator::Multiply => match iter.next() {
                Some(first) => iter.fold(first, Value::multiply),
                None => Value::ZERO,
            },
            Combinator::SafeDivide => match iter.next() {
                Some(first) => iter.fold(first, Value::safe_divide),
                None => Value::ZERO,
            },
        }
    }
}

impl fmt::Display for Combinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Combinator {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "sum" | "add" => Ok(Combinator::Sum),
            "safe_divide" | "divide" => Ok(Combinator::SafeDivide),
            "multiply" | "product" => Ok(Combinator::Multiply),
            other => Err(ReportError::configuration(format!(
                "No summary combinator defined for '{other}' (known: sum, safe_divide, multiply)"
            ))),
        }
    }
}

/// A row derived from other rows of the same report.
///
/// Per bucket: combine the source values, apply `post_map`, then the
/// transform.
///
/// ```rust
/// use timely_report::summary::{Combinator, SummaryRow};
/// use timely_report::value::{Transform, Value};
///
/// let conversion = SummaryRow::new("Conversion", Combinator::SafeDivide, ["Orders", "Visits"])
///     .post_map(|v| v.multiply(Value::Long(100)))
///     .transform(Transform::RoundTo(1));
/// assert_eq!(conversion.sources(), ["Orders", "Visits"]);
/// ```
#[derive(Clone)]
pub struct SummaryRow {
    title: String,
    combinator: Combinator,
    sources: Vec<String>,
    post_map: Option<ValueMap>,
    transform: Transform,
    hidden: bool,
}

impl SummaryRow {
    pub fn new<I, S>(title: impl Into<String>, combinator: Combinator, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            title: title.into(),
            combinator,
            sources: sources.into_iter().map(Into::into).collect(),
            post_map: None,
            transform: Transform::None,
            hidden: false,
        }
    }

    /// Summary showing `title` as a percentage of `reference`, rounded to
    /// one decimal.
    pub fn percentage(title: &str, reference: &str) -> Self {
        Self::new(
            format!("{title} %"),
            Combinator::SafeDivide,
            [title.to_string(), reference.to_string()],
        )
        .post_map(|v| v.multiply(Value::Long(100)))
        .transform(Transform::RoundTo(1))
    }

    /// Applies `f` to every combined value.
    pub fn post_map<F>(mut self, f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.post_map = Some(Arc::new(f));
        self
    }

    pub fn transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn combinator(&self) -> Combinator {
        self.combinator
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Checks the source count against the combinator.
    pub fn validate(&self) -> Result<()> {
        if self.sources.len() < self.combinator.min_sources() {
            return Err(ReportError::configuration(format!(
                "summary row '{}': {} needs at least {} source row(s), got {}",
                self.title,
                self.combinator,
                self.combinator.min_sources(),
                self.sources.len()
            )));
        }
        Ok(())
    }

    /// Computes the summary from rows already materialized in this pass.
    ///
    /// Fails if any source row has not been computed yet. The totals value is
    /// combined from the source totals when every source has one.
    pub fn evaluate(
        &self,
        computed: &HashMap<String, RowValues>,
        bucket_keys: &[String],
        precision: u32,
    ) -> Result<RowValues> {
        let sources = self
            .sources
            .iter()
            .map(|title| {
                computed.get(title).ok_or_else(|| {
                    ReportError::configuration(format!(
                        "summary row '{}' references '{title}', which has not been computed \
                         (rows are evaluated in declaration order)",
                        self.title
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let buckets: BucketValues = bucket_keys
            .iter()
            .map(|key| {
                let values: Vec<Value> = sources
                    .iter()
                    .map(|row| row.buckets.get(key).copied().unwrap_or(Value::ZERO))
                    .collect();
                (key.clone(), self.finish(&values, precision))
            })
            .collect();

        let total = sources
            .iter()
            .map(|row| row.total)
            .collect::<Option<Vec<Value>>>()
            .map(|values| self.finish(&values, precision));

        Ok(RowValues { buckets, total })
    }

    fn finish(&self, values: &[Value], precision: u32) -> Value {
        let combined = self.combinator.apply(values);
        let mapped = match &self.post_map {
            Some(f) => f(combined),
            None => combined,
        };
        self.transform.apply(mapped, precision).normalized()
    }
}

impl fmt::Debug for SummaryRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SummaryRow")
            .field("title", &self.title)
            .field("combinator", &self.combinator)
            .field("sources", &self.sources)
            .field("transform", &self.transform)
            .field("hidden", &self.hidden)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, Value)], total: Option<Value>) -> RowValues {
        RowValues {
            buckets: pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            total,
        }
    }

    fn keys() -> Vec<String> {
        vec!["202401".to_string(), "202402".to_string()]
    }

    #[test]
    fn test_combinator_parsing() {
        assert_eq!("sum".parse::<Combinator>().unwrap(), Combinator::Sum);
        assert_eq!("add".parse::<Combinator>().unwrap(), Combinator::Sum);
        assert_eq!("divide".parse::<Combinator>().unwrap(), Combinator::SafeDivide);
        assert_eq!("Product".parse::<Combinator>().unwrap(), Combinator::Multiply);
        assert!("median".parse::<Combinator>().unwrap_err().is_configuration());
    }

    #[test]
    fn test_combinator_apply() {
        let v = [Value::Long(6), Value::Long(3), Value::Double(0.5)];
        assert_eq!(Combinator::Sum.apply(&v), Value::Double(9.5));
        assert_eq!(Combinator::Multiply.apply(&v), Value::Long(9));
        assert_eq!(Combinator::SafeDivide.apply(&v), Value::Long(4));
        assert_eq!(
            Combinator::SafeDivide.apply(&[Value::Long(5), Value::ZERO]),
            Value::ZERO
        );
    }

    #[test]
    fn test_evaluate_percentage_with_zero_denominator() {
        let mut computed = HashMap::new();
        computed.insert(
            "Paid".to_string(),
            values(&[("202401", Value::Long(1)), ("202402", Value::Long(3))], Some(Value::Long(4))),
        );
        computed.insert(
            "Orders".to_string(),
            values(&[("202401", Value::Long(3)), ("202402", Value::ZERO)], Some(Value::Long(3))),
        );

        let summary = SummaryRow::percentage("Paid", "Orders");
        assert_eq!(summary.title(), "Paid %");
        let result = summary.evaluate(&computed, &keys(), 2).unwrap();

        assert_eq!(result.buckets["202401"], Value::Double(33.3));
        assert_eq!(result.buckets["202402"], Value::ZERO);
        assert_eq!(result.total, Some(Value::Double(133.3)));
    }

    #[test]
    fn test_missing_source_is_a_configuration_error() {
        let mut computed = HashMap::new();
        computed.insert("Orders".to_string(), values(&[], None));

        let summary = SummaryRow::new("Both", Combinator::Sum, ["Orders", "Refunds"]);
        let err = summary.evaluate(&computed, &keys(), 2).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("Refunds"));
    }

    #[test]
    fn test_total_needs_every_source_total() {
        let mut computed = HashMap::new();
        computed.insert("A".to_string(), values(&[("202401", Value::Long(1))], Some(Value::Long(1))));
        computed.insert("B".to_string(), values(&[("202401", Value::Long(2))], None));

        let result = SummaryRow::new("A+B", Combinator::Sum, ["A", "B"])
            .evaluate(&computed, &keys(), 2)
            .unwrap();
        assert_eq!(result.buckets["202401"], Value::Long(3));
        // absent source buckets count as zero
        assert_eq!(result.buckets["202402"], Value::ZERO);
        assert_eq!(result.total, None);
    }

    #[test]
    fn test_validate_source_count() {
        assert!(SummaryRow::new("x", Combinator::SafeDivide, ["A"]).validate().is_err());
        assert!(SummaryRow::new("x", Combinator::Sum, ["A"]).validate().is_ok());
        assert!(SummaryRow::new("x", Combinator::Sum, Vec::<String>::new()).validate().is_err());
    }
}
