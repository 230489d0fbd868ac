//! Lookup of aggregation functions by tag.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::advanced::{DateIntervalFunction, IntervalUnit, StandardDeviationFunction};
use super::basic::{
    AverageFunction, CountFunction, CumulativeFunction, PresentFunction, SumFunction,
    TotalCountFunction, TotalSumFunction,
};
use super::AggregationFunction;
use crate::error::{ReportError, Result};

/// Maps tags (and aliases) to aggregation functions.
///
/// [`FunctionRegistry::default`] knows every built-in kind. Custom kinds can
/// be added with [`register`](FunctionRegistry::register).
///
/// # Example
///
/// ```rust
/// use timely_report::functions::FunctionRegistry;
///
/// let registry = FunctionRegistry::default();
/// assert_eq!(registry.resolve("avg", 1).unwrap().name(), "average");
/// assert!(registry.resolve("median", 1).is_err());
/// assert!(registry.resolve("sum", 2).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<dyn AggregationFunction>>,
}

impl FunctionRegistry {
    /// Creates a registry with no functions.
    pub fn empty() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// Registers a function under its own name, replacing any previous one.
    pub fn register(&mut self, function: Arc<dyn AggregationFunction>) -> &mut Self {
        debug!(function = function.name(), "Registering aggregation function");
        self.functions.insert(function.name().to_string(), function);
        self
    }

    /// Makes `alias` resolve to the function registered as `target`.
    pub fn register_alias(&mut self, alias: &str, target: &str) -> Result<&mut Self> {
        let function = self.get(target)?;
        self.functions.insert(alias.to_string(), function);
        Ok(self)
    }

    /// Returns the function registered under `tag`.
    pub fn get(&self, tag: &str) -> Result<Arc<dyn AggregationFunction>> {
        self.functions.get(tag).cloned().ok_or_else(|| {
            ReportError::configuration(format!(
                "No aggregation function defined for '{tag}' (known: {})",
                self.names().join(", ")
            ))
        })
    }

    /// Looks up `tag` and checks that it takes `arg_count` column arguments.
    pub fn resolve(&self, tag: &str, arg_count: usize) -> Result<Arc<dyn AggregationFunction>> {
        let function = self.get(tag)?;
        if function.arity() != arg_count {
            return Err(ReportError::configuration(format!(
                "'{tag}' expects {} column argument(s), got {arg_count}",
                function.arity()
            )));
        }
        Ok(function)
    }

    /// Returns true if `tag` is known.
    pub fn contains(&self, tag: &str) -> bool {
        self.functions.contains_key(tag)
    }

    /// Registered tags and aliases, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry
            .register(Arc::new(CountFunction))
            .register(Arc::new(CumulativeFunction))
            .register(Arc::new(PresentFunction))
            .register(Arc::new(SumFunction))
            .register(Arc::new(AverageFunction))
            .register(Arc::new(StandardDeviationFunction))
            .register(Arc::new(DateIntervalFunction::new(IntervalUnit::Days)))
            .register(Arc::new(DateIntervalFunction::new(IntervalUnit::Hours)))
            .register(Arc::new(DateIntervalFunction::new(IntervalUnit::WeekHours)))
            .register(Arc::new(TotalCountFunction))
            .register(Arc::new(TotalSumFunction));

        for (alias, target) in [
            ("avg", "average"),
            ("mean", "average"),
            ("stddev", "standard_deviation"),
            ("average_days_between", "avg_days_between"),
            ("average_hours_between", "avg_hours_between"),
            ("average_week_hours_between", "avg_week_hours_between"),
        ] {
            if let Some(function) = registry.functions.get(target).cloned() {
                registry.functions.insert(alias.to_string(), function);
            }
        }
        registry
    }
}
