//! Prelude for commonly used types and traits in timely-report.

pub use crate::cache::{CacheStore, FileSystemCacheStore, InMemoryCacheStore};
pub use crate::column::Column;
pub use crate::config::{CacheAddressing, ReportConfig};
pub use crate::error::{ErrorContext, ReportError, Result};
pub use crate::formatters::{
    CsvFormatter, FormatterConfig, FormatterRegistry, HumanFormatter, JsonFormatter,
    MarkdownFormatter, ReportFormatter,
};
pub use crate::functions::{AggregationFunction, FunctionRegistry};
pub use crate::logging::LogConfig;
pub use crate::period::Period;
pub use crate::report::{Report, ReportParams, ReportTable};
pub use crate::row::RowSpec;
pub use crate::sources::{DataSource, MemorySource, Scope};
pub use crate::summary::{Combinator, SummaryRow};
pub use crate::value::{Transform, Value};

#[cfg(feature = "datafusion-source")]
pub use crate::sources::DataFusionSource;
