//! Errors raised while building and running reports.
//!
//! Misconfiguration (an unknown period or aggregation kind, a wrong argument
//! count, a summary row that refers to a later row) surfaces as
//! [`ReportError::Configuration`] and aborts the report. Data source failures
//! pass through as they are; nothing is retried.

use std::fmt::Display;

use thiserror::Error;

/// Every fallible operation in the crate returns this error.
#[derive(Error, Debug)]
pub enum ReportError {
    /// Invalid report, row or period declaration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A query against the data source failed.
    #[error("Data source error: {message}")]
    DataSource {
        /// Source kind, `"memory"` or `"datafusion"`
        source_type: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[cfg(feature = "datafusion-source")]
    #[error("DataFusion error: {0}")]
    DataFusion(#[from] datafusion::error::DataFusionError),

    #[cfg(feature = "datafusion-source")]
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// A cache store could not be read or written.
    #[error("Cache error: {message}")]
    Cache { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON or CSV encoding and decoding.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A row argument names a field the table does not have.
    #[error("Column '{column}' not found in table '{table}'")]
    ColumnNotFound { table: String, column: String },

    /// A field held a value the aggregation cannot use.
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// The data source cannot express the requested measure or filter.
    #[error("Operation not supported: {0}")]
    NotSupported(String),

    /// Broken engine invariant, such as reading an unresolved cell.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// `Result` specialized to [`ReportError`].
///
/// ```rust
/// use timely_report::error::Result;
///
/// fn row_count() -> Result<usize> {
///     Ok(3)
/// }
/// # assert_eq!(row_count().unwrap(), 3);
/// ```
pub type Result<T> = std::result::Result<T, ReportError>;

impl ReportError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn data_source(source_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DataSource {
            source_type: source_type.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Data source error keeping the driver error as its `source()`.
    pub fn data_source_with_source(
        source_type: impl Into<String>,
        message: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::DataSource {
            source_type: source_type.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Prefixes the message with `row '<title>': `, keeping the variant.
    ///
    /// Variants without a free-form message are wrapped as configuration or
    /// internal errors depending on whether the row declaration is at fault.
    pub fn in_row(self, title: &str) -> Self {
        match self {
            Self::Configuration(m) => Self::Configuration(format!("row '{title}': {m}")),
            Self::DataSource {
                source_type,
                message,
                source,
            } => Self::DataSource {
                source_type,
                message: format!("row '{title}': {message}"),
                source,
            },
            Self::Cache { message } => Self::Cache {
                message: format!("row '{title}': {message}"),
            },
            Self::Internal(m) => Self::Internal(format!("row '{title}': {m}")),
            other @ (Self::ColumnNotFound { .. } | Self::TypeMismatch { .. }) => {
                Self::Configuration(format!("row '{title}': {other}"))
            }
            other => other,
        }
    }
}

impl From<serde_json::Error> for ReportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<csv::Error> for ReportError {
    fn from(err: csv::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::fmt::Error> for ReportError {
    fn from(err: std::fmt::Error) -> Self {
        Self::Internal(format!("Failed to format output: {err}"))
    }
}

/// Adds report context to foreign and crate errors.
pub trait ErrorContext<T> {
    /// Turns any error into [`ReportError::Cache`] with `action` in front.
    fn cache_context(self, action: &str) -> Result<T>;

    /// Attributes the error to the row titled `title`.
    fn row_context(self, title: &str) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<ReportError>,
{
    fn cache_context(self, action: &str) -> Result<T> {
        self.map_err(|e| {
            let detail: Box<dyn Display> = match e.into() {
                ReportError::Io(io) => Box::new(io),
                ReportError::Serialization(m) | ReportError::Cache { message: m } => Box::new(m),
                other => Box::new(other),
            };
            ReportError::cache(format!("{action}: {detail}"))
        })
    }

    fn row_context(self, title: &str) -> Result<T> {
        self.map_err(|e| e.into().in_row(title))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_configuration_error() {
        let err = ReportError::configuration("period must be one of: year, month");
        assert_eq!(
            err.to_string(),
            "Configuration error: period must be one of: year, month"
        );
        assert!(err.is_configuration());
    }

    #[test]
    fn test_data_source_error_keeps_source() {
        let driver = std::io::Error::new(std::io::ErrorKind::NotFound, "table missing");
        let err = ReportError::data_source_with_source("memory", "query failed", Box::new(driver));

        assert_eq!(err.to_string(), "Data source error: query failed");
        assert!(err.source().is_some());
        assert!(!err.is_configuration());
    }

    #[test]
    fn test_cache_context_strips_io_prefix() {
        let failed: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only",
        ));
        let err = failed.cache_context("Failed to write cache file").unwrap_err();

        assert!(matches!(err, ReportError::Cache { .. }));
        assert_eq!(err.to_string(), "Cache error: Failed to write cache file: read-only");
    }

    #[test]
    fn test_row_context() {
        let err: Result<()> = Err(ReportError::configuration("unknown kind 'median'"));
        let err = err.row_context("Orders").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: row 'Orders': unknown kind 'median'"
        );

        let missing = ReportError::ColumnNotFound {
            table: "orders".to_string(),
            column: "shipped_at".to_string(),
        }
        .in_row("Shipped");
        assert!(missing.is_configuration());
        assert!(missing.to_string().contains("Column 'shipped_at' not found in table 'orders'"));

        let source = ReportError::data_source("memory", "boom").in_row("Orders");
        assert!(matches!(source, ReportError::DataSource { ref message, .. } if message == "row 'Orders': boom"));
    }
}
