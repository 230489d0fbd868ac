//! Rendering of finished reports.
//!
//! A formatter turns a [`ReportTable`] into a string. Formatters are plain
//! values implementing [`ReportFormatter`]; a [`FormatterRegistry`] looks
//! them up by name for callers that pick the output format at runtime.
//!
//! # Examples
//!
//! ```rust
//! use timely_report::formatters::{FormatterRegistry, HumanFormatter, ReportFormatter};
//!
//! let formatter = HumanFormatter::new();
//! // let table: ReportTable = report.run(&source, None).await?;
//! // let output = formatter.format(&table)?;
//!
//! let registry = FormatterRegistry::default();
//! assert!(registry.get("csv").is_ok());
//! assert!(registry.get("xls").is_err());
//! ```

use std::collections::HashMap;
use std::fmt::{self, Write};
use std::sync::Arc;

use crate::error::{ReportError, Result};
use crate::report::{ReportTable, TOTAL_KEY};

/// What a formatter prints around the table itself.
#[derive(Debug, Clone)]
pub struct FormatterConfig {
    /// Keep the totals column when the report has one
    pub show_totals: bool,
    /// Print the title and date range above the table
    pub show_header: bool,
    /// Print the "Generated at" line
    pub show_generated_at: bool,
    /// Render only the first rows; `None` renders all
    pub row_limit: Option<usize>,
    /// ANSI styling in the human formatter
    pub ansi: bool,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            show_totals: true,
            show_header: true,
            show_generated_at: true,
            row_limit: None,
            ansi: true,
        }
    }
}

impl FormatterConfig {
    /// The bare table, no header or styling.
    pub fn plain() -> Self {
        Self {
            show_header: false,
            show_generated_at: false,
            ansi: false,
            ..Self::default()
        }
    }

    /// Unstyled and capped at 50 rows, for log files.
    pub fn for_logs() -> Self {
        Self {
            row_limit: Some(50),
            ansi: false,
            ..Self::default()
        }
    }

    pub fn with_totals(mut self, show: bool) -> Self {
        self.show_totals = show;
        self
    }

    pub fn with_header(mut self, show: bool) -> Self {
        self.show_header = show;
        self
    }

    pub fn with_row_limit(mut self, limit: usize) -> Self {
        self.row_limit = Some(limit);
        self
    }

    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi = ansi;
        self
    }
}

/// Trait for rendering a report table.
///
/// # Examples
///
/// ```rust
/// use timely_report::formatters::ReportFormatter;
/// use timely_report::report::ReportTable;
///
/// struct RowCount;
///
/// impl ReportFormatter for RowCount {
///     fn format(&self, table: &ReportTable) -> timely_report::error::Result<String> {
///         Ok(format!("{} rows", table.rows.len()))
///     }
/// }
/// ```
pub trait ReportFormatter: Send + Sync {
    /// Renders the table with the formatter's own configuration.
    fn format(&self, table: &ReportTable) -> Result<String>;

    /// Renders the table with a custom configuration.
    fn format_with_config(&self, table: &ReportTable, _config: &FormatterConfig) -> Result<String> {
        self.format(table)
    }
}

/// Formats reports as JSON: metadata, headings and an ordered
/// `row title -> bucket key -> value` mapping.
#[derive(Debug, Clone)]
pub struct JsonFormatter {
    config: FormatterConfig,
    pretty: bool,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self {
            config: FormatterConfig::default(),
            pretty: true,
        }
    }

    pub fn with_config(config: FormatterConfig) -> Self {
        Self {
            config,
            pretty: true,
        }
    }

    /// Sets whether to use pretty-printed JSON.
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportFormatter for JsonFormatter {
    fn format(&self, table: &ReportTable) -> Result<String> {
        self.format_with_config(table, &self.config)
    }

    fn format_with_config(&self, table: &ReportTable, config: &FormatterConfig) -> Result<String> {
        let filtered = filter_table(table, config);
        let encoded = if self.pretty {
            serde_json::to_string_pretty(&filtered)
        } else {
            serde_json::to_string(&filtered)
        };
        encoded.map_err(|e| ReportError::Internal(format!("Failed to serialize report to JSON: {e}")))
    }
}

/// Formats reports as an aligned text table for terminals and logs.
#[derive(Debug, Clone)]
pub struct HumanFormatter {
    config: FormatterConfig,
}

impl HumanFormatter {
    pub fn new() -> Self {
        Self {
            config: FormatterConfig::default(),
        }
    }

    pub fn with_config(config: FormatterConfig) -> Self {
        Self { config }
    }
}

impl Default for HumanFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportFormatter for HumanFormatter {
    fn format(&self, table: &ReportTable) -> Result<String> {
        self.format_with_config(table, &self.config)
    }

    fn format_with_config(&self, table: &ReportTable, config: &FormatterConfig) -> Result<String> {
        let all_rows = table.rows.len();
        let table = filter_table(table, config);
        let mut output = String::new();

        if config.show_header {
            if config.ansi {
                writeln!(output, "\x1b[1m{}\x1b[0m", table.title)?;
            } else {
                writeln!(output, "{}", table.title)?;
            }
            writeln!(output, "{}", date_range(&table))?;
            writeln!(output)?;
        }

        let label_width = table
            .rows
            .iter()
            .map(|row| row.title.chars().count())
            .max()
            .unwrap_or(0);
        let widths: Vec<usize> = table
            .headings
            .iter()
            .enumerate()
            .map(|(idx, heading)| {
                table
                    .rows
                    .iter()
                    .filter_map(|row| row.values.get(idx))
                    .map(|(_, value)| value.to_string().chars().count())
                    .chain(std::iter::once(heading.title.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        write!(output, "{:label_width$}", "")?;
        for (heading, width) in table.headings.iter().zip(widths.iter().copied()) {
            write!(output, " | {:>width$}", heading.title)?;
        }
        writeln!(output)?;

        write!(output, "{}", "-".repeat(label_width))?;
        for width in &widths {
            write!(output, "-+-{}", "-".repeat(*width))?;
        }
        writeln!(output)?;

        for row in &table.rows {
            write!(output, "{:label_width$}", row.title)?;
            for ((_, value), width) in row.values.iter().zip(widths.iter().copied()) {
                write!(output, " | {:>width$}", value.to_string())?;
            }
            writeln!(output)?;
        }

        if all_rows > table.rows.len() {
            writeln!(output)?;
            writeln!(output, "({} more rows hidden)", all_rows - table.rows.len())?;
        }

        if config.show_generated_at {
            writeln!(output)?;
            writeln!(output, "Generated at {}", table.generated_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
        }
        Ok(output)
    }
}

/// Formats reports as a Markdown table.
#[derive(Debug, Clone)]
pub struct MarkdownFormatter {
    config: FormatterConfig,
    heading_level: u8,
}

impl MarkdownFormatter {
    pub fn new() -> Self {
        Self {
            config: FormatterConfig::default(),
            heading_level: 2,
        }
    }

    pub fn with_config(config: FormatterConfig) -> Self {
        Self {
            config,
            heading_level: 2,
        }
    }

    /// Sets the heading level of the report title (1-6).
    pub fn with_heading_level(mut self, level: u8) -> Self {
        self.heading_level = level.clamp(1, 6);
        self
    }
}

impl Default for MarkdownFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportFormatter for MarkdownFormatter {
    fn format(&self, table: &ReportTable) -> Result<String> {
        self.format_with_config(table, &self.config)
    }

    fn format_with_config(&self, table: &ReportTable, config: &FormatterConfig) -> Result<String> {
        let all_rows = table.rows.len();
        let table = filter_table(table, config);
        let mut output = String::new();
        let h = "#".repeat(self.heading_level as usize);

        if config.show_header {
            writeln!(output, "{h} {}", escape_markdown(&table.title))?;
            writeln!(output)?;
            writeln!(output, "**Period:** {}", date_range(&table))?;
            if config.show_generated_at {
                writeln!(
                    output,
                    "**Generated:** {}",
                    table.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
                )?;
            }
            writeln!(output)?;
        }

        write!(output, "| |")?;
        for heading in &table.headings {
            write!(output, " {} |", escape_markdown(&heading.title))?;
        }
        writeln!(output)?;
        write!(output, "|---|")?;
        for _ in &table.headings {
            write!(output, "---:|")?;
        }
        writeln!(output)?;

        for row in &table.rows {
            write!(output, "| {} |", escape_markdown(&row.title))?;
            for (_, value) in &row.values {
                write!(output, " {value} |")?;
            }
            writeln!(output)?;
        }

        if all_rows > table.rows.len() {
            writeln!(output)?;
            writeln!(
                output,
                "> **Note:** {} additional rows not shown in this report.",
                all_rows - table.rows.len()
            )?;
        }
        Ok(output)
    }
}

/// Formats reports as CSV.
///
/// With metadata enabled the layout mirrors a spreadsheet export: a title
/// line, a date range line, the headings, one line per row and finally the
/// generation time.
#[derive(Debug, Clone)]
pub struct CsvFormatter {
    config: FormatterConfig,
    delimiter: u8,
}

impl CsvFormatter {
    pub fn new() -> Self {
        Self {
            config: FormatterConfig::plain(),
            delimiter: b',',
        }
    }

    pub fn with_config(config: FormatterConfig) -> Self {
        Self {
            config,
            delimiter: b',',
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }
}

impl Default for CsvFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportFormatter for CsvFormatter {
    fn format(&self, table: &ReportTable) -> Result<String> {
        self.format_with_config(table, &self.config)
    }

    fn format_with_config(&self, table: &ReportTable, config: &FormatterConfig) -> Result<String> {
        let table = filter_table(table, config);
        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .flexible(true)
            .from_writer(Vec::new());

        if config.show_header {
            writer.write_record([table.title.as_str()])?;
            writer.write_record([date_range(&table).as_str()])?;
        }

        let mut headings = vec![String::new()];
        headings.extend(table.headings.iter().map(|h| h.title.clone()));
        writer.write_record(&headings)?;

        for row in &table.rows {
            let mut record = vec![row.title.clone()];
            record.extend(row.values.iter().map(|(_, value)| value.to_string()));
            writer.write_record(&record)?;
        }

        if config.show_generated_at {
            let generated = format!(
                "Generated at {}",
                table.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
            writer.write_record([generated.as_str()])?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| ReportError::Internal(format!("Failed to flush CSV output: {e}")))?;
        String::from_utf8(bytes)
            .map_err(|e| ReportError::Internal(format!("CSV output is not UTF-8: {e}")))
    }
}

/// Formatters keyed by name.
///
/// The default registry knows `json`, `human`, `markdown` and `csv`.
#[derive(Clone)]
pub struct FormatterRegistry {
    formatters: HashMap<String, Arc<dyn ReportFormatter>>,
}

impl FormatterRegistry {
    /// Creates a registry with no formatters.
    pub fn empty() -> Self {
        Self {
            formatters: HashMap::new(),
        }
    }

    /// Registers `formatter` under `name`, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, formatter: Arc<dyn ReportFormatter>) -> &mut Self {
        self.formatters.insert(name.into(), formatter);
        self
    }

    /// Returns the formatter registered under `name`.
    pub fn get(&self, name: &str) -> Result<Arc<dyn ReportFormatter>> {
        self.formatters.get(name).cloned().ok_or_else(|| {
            ReportError::NotSupported(format!(
                "no formatter named '{name}' (known: {})",
                self.names().join(", ")
            ))
        })
    }

    /// Renders `table` with the formatter registered under `name`.
    pub fn format(&self, name: &str, table: &ReportTable) -> Result<String> {
        self.get(name)?.format(table)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.formatters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for FormatterRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry
            .register("json", Arc::new(JsonFormatter::new()))
            .register("human", Arc::new(HumanFormatter::new()))
            .register("markdown", Arc::new(MarkdownFormatter::new()))
            .register("csv", Arc::new(CsvFormatter::new()));
        registry
    }
}

impl fmt::Debug for FormatterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatterRegistry")
            .field("formatters", &self.names())
            .finish()
    }
}

/// Applies the row limit and drops the totals column when not wanted.
fn filter_table(table: &ReportTable, config: &FormatterConfig) -> ReportTable {
    let mut filtered = table.clone();

    if !config.show_totals {
        filtered.headings.retain(|heading| heading.key != TOTAL_KEY);
        for row in &mut filtered.rows {
            row.values.retain(|(key, _)| key != TOTAL_KEY);
        }
    }
    if let Some(limit) = config.row_limit {
        filtered.rows.truncate(limit);
    }
    filtered
}

fn date_range(table: &ReportTable) -> String {
    format!(
        "{} - {} (by {})",
        table.starts_at.format("%Y-%m-%d"),
        table.ends_at.format("%Y-%m-%d"),
        table.period
    )
}

fn escape_markdown(text: &str) -> String {
    text.replace('|', "\\|")
}
