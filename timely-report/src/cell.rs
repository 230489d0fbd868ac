//! Materialized (row, column) values and their cache identity.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::column::Column;
use crate::error::{ReportError, Result};
use crate::value::Value;

/// Composite cache key of one cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    pub report_key: String,
    pub row_key: String,
    pub column_key: String,
}

impl Fingerprint {
    pub fn new(
        report_key: impl Into<String>,
        row_key: impl Into<String>,
        column_key: impl Into<String>,
    ) -> Self {
        Self {
            report_key: report_key.into(),
            row_key: row_key.into(),
            column_key: column_key.into(),
        }
    }

    /// All three parts joined by `separator`.
    pub fn flat_key(&self, separator: &str) -> String {
        format!(
            "{}{separator}{}{separator}{}",
            self.report_key, self.row_key, self.column_key
        )
    }

    /// `(report{sep}row, column)`: outer hash key and field.
    pub fn hash_key(&self, separator: &str) -> (String, String) {
        (
            format!("{}{separator}{}", self.report_key, self.row_key),
            self.column_key.clone(),
        )
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.report_key, self.row_key, self.column_key)
    }
}

/// Lifecycle of a cell within one report run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    Uninitialized,
    Computing,
    Resolved,
}

/// One (row, column) value.
///
/// A cell is computed at most once per report run. Whether it may go
/// through the cache is fixed at construction: the column window must be
/// closed and the row must allow caching.
#[derive(Debug, Clone)]
pub struct Cell {
    fingerprint: Fingerprint,
    bucket_key: String,
    cacheable: bool,
    state: CellState,
    value: Option<Value>,
}

impl Cell {
    pub fn new(fingerprint: Fingerprint, column: &Column, cacheable: bool) -> Self {
        Self {
            fingerprint,
            bucket_key: column.key(),
            cacheable,
            state: CellState::Uninitialized,
            value: None,
        }
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Bucket key of the cell's column.
    pub fn bucket_key(&self) -> &str {
        &self.bucket_key
    }

    pub fn is_cacheable(&self) -> bool {
        self.cacheable
    }

    pub fn state(&self) -> CellState {
        self.state
    }

    /// The memoized value, once resolved.
    pub fn value(&self) -> Option<Value> {
        self.value
    }

    /// Marks the cell as being computed.
    pub fn begin(&mut self) -> Result<()> {
        match self.state {
            CellState::Uninitialized => {
                self.state = CellState::Computing;
                Ok(())
            }
            state => Err(ReportError::Internal(format!(
                "cell {} cannot start computing from {state:?}",
                self.fingerprint
            ))),
        }
    }

    /// Stores the final value. The cell must be computing.
    pub fn resolve(&mut self, value: Value) -> Result<Value> {
        if self.state != CellState::Computing {
            return Err(ReportError::Internal(format!(
                "cell {} resolved from {:?}",
                self.fingerprint, self.state
            )));
        }
        self.state = CellState::Resolved;
        self.value = Some(value);
        Ok(value)
    }
}
