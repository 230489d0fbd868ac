//! External filter parameters a report is built for.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Named filter values handed to row scopes.
///
/// Two reports with the same title but different parameters get different
/// cache namespaces through [`ReportParams::digest`].
///
/// ```rust
/// use timely_report::report::ReportParams;
///
/// let params = ReportParams::new().with("region", "eu").with("channel_id", 7);
/// assert_eq!(params.get_str("region"), Some("eu"));
/// assert_eq!(params.digest().map(|d| d.len()), Some(12));
/// assert_eq!(ReportParams::new().digest(), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportParams {
    values: BTreeMap<String, JsonValue>,
}

impl ReportParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces one parameter.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<JsonValue>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&JsonValue> {
        self.values.get(name)
    }

    /// String parameter, if present and a string.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(JsonValue::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &JsonValue)> {
        self.values.iter()
    }

    /// First 12 hex digits of the SHA-256 of the canonical JSON encoding,
    /// or `None` when no parameter is set.
    pub fn digest(&self) -> Option<String> {
        if self.values.is_empty() {
            return None;
        }
        // BTreeMap keys serialize in order, so equal maps hash equally
        let encoded = serde_json::to_string(&self.values).unwrap_or_default();
        let hash = Sha256::digest(encoded.as_bytes());
        let mut hex = hex::encode(hash);
        hex.truncate(12);
        Some(hex)
    }
}
