use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// One raw `(path, value)` pair produced by a plugin during a tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub path: String,
    pub value: f64,
}

impl Sample {
    pub fn new(path: impl Into<String>, value: f64) -> Self {
        Self {
            path: path.into(),
            value,
        }
    }
}

/// The deduplicated set of metrics collected during one tick.
///
/// Keys are fully-qualified, sanitized metric paths. Inserting an existing
/// path replaces its value. All entries share one aligned timestamp.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use oxcarbon_common::types::MetricBatch;
///
/// let mut batch = MetricBatch::new(Utc::now());
/// batch.insert("host1.cpu.pct", 10.0);
/// batch.insert("host1.cpu.pct", 42.0);
/// assert_eq!(batch.len(), 1);
/// assert_eq!(batch.get("host1.cpu.pct"), Some(42.0));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct MetricBatch {
    pub timestamp: DateTime<Utc>,
    entries: BTreeMap<String, f64>,
}

impl MetricBatch {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            entries: BTreeMap::new(),
        }
    }

    /// Sets `path` to `value`, returning the value it replaced, if any.
    pub fn insert(&mut self, path: impl Into<String>, value: f64) -> Option<f64> {
        self.entries.insert(path.into(), value)
    }

    pub fn get(&self, path: &str) -> Option<f64> {
        self.entries.get(path).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }
}
