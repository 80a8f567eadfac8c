// Sample records and the loosely-typed history rows they persist as.

use serde::Serialize;
use std::collections::BTreeMap;

pub const TIMESTAMP_ISO: &str = "timestamp_iso";
pub const TIMESTAMP_MS: &str = "timestamp_ms";
/// Column holding the sum over sources counted toward the total.
pub const TOTAL: &str = "Total";

/// One tracked source's reading for a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceReading {
    pub id: String,
    pub label: String,
    pub mountpoint: String,
    pub listeners: u64,
    pub listener_peak: Option<u64>,
    pub title: Option<String>,
    pub include_in_total: bool,
    pub include_in_history: bool,
}

/// One timestamped sample: the unit appended to history each cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SampleRecord {
    pub timestamp_ms: i64,
    pub timestamp_iso: String,
    pub readings: Vec<SourceReading>,
    pub total: u64,
}

impl SampleRecord {
    /// History-visible projection: labels with `include_in_history`, plus `Total`.
    pub fn to_row(&self) -> HistoryRow {
        let mut row = HistoryRow::new(self.timestamp_ms, Some(self.timestamp_iso.clone()));
        for r in self.readings.iter().filter(|r| r.include_in_history) {
            row.insert(r.label.clone(), FieldValue::Int(clamp_count(r.listeners)));
        }
        row.insert(TOTAL, FieldValue::Int(clamp_count(self.total)));
        row
    }
}

/// Counts beyond `i64::MAX` are stored as `i64::MAX`.
fn clamp_count(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// A stored cell. Integers when they parse, text otherwise (legacy columns).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Int(i64),
    Text(String),
}

impl FieldValue {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<i64>() {
            Ok(v) => FieldValue::Int(v),
            Err(_) => FieldValue::Text(raw.to_string()),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            FieldValue::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn to_cell(&self) -> String {
        match self {
            FieldValue::Int(v) => v.to_string(),
            FieldValue::Text(s) => s.clone(),
        }
    }
}

/// One history row. Field presence varies with the configuration that wrote it,
/// so every consumer looks columns up by name and tolerates absence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRow {
    pub timestamp_ms: i64,
    pub timestamp_iso: Option<String>,
    fields: BTreeMap<String, FieldValue>,
}

impl HistoryRow {
    pub fn new(timestamp_ms: i64, timestamp_iso: Option<String>) -> Self {
        Self {
            timestamp_ms,
            timestamp_iso,
            fields: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Integer value of `name`, or None when absent or non-numeric.
    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(FieldValue::as_int)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}
