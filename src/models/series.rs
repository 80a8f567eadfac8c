// Series artifacts consumed by the dashboard.

use serde::{Deserialize, Serialize};

/// `(timestamp_ms, value)`; serializes as a two-element JSON array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeriesPoint(pub i64, pub i64);

impl SeriesPoint {
    pub fn timestamp_ms(&self) -> i64 {
        self.0
    }

    pub fn value(&self) -> i64 {
        self.1
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Series {
    pub name: String,
    pub points: Vec<SeriesPoint>,
}

impl Series {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            points: Vec::new(),
        }
    }
}

/// Shape shared by the recent, full-history and archive artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesPayload {
    pub generated_at: String,
    pub series: Vec<Series>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearIndex {
    pub years: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthIndex {
    pub months: Vec<String>,
}
