// Tracked sources: which upstream mounts feed the history and the total.

use crate::config::SourceConfig;
use crate::models::{TIMESTAMP_ISO, TIMESTAMP_MS, TOTAL};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedSource {
    pub id: String,
    pub mountpoint: String,
    /// Display name; doubles as the history column and series name.
    pub label: String,
    pub include_in_total: bool,
    pub include_in_history: bool,
}

impl From<&SourceConfig> for TrackedSource {
    fn from(c: &SourceConfig) -> Self {
        Self {
            id: c.id.clone(),
            mountpoint: c.mountpoint.clone(),
            label: c.label.trim().to_string(),
            include_in_total: c.include_in_total,
            include_in_history: c.include_in_history,
        }
    }
}

/// Immutable for the life of the process; handed to every component that needs it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    sources: Vec<TrackedSource>,
}

impl Registry {
    pub fn new(sources: Vec<TrackedSource>) -> Self {
        Self { sources }
    }

    pub fn from_config(sources: &[SourceConfig]) -> Self {
        Self::new(sources.iter().map(TrackedSource::from).collect())
    }

    pub fn sources(&self) -> &[TrackedSource] {
        &self.sources
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Series names in output order: history labels in registry order, then `Total`.
    pub fn series_names(&self) -> Vec<String> {
        self.sources
            .iter()
            .filter(|s| s.include_in_history)
            .map(|s| s.label.clone())
            .chain(std::iter::once(TOTAL.to_string()))
            .collect()
    }

    /// History file header: timestamps, then the series names.
    pub fn column_order(&self) -> Vec<String> {
        [TIMESTAMP_ISO.to_string(), TIMESTAMP_MS.to_string()]
            .into_iter()
            .chain(self.series_names())
            .collect()
    }
}
