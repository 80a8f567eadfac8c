// One upstream mount as reported by a status page.

use serde::Serialize;
use std::collections::BTreeMap;

/// Mountpoint path -> metrics. Rebuilt on every fetch, never persisted.
pub type MountMap = BTreeMap<String, MountMetric>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MountMetric {
    pub mountpoint: String,
    pub listeners: u64,
    pub listener_peak: Option<u64>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub bitrate: Option<u64>,
    pub genre: Option<String>,
    pub stream_start: Option<String>,
    pub connected: Option<u64>,
}

impl MountMetric {
    /// Metric with only the fields an HTML status table can carry.
    pub fn from_counts(mountpoint: impl Into<String>, listeners: u64, peak: Option<u64>) -> Self {
        Self {
            mountpoint: mountpoint.into(),
            listeners,
            listener_peak: peak,
            ..Default::default()
        }
    }
}
