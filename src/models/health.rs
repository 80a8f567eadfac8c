// Host health snapshot written by the optional sidecar.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadAverages {
    #[serde(rename = "1")]
    pub one: Option<f64>,
    #[serde(rename = "5")]
    pub five: Option<f64>,
    #[serde(rename = "15")]
    pub fifteen: Option<f64>,
}

/// Every metric is nullable: collection is best effort and platform dependent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostHealth {
    pub timestamp_iso: String,
    pub temp_c: Option<f64>,
    pub disk_total_gb: Option<f64>,
    pub disk_used_gb: Option<f64>,
    pub disk_free_gb: Option<f64>,
    pub mem_total_mb: Option<f64>,
    pub mem_available_mb: Option<f64>,
    pub loadavg: LoadAverages,
}
