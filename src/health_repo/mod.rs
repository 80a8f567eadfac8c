// Host health via sysinfo. Best effort: any metric that cannot be read is reported as null.

mod linux;

use crate::models::{HostHealth, LoadAverages};
use std::path::Path;
use sysinfo::{Components, Disks, System};
use tracing::instrument;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

pub struct HealthRepo;

impl Default for HealthRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthRepo {
    pub fn new() -> Self {
        Self
    }

    #[instrument(skip(self), fields(repo = "health", operation = "collect"))]
    pub async fn collect(&self, timestamp_iso: String) -> anyhow::Result<HostHealth> {
        tokio::task::spawn_blocking(move || collect_blocking(timestamp_iso))
            .await
            .map_err(|e| anyhow::anyhow!("health task join: {}", e))
    }
}

fn collect_blocking(timestamp_iso: String) -> HostHealth {
    let mut sys = System::new();
    sys.refresh_memory();
    let total = sys.total_memory();
    let (mem_total_mb, mem_available_mb) = if total > 0 {
        (
            Some(round(total as f64 / BYTES_PER_MB, 1)),
            Some(round(sys.available_memory() as f64 / BYTES_PER_MB, 1)),
        )
    } else {
        (None, None)
    };

    let (disk_total_gb, disk_used_gb, disk_free_gb) = root_disk_usage()
        .map(|(total, free)| {
            (
                Some(round(total as f64 / BYTES_PER_GB, 2)),
                Some(round(total.saturating_sub(free) as f64 / BYTES_PER_GB, 2)),
                Some(round(free as f64 / BYTES_PER_GB, 2)),
            )
        })
        .unwrap_or_default();

    HostHealth {
        timestamp_iso,
        temp_c: linux::read_thermal_zone_celsius()
            .or_else(hottest_component)
            .map(|t| round(t, 2)),
        disk_total_gb,
        disk_used_gb,
        disk_free_gb,
        mem_total_mb,
        mem_available_mb,
        loadavg: load_averages(),
    }
}

/// (total, available) bytes of the filesystem mounted at `/`.
fn root_disk_usage() -> Option<(u64, u64)> {
    let disks = Disks::new_with_refreshed_list();
    disks
        .list()
        .iter()
        .find(|d| d.mount_point() == Path::new("/"))
        .map(|d| (d.total_space(), d.available_space()))
        .filter(|(total, _)| *total > 0)
}

fn hottest_component() -> Option<f64> {
    let components = Components::new_with_refreshed_list();
    components
        .list()
        .iter()
        .filter_map(|c| c.temperature())
        .filter(|t| t.is_finite())
        .map(f64::from)
        .reduce(f64::max)
}

fn load_averages() -> LoadAverages {
    if cfg!(windows) {
        return LoadAverages::default();
    }
    let load = System::load_average();
    LoadAverages {
        one: Some(round(load.one, 2)),
        five: Some(round(load.five, 2)),
        fifteen: Some(round(load.fifteen, 2)),
    }
}

fn round(v: f64, places: i32) -> f64 {
    let f = 10f64.powi(places);
    (v * f).round() / f
}
