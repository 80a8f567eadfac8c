// Linux-specific helpers: thermal zones.

/// SoC temperature from /sys/class/thermal/thermal_zone0/temp (millidegrees C), Linux only.
pub(super) fn read_thermal_zone_celsius() -> Option<f64> {
    #[cfg(target_os = "linux")]
    {
        let raw = std::fs::read_to_string("/sys/class/thermal/thermal_zone0/temp").ok()?;
        raw.trim()
            .parse::<i64>()
            .ok()
            .map(|milli| milli as f64 / 1000.0)
    }
    #[cfg(not(target_os = "linux"))]
    None
}
