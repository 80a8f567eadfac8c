// Folds a mount map into one SampleRecord using the tracked-source registry.

use crate::models::{MountMap, SampleRecord, SourceReading};
use crate::registry::Registry;
use chrono::{DateTime, SecondsFormat, Utc};

/// Builds the record for `at`. Mounts missing upstream read as 0 listeners, no peak.
pub fn aggregate(mounts: &MountMap, registry: &Registry, at: DateTime<Utc>) -> SampleRecord {
    let readings: Vec<SourceReading> = registry
        .sources()
        .iter()
        .map(|source| {
            let metric = mounts.get(&source.mountpoint);
            SourceReading {
                id: source.id.clone(),
                label: source.label.clone(),
                mountpoint: source.mountpoint.clone(),
                listeners: metric.map_or(0, |m| m.listeners),
                listener_peak: metric.and_then(|m| m.listener_peak),
                title: metric.and_then(|m| m.title.clone()),
                include_in_total: source.include_in_total,
                include_in_history: source.include_in_history,
            }
        })
        .collect();

    let total = readings
        .iter()
        .filter(|r| r.include_in_total)
        .map(|r| r.listeners)
        .fold(0u64, u64::saturating_add);

    SampleRecord {
        timestamp_ms: at.timestamp_millis(),
        timestamp_iso: iso_timestamp(at),
        readings,
        total,
    }
}

/// RFC 3339 with microseconds and a `+00:00` offset.
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MountMetric, TOTAL};
    use crate::registry::TrackedSource;
    use chrono::TimeZone;

    fn source(label: &str, mount: &str, total: bool, history: bool) -> TrackedSource {
        TrackedSource {
            id: label.to_lowercase(),
            mountpoint: mount.into(),
            label: label.into(),
            include_in_total: total,
            include_in_history: history,
        }
    }

    fn mounts(entries: &[(&str, u64)]) -> MountMap {
        entries
            .iter()
            .map(|(m, n)| (m.to_string(), MountMetric::from_counts(*m, *n, Some(n + 1))))
            .collect()
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn missing_mount_reads_zero_without_peak() {
        let reg = Registry::new(vec![source("Tower 1", "/tower1", true, true)]);
        let rec = aggregate(&MountMap::new(), &reg, at());
        assert_eq!(rec.readings[0].listeners, 0);
        assert_eq!(rec.readings[0].listener_peak, None);
        assert_eq!(rec.total, 0);
    }

    #[test]
    fn excluded_source_never_counts_toward_total() {
        let reg = Registry::new(vec![
            source("Tower 1", "/tower1", true, true),
            source("Tower 3", "/tower3", false, false),
        ]);
        for n in [0, 1, 5_000_000] {
            let rec = aggregate(&mounts(&[("/tower1", 4), ("/tower3", n)]), &reg, at());
            assert_eq!(rec.total, 4);
        }
    }

    #[test]
    fn row_contains_history_labels_and_total_only() {
        let reg = Registry::new(vec![
            source("Tower 1", "/tower1", true, true),
            source("Tower 2", "/tower2", true, true),
            source("Tower 3", "/tower3", true, false),
        ]);
        let rec = aggregate(
            &mounts(&[("/tower1", 3), ("/tower2", 5), ("/tower3", 7)]),
            &reg,
            at(),
        );
        let row = rec.to_row();
        assert_eq!(row.field_names().collect::<Vec<_>>(), vec!["Total", "Tower 1", "Tower 2"]);
        assert_eq!(row.int(TOTAL), Some(15));
        assert_eq!(row.timestamp_ms, at().timestamp_millis());
        assert_eq!(
            row.timestamp_iso.as_deref(),
            Some("2025-03-01T12:00:00.000000+00:00")
        );
    }
}
