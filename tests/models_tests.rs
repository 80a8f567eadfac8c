// Model serialization tests: artifact shapes consumed by the dashboard

use listener_archive::models::{
    FieldValue, HostHealth, LoadAverages, MonthIndex, MountMetric, SampleRecord, SeriesPoint,
    SourceReading, YearIndex,
};
use serde_json::json;

#[test]
fn series_point_is_a_pair() {
    let point = SeriesPoint(1_740_830_400_000, 12);
    assert_eq!(serde_json::to_value(point).unwrap(), json!([1_740_830_400_000i64, 12]));
    let back: SeriesPoint = serde_json::from_str("[5, 6]").unwrap();
    assert_eq!(back.timestamp_ms(), 5);
    assert_eq!(back.value(), 6);
}

#[test]
fn host_health_uses_numeric_loadavg_keys_and_nulls() {
    let health = HostHealth {
        timestamp_iso: "2025-03-01T12:00:00.000000+00:00".into(),
        temp_c: Some(48.3),
        mem_total_mb: Some(3792.5),
        loadavg: LoadAverages {
            one: Some(0.5),
            five: Some(0.25),
            fifteen: None,
        },
        ..Default::default()
    };
    let value = serde_json::to_value(&health).unwrap();
    assert_eq!(value["loadavg"], json!({"1": 0.5, "5": 0.25, "15": null}));
    assert_eq!(value["temp_c"], json!(48.3));
    assert_eq!(value["disk_free_gb"], json!(null));
    assert_eq!(value["mem_available_mb"], json!(null));
}

#[test]
fn indexes_serialize_under_their_keys() {
    let years = YearIndex { years: vec![2024, 2025] };
    assert_eq!(serde_json::to_value(&years).unwrap(), json!({"years": [2024, 2025]}));
    let months = MonthIndex {
        months: vec!["2024-12".into(), "2025-01".into()],
    };
    assert_eq!(
        serde_json::to_value(&months).unwrap(),
        json!({"months": ["2024-12", "2025-01"]})
    );
}

#[test]
fn field_value_parses_ints_and_keeps_text() {
    assert_eq!(FieldValue::parse("42"), FieldValue::Int(42));
    assert_eq!(FieldValue::parse(" 7 "), FieldValue::Int(7));
    assert_eq!(FieldValue::parse("offline"), FieldValue::Text("offline".into()));
    assert_eq!(FieldValue::Text("offline".into()).as_int(), None);
    assert_eq!(FieldValue::Int(-3).to_cell(), "-3");
}

#[test]
fn mount_metric_from_counts_leaves_metadata_empty() {
    let m = MountMetric::from_counts("/tower1", 4, Some(9));
    assert_eq!(m.mountpoint, "/tower1");
    assert_eq!(m.listeners, 4);
    assert_eq!(m.listener_peak, Some(9));
    assert_eq!(m.title, None);
    assert_eq!(m.bitrate, None);
}

#[test]
fn oversized_counts_are_stored_as_the_largest_integer() {
    let record = SampleRecord {
        timestamp_ms: 1000,
        timestamp_iso: "1970-01-01T00:00:01.000000+00:00".into(),
        readings: vec![SourceReading {
            id: "tower1".into(),
            label: "Tower 1".into(),
            mountpoint: "/tower1".into(),
            listeners: u64::MAX,
            listener_peak: None,
            title: None,
            include_in_total: true,
            include_in_history: true,
        }],
        total: u64::MAX,
    };
    let row = record.to_row();
    assert_eq!(row.int("Tower 1"), Some(i64::MAX));
    assert_eq!(row.int("Total"), Some(i64::MAX));
}
