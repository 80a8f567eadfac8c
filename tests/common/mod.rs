// Shared test helpers

#![allow(dead_code)]

use listener_archive::models::{FieldValue, HistoryRow};
use listener_archive::registry::{Registry, TrackedSource};

pub fn row(timestamp_ms: i64, iso: Option<&str>, fields: &[(&str, i64)]) -> HistoryRow {
    let mut r = HistoryRow::new(timestamp_ms, iso.map(String::from));
    for (name, value) in fields {
        r.insert(*name, FieldValue::Int(*value));
    }
    r
}

pub fn tracked(label: &str, mountpoint: &str, total: bool, history: bool) -> TrackedSource {
    TrackedSource {
        id: label.to_lowercase().replace(' ', ""),
        mountpoint: mountpoint.into(),
        label: label.into(),
        include_in_total: total,
        include_in_history: history,
    }
}

/// Tower 1 and Tower 2 in history and total; Tower 3 informational only.
pub fn towers() -> Registry {
    Registry::new(vec![
        tracked("Tower 1", "/tower1", true, true),
        tracked("Tower 2", "/tower2", true, true),
        tracked("Tower 3", "/tower3", false, false),
    ])
}

pub fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

pub const STATUS_JSON: &str = r#"{
  "icestats": {
    "admin": "ops@example.org",
    "source": [
      {
        "listenurl": "http://radio.example:8000/tower1",
        "listeners": 12,
        "listener_peak": 30,
        "title": "Morning Show",
        "bitrate": 128,
        "genre": "Talk"
      },
      {
        "listenurl": "http://radio.example:8000/tower2",
        "listeners": "7",
        "yp_currently_playing": "Night Jazz"
      },
      {
        "listenurl": "http://radio.example:8000/tower3",
        "listeners": 99
      }
    ]
  }
}"#;

pub const STATUS_HTML: &str = r#"<html><body>
<h3>Server Status</h3>
<table>
  <tr><th>Mount Point</th><th>Listeners</th><th>Peak</th></tr>
  <tr><td>/tower1</td><td>42</td><td>50</td></tr>
  <tr><td>tower2</td><td>3 listeners</td><td></td></tr>
</table>
</body></html>"#;
