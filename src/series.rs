// Projection of history rows into named series, plus the recent-window and year filters.

use crate::models::{HistoryRow, Series, SeriesPayload, SeriesPoint};
use chrono::{DateTime, Datelike, TimeDelta, Utc};

/// One series per name, in `names` order. A row contributes to a series only when it
/// carries that column as an integer.
pub fn build<'a>(rows: impl IntoIterator<Item = &'a HistoryRow>, names: &[String]) -> Vec<Series> {
    let mut out: Vec<Series> = names.iter().map(Series::new).collect();
    for row in rows {
        for series in &mut out {
            if let Some(value) = row.int(&series.name) {
                series.points.push(SeriesPoint(row.timestamp_ms, value));
            }
        }
    }
    out
}

/// Keeps points at or after `cutoff_ms`.
pub fn window(series: &[Series], cutoff_ms: i64) -> Vec<Series> {
    retain(series, |p| p.timestamp_ms() >= cutoff_ms)
}

/// Keeps points whose UTC year is `cutoff_year` or later.
pub fn filter_by_year(series: &[Series], cutoff_year: i32) -> Vec<Series> {
    retain(series, |p| utc_year(p.timestamp_ms()).is_some_and(|y| y >= cutoff_year))
}

/// Start of the trailing window ending at `now`, in epoch milliseconds. A window reaching
/// past the representable range keeps everything.
pub fn window_cutoff(now: DateTime<Utc>, window_hours: u32) -> i64 {
    TimeDelta::try_hours(i64::from(window_hours))
        .and_then(|span| now.checked_sub_signed(span))
        .map_or(i64::MIN, |start| start.timestamp_millis())
}

pub fn utc_year(timestamp_ms: i64) -> Option<i32> {
    DateTime::from_timestamp_millis(timestamp_ms).map(|dt| dt.year())
}

pub fn payload(generated_at: &str, series: Vec<Series>) -> SeriesPayload {
    SeriesPayload {
        generated_at: generated_at.to_string(),
        series,
    }
}

fn retain(series: &[Series], keep: impl Fn(&SeriesPoint) -> bool) -> Vec<Series> {
    series
        .iter()
        .map(|s| Series {
            name: s.name.clone(),
            points: s.points.iter().copied().filter(|p| keep(p)).collect(),
        })
        .collect()
}
