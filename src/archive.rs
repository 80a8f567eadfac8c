// Yearly and monthly archives. Recomputed in full from the history on every cycle.
//
// Layout under the data dir:
//   yearly/<YYYY>.json, monthly/<YYYY-MM>.json, yearly_index.json, monthly_index.json

use crate::artifacts::ArtifactWriter;
use crate::models::{HistoryRow, MonthIndex, YearIndex};
use crate::series;
use chrono::{DateTime, Datelike};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::warn;

pub const YEARLY_DIR: &str = "yearly";
pub const MONTHLY_DIR: &str = "monthly";
pub const YEARLY_INDEX: &str = "yearly_index.json";
pub const MONTHLY_INDEX: &str = "monthly_index.json";

/// Calendar bucket of one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PartitionKey {
    pub year: i32,
    pub month: u32,
}

impl PartitionKey {
    /// From the ISO string's `YYYY-MM` prefix when it parses, else from timestamp_ms in UTC.
    /// Both keys come from the same source so a row's month always sits inside its year.
    pub fn of(row: &HistoryRow) -> Option<Self> {
        row.timestamp_iso
            .as_deref()
            .and_then(Self::from_iso_prefix)
            .or_else(|| Self::from_millis(row.timestamp_ms))
    }

    fn from_iso_prefix(iso: &str) -> Option<Self> {
        let year = iso.get(0..4)?;
        let month = iso.get(5..7)?;
        if iso.get(4..5)? != "-" || !is_digits(year) || !is_digits(month) {
            return None;
        }
        let month: u32 = month.parse().ok()?;
        (1..=12).contains(&month).then_some(Self {
            year: year.parse().ok()?,
            month,
        })
    }

    fn from_millis(ms: i64) -> Option<Self> {
        DateTime::from_timestamp_millis(ms).map(|dt| Self {
            year: dt.year(),
            month: dt.month(),
        })
    }

    /// `YYYY-MM`
    pub fn month_key(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

fn is_digits(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit())
}

/// Rows grouped by year and by month, each group in history order.
#[derive(Debug, Default)]
pub struct Partitions<'a> {
    pub by_year: BTreeMap<i32, Vec<&'a HistoryRow>>,
    pub by_month: BTreeMap<String, Vec<&'a HistoryRow>>,
}

impl Partitions<'_> {
    pub fn years(&self) -> Vec<i32> {
        self.by_year.keys().copied().collect()
    }

    pub fn months(&self) -> Vec<String> {
        self.by_month.keys().cloned().collect()
    }
}

pub fn partition(rows: &[HistoryRow]) -> Partitions<'_> {
    let mut parts = Partitions::default();
    for row in rows {
        let Some(key) = PartitionKey::of(row) else {
            warn!(timestamp_ms = row.timestamp_ms, "row has no usable timestamp; left out of archives");
            continue;
        };
        parts.by_year.entry(key.year).or_default().push(row);
        parts.by_month.entry(key.month_key()).or_default().push(row);
    }
    parts
}

/// Files written and failed by one archive pass.
#[derive(Debug, Default)]
pub struct ArchiveReport {
    pub written: Vec<PathBuf>,
    pub failed: Vec<String>,
}

/// Writes every year and month bucket, then the two indexes. Each file is independent:
/// a failed write is logged and recorded, and the rest still go out.
pub fn write_archives(
    rows: &[HistoryRow],
    names: &[String],
    writer: &ArtifactWriter,
    generated_at: &str,
) -> ArchiveReport {
    let parts = partition(rows);
    let mut report = ArchiveReport::default();

    for (year, year_rows) in &parts.by_year {
        let body = series::payload(generated_at, series::build(year_rows.iter().copied(), names));
        record(&mut report, writer.write_json(format!("{}/{}.json", YEARLY_DIR, year), &body));
    }
    for (month, month_rows) in &parts.by_month {
        let body = series::payload(generated_at, series::build(month_rows.iter().copied(), names));
        record(&mut report, writer.write_json(format!("{}/{}.json", MONTHLY_DIR, month), &body));
    }

    let years = YearIndex { years: parts.years() };
    record(&mut report, writer.write_json(YEARLY_INDEX, &years));
    let months = MonthIndex { months: parts.months() };
    record(&mut report, writer.write_json(MONTHLY_INDEX, &months));

    tracing::info!(
        years = parts.by_year.len(),
        months = parts.by_month.len(),
        failed = report.failed.len(),
        "archives written"
    );
    report
}

fn record(report: &mut ArchiveReport, result: Result<PathBuf, crate::artifacts::ArtifactError>) {
    match result {
        Ok(path) => report.written.push(path),
        Err(e) => {
            warn!(error = %e, "archive artifact skipped");
            report.failed.push(e.to_string());
        }
    }
}
