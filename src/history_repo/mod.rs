// CSV history. Append-only ledger, persisted by rewriting the whole file each cycle.
// Header: timestamp_iso, timestamp_ms, <history labels in registry order>, Total

use crate::artifacts::write_atomic;
use crate::models::{FieldValue, HistoryRow, TIMESTAMP_ISO, TIMESTAMP_MS};
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{instrument, warn};

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("history file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("history CSV: {0}")]
    Csv(#[from] csv::Error),
    /// Stored rows carry columns the current header would drop. Rewriting would lose data.
    #[error("stored rows have columns {0:?} outside the configured header; history left unchanged")]
    ColumnMismatch(Vec<String>),
}

/// Why a stored line is left out of the parsed rows.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
enum RowError {
    #[error("missing timestamp_ms")]
    MissingTimestamp,
    #[error("timestamp_ms {0:?} is not an integer")]
    BadTimestamp(String),
    #[error("not valid UTF-8: {0}")]
    Utf8(String),
}

/// A stored line that did not parse. Its cells are kept byte for byte, keyed by header
/// name, and written back on every rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnparsedLine {
    /// 1-based line where the record starts.
    pub line: Option<u64>,
    /// Number of parsed rows that precede this line in the file.
    pub before: usize,
    pub cells: BTreeMap<String, Vec<u8>>,
}

/// Everything in the history file: parsed rows plus the lines that failed to parse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    pub rows: Vec<HistoryRow>,
    pub unparsed: Vec<UnparsedLine>,
}

pub struct HistoryRepo {
    path: PathBuf,
}

impl HistoryRepo {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All stored rows in file order. A missing file is an empty history.
    /// Lines whose timestamp_ms does not parse are left out with a warning.
    pub fn load(&self) -> Result<Vec<HistoryRow>, HistoryError> {
        Ok(self.load_ledger()?.rows)
    }

    /// Like `load`, but keeps the unparsed lines so a rewrite can carry them over.
    #[instrument(skip(self), fields(repo = "history", operation = "load"))]
    pub fn load_ledger(&self) -> Result<Ledger, HistoryError> {
        if !self.path.exists() {
            return Ok(Ledger::default());
        }
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.path)?;
        let headers = reader.headers()?.clone();

        let mut ledger = Ledger::default();
        for record in reader.byte_records() {
            let record = record?;
            let parsed = csv::StringRecord::from_byte_record(record.clone())
                .map_err(|e| RowError::Utf8(e.to_string()))
                .and_then(|r| parse_row(&headers, &r));
            match parsed {
                Ok(row) => ledger.rows.push(row),
                Err(e) => {
                    let line = record.position().map(|p| p.line());
                    warn!(line = ?line, error = %e, "history row left out of the series; kept on disk");
                    ledger.unparsed.push(UnparsedLine {
                        line,
                        before: ledger.rows.len(),
                        cells: headers
                            .iter()
                            .zip(record.iter())
                            .map(|(name, cell)| (name.to_string(), cell.to_vec()))
                            .collect(),
                    });
                }
            }
        }
        tracing::debug!(
            rows = ledger.rows.len(),
            unparsed = ledger.unparsed.len(),
            "history loaded"
        );
        Ok(ledger)
    }

    /// Rewrites the file with exactly `columns` as header. Cells for absent fields are empty;
    /// unparsed lines go back at their original position.
    #[instrument(skip(self, ledger, columns), fields(repo = "history", operation = "persist", rows_count = ledger.rows.len()))]
    pub fn persist(&self, ledger: &Ledger, columns: &[String]) -> Result<(), HistoryError> {
        let known: HashSet<&str> = columns.iter().map(String::as_str).collect();
        let unparsed_names = ledger.unparsed.iter().flat_map(|u| {
            u.cells
                .iter()
                .filter(|(_, cell)| !cell.is_empty())
                .map(|(name, _)| name.as_str())
        });
        let mut extra: Vec<String> = ledger
            .rows
            .iter()
            .flat_map(HistoryRow::field_names)
            .chain(unparsed_names)
            .filter(|name| !known.contains(name))
            .map(String::from)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        if !extra.is_empty() {
            extra.sort();
            return Err(HistoryError::ColumnMismatch(extra));
        }

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(columns)?;
        let mut unparsed = ledger.unparsed.iter().peekable();
        for idx in 0..=ledger.rows.len() {
            while let Some(line) = unparsed.next_if(|u| u.before <= idx) {
                writer.write_record(
                    columns
                        .iter()
                        .map(|c| line.cells.get(c).map_or(&[][..], Vec::as_slice)),
                )?;
            }
            if let Some(row) = ledger.rows.get(idx) {
                writer.write_record(columns.iter().map(|c| cell(row, c)))?;
            }
        }
        let bytes = writer.into_inner().map_err(|e| HistoryError::Io {
            path: self.path.clone(),
            source: io::Error::new(e.error().kind(), e.to_string()),
        })?;
        write_atomic(&self.path, &bytes).map_err(|source| HistoryError::Io {
            path: self.path.clone(),
            source,
        })
    }

    /// Loads, appends `row`, rewrites. Returns the full row set including `row`.
    pub fn append_and_persist(
        &self,
        row: HistoryRow,
        columns: &[String],
    ) -> Result<Vec<HistoryRow>, HistoryError> {
        let mut ledger = self.load_ledger()?;
        ledger.rows.push(row);
        self.persist(&ledger, columns)?;
        Ok(ledger.rows)
    }
}

fn parse_row(headers: &csv::StringRecord, record: &csv::StringRecord) -> Result<HistoryRow, RowError> {
    let mut timestamp_ms = None;
    let mut timestamp_iso = None;
    let mut fields = Vec::new();
    for (name, raw) in headers.iter().zip(record.iter()) {
        match name {
            TIMESTAMP_MS => {
                timestamp_ms = Some(
                    raw.trim()
                        .parse::<i64>()
                        .map_err(|_| RowError::BadTimestamp(raw.to_string()))?,
                );
            }
            TIMESTAMP_ISO => {
                timestamp_iso = (!raw.trim().is_empty()).then(|| raw.trim().to_string());
            }
            // Empty cells come from columns added after the row was written.
            _ if raw.trim().is_empty() => {}
            _ => fields.push((name.to_string(), FieldValue::parse(raw))),
        }
    }
    let mut row = HistoryRow::new(timestamp_ms.ok_or(RowError::MissingTimestamp)?, timestamp_iso);
    for (name, value) in fields {
        row.insert(name, value);
    }
    Ok(row)
}

fn cell(row: &HistoryRow, column: &str) -> String {
    match column {
        TIMESTAMP_MS => row.timestamp_ms.to_string(),
        TIMESTAMP_ISO => row.timestamp_iso.clone().unwrap_or_default(),
        name => row.get(name).map(FieldValue::to_cell).unwrap_or_default(),
    }
}
