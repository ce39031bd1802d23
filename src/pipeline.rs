use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use csv::StringRecord;
use serde::Serialize;

use crate::error::{InsertError, SkipReason};
use crate::kinematics::{self, Sample};
use crate::record::PositionRecord;
use crate::schema::{self, ColumnMap};
use crate::store::RecordStore;

const MIN_COLUMNS: usize = 3;

/// Order in which the rows of a batch are fed to kinematic derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowOrdering {
    /// Stable-sort rows by parsed timestamp first.
    #[default]
    Chronological,
    /// Trust file order; the caller guarantees it is temporal.
    AsRecorded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineConfig {
    pub ordering: RowOrdering,
}

/// Outcome of one batch. `success` is false only when the batch could not be
/// started (unreadable source or unresolvable header); otherwise row-level
/// failures are listed in `errors` next to the count that did make it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestReport {
    pub success: bool,
    pub records_inserted: usize,
    pub rows_skipped: usize,
    pub errors: Vec<String>,
}

impl IngestReport {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            errors: vec![message.into()],
            ..Self::default()
        }
    }
}

/// A data row that survived parsing.
#[derive(Debug, Clone)]
struct ParsedRow {
    row: usize,
    sample: Sample,
    tag_id: Option<String>,
    explicit_velocity: Option<f64>,
    raw: String,
}

pub struct IngestionPipeline<'s, S: RecordStore + ?Sized> {
    store: &'s S,
    config: PipelineConfig,
}

impl<'s, S: RecordStore + ?Sized> IngestionPipeline<'s, S> {
    #[cfg(test)]
    pub fn new(store: &'s S) -> Self {
        Self::with_config(store, PipelineConfig::default())
    }

    pub fn with_config(store: &'s S, config: PipelineConfig) -> Self {
        Self { store, config }
    }

    pub fn ingest_path(&self, path: &Path, player_id: &str, session_id: &str) -> IngestReport {
        match File::open(path) {
            Ok(file) => self.ingest(file, player_id, session_id),
            Err(e) => {
                log::error!("[INGEST] Could not open {}: {}", path.display(), e);
                IngestReport::failed(format!("could not open {}: {}", path.display(), e))
            }
        }
    }

    /// Ingest one CSV batch for a `(player_id, session_id)` pair.
    pub fn ingest<R: Read>(&self, source: R, player_id: &str, session_id: &str) -> IngestReport {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(source);
        let mut rows = reader.records();

        let header = match rows.next() {
            Some(Ok(header)) => header,
            Some(Err(e)) => return IngestReport::failed(format!("could not read CSV header: {e}")),
            None => return IngestReport::failed("empty CSV: no header row"),
        };
        let header: Vec<&str> = header.iter().collect();
        let map = match schema::resolve(&header) {
            Ok(map) => map,
            Err(e) => return IngestReport::failed(e.to_string()),
        };

        let mut report = IngestReport {
            success: true,
            ..IngestReport::default()
        };
        let mut parsed = Vec::new();

        for (index, result) in rows.enumerate() {
            let row = index + 1;
            match result {
                Ok(record) => match parse_row(row, &record, &map) {
                    Ok(parsed_row) => parsed.push(parsed_row),
                    Err(reason) => {
                        log::debug!("[SKIP] Row {}: {}", row, reason);
                        report.rows_skipped += 1;
                    }
                },
                Err(e) if e.is_io_error() => {
                    log::error!("[INGEST] Read failed at row {}: {}", row, e);
                    report.errors.push(format!("read failed at row {row}: {e}"));
                    break;
                }
                Err(e) => {
                    log::warn!("[INGEST] Undecodable row {}: {}", row, e);
                    report.errors.push(format!("undecodable row {row}: {e}"));
                }
            }
        }

        if self.config.ordering == RowOrdering::Chronological {
            parsed.sort_by_key(|r| r.sample.timestamp);
        }

        let report = parsed.into_iter().fold(report, |mut report, row| {
            match self.insert_row(row, player_id, session_id) {
                Ok(()) => report.records_inserted += 1,
                Err(e) => {
                    log::warn!("[INGEST] {}", e);
                    report.errors.push(e.to_string());
                }
            }
            report
        });

        log::info!(
            "[INGEST] {}/{}: {} inserted, {} skipped, {} errors",
            player_id,
            session_id,
            report.records_inserted,
            report.rows_skipped,
            report.errors.len()
        );
        report
    }

    fn insert_row(
        &self,
        row: ParsedRow,
        player_id: &str,
        session_id: &str,
    ) -> Result<(), InsertError> {
        let to_insert_error = |source| InsertError {
            row: row.row,
            source,
        };

        let prior = self
            .store
            .query_latest(player_id, session_id)
            .map_err(to_insert_error)?;
        let velocity =
            kinematics::derive_velocity(&row.sample, row.explicit_velocity, prior.as_ref());

        if let Some(tag) = row.tag_id.as_deref().filter(|t| *t != player_id) {
            log::debug!("[INGEST] Row {} tag '{}' stored under player '{}'", row.row, tag, player_id);
        }

        let record = PositionRecord::new(
            row.sample.timestamp,
            player_id,
            session_id,
            row.sample.x,
            row.sample.y,
            velocity,
            row.raw,
        );
        self.store.insert(&record).map_err(to_insert_error)?;
        Ok(())
    }
}

fn cell<'r>(record: &'r StringRecord, idx: usize, name: &'static str) -> Result<&'r str, SkipReason> {
    record.get(idx).map(str::trim).ok_or(SkipReason::MissingCell(name))
}

fn parse_coordinate(value: &str, field: &'static str) -> Result<f64, SkipReason> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| SkipReason::InvalidCoordinate {
            field,
            value: value.to_string(),
        })
}

fn parse_row(row: usize, record: &StringRecord, map: &ColumnMap) -> Result<ParsedRow, SkipReason> {
    if record.len() < MIN_COLUMNS {
        return Err(SkipReason::TooFewColumns(record.len()));
    }

    let ts_cell = cell(record, map.timestamp, "timestamp")?;
    let timestamp =
        parse_timestamp(ts_cell).ok_or_else(|| SkipReason::InvalidTimestamp(ts_cell.to_string()))?;
    let x = parse_coordinate(cell(record, map.x, "x")?, "x")?;
    let y = parse_coordinate(cell(record, map.y, "y")?, "y")?;

    let tag_id = map
        .tag_id
        .and_then(|idx| record.get(idx))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    let explicit_velocity = map
        .velocity
        .and_then(|idx| record.get(idx))
        .and_then(kinematics::parse_velocity);

    Ok(ParsedRow {
        row,
        sample: Sample { timestamp, x, y },
        tag_id,
        explicit_velocity,
        raw: record.iter().collect::<Vec<_>>().join(","),
    })
}

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Numeric cells at or above this magnitude are epoch milliseconds; below it
/// they are epoch seconds (1e11 s is the year 5138, 1e11 ms is 1973).
const EPOCH_MILLIS_THRESHOLD: f64 = 1e11;

/// Accepts RFC 3339, naive `YYYY-MM-DD HH:MM:SS[.fff]` (as UTC) and Unix
/// epoch seconds or milliseconds. Instants outside the years 0000-9999 are
/// rejected: they have no fixed-width RFC 3339 form.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    parse_instant(value.trim()).filter(|dt| (0..=9999).contains(&dt.year()))
}

fn parse_instant(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }
    let number = value.parse::<f64>().ok().filter(|n| n.is_finite())?;
    let millis = if number.abs() >= EPOCH_MILLIS_THRESHOLD {
        number
    } else {
        number * 1000.0
    };
    DateTime::from_timestamp_millis(millis.round() as i64)
}
