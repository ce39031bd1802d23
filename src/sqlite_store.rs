use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Datelike, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::StoreError;
use crate::record::{PositionRecord, SessionOverview, SessionSummary};
use crate::store::RecordStore;

const SCHEMA_VERSION: i32 = 1;

const RECORD_COLUMNS: &str =
    "id, timestamp, player_id, session_id, x_position, y_position, velocity, raw_data";

/// SQLite-backed record store.
///
/// One connection behind a mutex: every call runs to completion before the
/// next starts, which gives per-session read-your-writes for free.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("failed to open SQLite database {}", path.display()))?;
        if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
            log::warn!("[STORE] Failed to enable WAL mode: {}", err);
        }

        let store = Self::from_connection(conn)?;
        log::info!("[STORE] Database ready at {}", path.display());
        Ok(store)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        Self::from_connection(conn)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        ensure_schema(&mut conn).context("failed to prepare database schema")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

/// Create the schema on a fresh database; refuse one written by a newer build.
fn ensure_schema(conn: &mut Connection) -> Result<()> {
    let version: i32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .context("failed to read schema version")?;

    match version {
        SCHEMA_VERSION => Ok(()),
        0 => {
            let tx = conn
                .transaction()
                .context("failed to begin schema transaction")?;
            tx.execute_batch(include_str!("schemas/schema_v1.sql"))
                .context("failed to create position_records table")?;
            tx.pragma_update(None, "user_version", SCHEMA_VERSION)
                .context("failed to record schema version")?;
            tx.commit().context("failed to commit schema")?;
            log::info!("[STORE] Created schema version {}", SCHEMA_VERSION);
            Ok(())
        }
        other => bail!(
            "database schema version {} is not supported (this build writes {})",
            other,
            SCHEMA_VERSION
        ),
    }
}

/// Fixed-width RFC 3339 at nanosecond precision: lexical order in SQL equals
/// time order and every instant reads back unchanged. Four-digit years only.
fn format_timestamp(ts: DateTime<Utc>) -> Result<String, StoreError> {
    if !(0..=9999).contains(&ts.year()) {
        return Err(StoreError::Rejected(format!(
            "timestamp {ts} has no four-digit year"
        )));
    }
    Ok(ts.to_rfc3339_opts(SecondsFormat::Nanos, true))
}

fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<PositionRecord> {
    let id: i64 = row.get(0)?;
    let timestamp: String = row.get(1)?;
    let player_id: String = row.get(2)?;
    let session_id: String = row.get(3)?;
    let x: f64 = row.get(4)?;
    let y: f64 = row.get(5)?;
    let velocity: f64 = row.get(6)?;
    let raw: String = row.get(7)?;

    // zone and intensity are recomputed from the stored inputs
    Ok(PositionRecord::new(
        parse_timestamp(1, &timestamp)?,
        player_id,
        session_id,
        x,
        y,
        velocity,
        raw,
    )
    .with_id(id))
}

fn limit_to_sql(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

impl RecordStore for SqliteStore {
    fn insert(&self, record: &PositionRecord) -> Result<i64, StoreError> {
        let timestamp = format_timestamp(record.timestamp())?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO position_records (
                timestamp, player_id, session_id, x_position, y_position,
                velocity, intensity, zone, raw_data
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                timestamp,
                record.player_id(),
                record.session_id(),
                record.x(),
                record.y(),
                record.velocity(),
                record.intensity(),
                record.zone().as_str(),
                record.raw(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn query_latest(
        &self,
        player_id: &str,
        session_id: &str,
    ) -> Result<Option<PositionRecord>, StoreError> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                &format!(
                    "SELECT {RECORD_COLUMNS} FROM position_records
                     WHERE player_id = ?1 AND session_id = ?2
                     ORDER BY id DESC LIMIT 1"
                ),
                params![player_id, session_id],
                record_from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn query_recent(
        &self,
        player_id: &str,
        limit: usize,
    ) -> Result<Vec<PositionRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM position_records
             WHERE player_id = ?1
             ORDER BY timestamp DESC, id DESC
             LIMIT ?2"
        ))?;
        let rows = stmt.query_map(params![player_id, limit_to_sql(limit)], record_from_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn query_session_summary(
        &self,
        player_id: &str,
        session_id: &str,
    ) -> Result<Option<SessionSummary>, StoreError> {
        let conn = self.lock()?;
        let summary = conn.query_row(
            "SELECT COUNT(*), AVG(velocity), MAX(velocity), AVG(intensity),
                    MIN(timestamp), MAX(timestamp)
             FROM position_records
             WHERE player_id = ?1 AND session_id = ?2",
            params![player_id, session_id],
            summary_from_row,
        )?;
        Ok(summary)
    }

    fn list_sessions(&self, limit: usize) -> Result<Vec<SessionOverview>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT player_id, session_id,
                    COUNT(*), AVG(velocity), MAX(velocity), AVG(intensity),
                    MIN(timestamp), MAX(timestamp) AS last_record
             FROM position_records
             GROUP BY player_id, session_id
             ORDER BY last_record DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit_to_sql(limit)], |row| {
            let player_id: String = row.get(0)?;
            let session_id: String = row.get(1)?;
            let summary = summary_at(row, 2)?;
            Ok((player_id, session_id, summary))
        })?;

        let mut sessions = Vec::new();
        for row in rows {
            let (player_id, session_id, summary) = row?;
            let summary = summary.ok_or_else(|| {
                StoreError::Corrupt(format!("empty group for {player_id}/{session_id}"))
            })?;
            sessions.push(SessionOverview {
                player_id,
                session_id,
                summary,
            });
        }
        Ok(sessions)
    }

    fn count(&self) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM position_records", [], |row| row.get(0))?;
        u64::try_from(count).map_err(|_| StoreError::Corrupt(format!("negative count {count}")))
    }
}

fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<Option<SessionSummary>> {
    summary_at(row, 0)
}

/// Read the six aggregate columns starting at `base`; `None` when COUNT is 0.
fn summary_at(row: &Row<'_>, base: usize) -> rusqlite::Result<Option<SessionSummary>> {
    let count: i64 = row.get(base)?;
    if count == 0 {
        return Ok(None);
    }

    let avg_speed: Option<f64> = row.get(base + 1)?;
    let max_speed: Option<f64> = row.get(base + 2)?;
    let avg_intensity: Option<f64> = row.get(base + 3)?;
    let first_ts: String = row.get(base + 4)?;
    let last_ts: String = row.get(base + 5)?;

    Ok(Some(SessionSummary {
        count: count as u64,
        avg_speed: avg_speed.unwrap_or_default(),
        max_speed: max_speed.unwrap_or_default(),
        avg_intensity: avg_intensity.unwrap_or_default(),
        first_ts: parse_timestamp(base + 4, &first_ts)?,
        last_ts: parse_timestamp(base + 5, &last_ts)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::MemoryStore;
    use crate::zone::Zone;
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 22, 18, 0, 0).unwrap() + Duration::seconds(secs)
    }

    #[test]
    fn insert_and_read_back() {
        let store = SqliteStore::open_in_memory().unwrap();
        let record = PositionRecord::new(at(0), "p1", "s1", 3.0, 10.0, 2.5, "t,3,10");
        let id = store.insert(&record).unwrap();

        let latest = store.query_latest("p1", "s1").unwrap().unwrap();
        assert_eq!(latest.id(), Some(id));
        assert_eq!(latest.timestamp(), at(0));
        assert_eq!(latest.zone(), Zone::HomeGoalArea);
        assert_eq!(latest.intensity(), 50.0);
        assert_eq!(latest.raw(), "t,3,10");
        assert!(store.query_latest("p1", "other").unwrap().is_none());
    }

    #[test]
    fn latest_is_by_insertion_not_time() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .insert(&PositionRecord::new(at(10), "p1", "s1", 1.0, 1.0, 0.0, ""))
            .unwrap();
        store
            .insert(&PositionRecord::new(at(5), "p1", "s1", 2.0, 2.0, 0.0, ""))
            .unwrap();

        let latest = store.query_latest("p1", "s1").unwrap().unwrap();
        assert_eq!(latest.x(), 2.0);
    }

    #[test]
    fn recent_orders_by_timestamp_across_sessions() {
        let store = SqliteStore::open_in_memory().unwrap();
        for (session, secs) in [("s1", 3), ("s2", 1), ("s1", 2)] {
            store
                .insert(&PositionRecord::new(at(secs), "p1", session, 5.0, 5.0, secs as f64, ""))
                .unwrap();
        }
        store
            .insert(&PositionRecord::new(at(9), "p2", "s1", 5.0, 5.0, 9.0, ""))
            .unwrap();

        let recent = store.query_recent("p1", 1000).unwrap();
        let speeds: Vec<f64> = recent.iter().map(|r| r.velocity()).collect();
        assert_eq!(speeds, vec![3.0, 2.0, 1.0]);
        assert_eq!(store.query_recent("p1", 2).unwrap().len(), 2);
        assert!(store.query_recent("nobody", 10).unwrap().is_empty());
    }

    #[test]
    fn summary_and_sessions() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .insert(&PositionRecord::new(at(0), "p1", "s1", 5.0, 5.0, 1.0, ""))
            .unwrap();
        store
            .insert(&PositionRecord::new(at(30), "p1", "s1", 6.0, 5.0, 5.0, ""))
            .unwrap();
        store
            .insert(&PositionRecord::new(at(90), "p2", "s7", 6.0, 5.0, 2.0, ""))
            .unwrap();

        let summary = store.query_session_summary("p1", "s1").unwrap().unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.avg_speed, 3.0);
        assert_eq!(summary.max_speed, 5.0);
        assert_eq!(summary.avg_intensity, 60.0);
        assert_eq!(summary.first_ts, at(0));
        assert_eq!(summary.last_ts, at(30));
        assert!(store.query_session_summary("p1", "none").unwrap().is_none());

        let sessions = store.list_sessions(10).unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].session_id, "s7");
        assert_eq!(sessions[1].summary.count, 2);
        assert_eq!(store.count().unwrap(), 3);
    }

    #[test]
    fn reopening_a_file_keeps_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("uwb.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .insert(&PositionRecord::new(at(0), "p1", "s1", 1.0, 1.0, 0.0, ""))
                .unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn sub_millisecond_instants_read_back_like_memory_store() {
        let ts = DateTime::parse_from_rfc3339("2025-06-22T18:00:00.123456789Z")
            .unwrap()
            .with_timezone(&Utc);
        let record = PositionRecord::new(ts, "p1", "s1", 1.0, 1.0, 0.0, "");

        let sqlite = SqliteStore::open_in_memory().unwrap();
        let memory = MemoryStore::new();
        sqlite.insert(&record).unwrap();
        memory.insert(&record).unwrap();

        let from_sqlite = sqlite.query_latest("p1", "s1").unwrap().unwrap();
        let from_memory = memory.query_latest("p1", "s1").unwrap().unwrap();
        assert_eq!(from_sqlite.timestamp(), ts);
        assert_eq!(from_sqlite.timestamp(), from_memory.timestamp());

        // Same millisecond, later microsecond: still sorts newest first
        let later = ts + Duration::microseconds(1);
        sqlite
            .insert(&PositionRecord::new(later, "p1", "s1", 2.0, 2.0, 0.0, ""))
            .unwrap();
        let recent = sqlite.query_recent("p1", 10).unwrap();
        assert_eq!(recent[0].timestamp(), later);
        let summary = sqlite.query_session_summary("p1", "s1").unwrap().unwrap();
        assert_eq!(summary.first_ts, ts);
        assert_eq!(summary.last_ts, later);
    }

    #[test]
    fn five_digit_years_are_rejected_on_insert() {
        let store = SqliteStore::open_in_memory().unwrap();
        let far = Utc.with_ymd_and_hms(10000, 1, 1, 0, 0, 0).unwrap();
        let err = store
            .insert(&PositionRecord::new(far, "p1", "s1", 1.0, 1.0, 0.0, ""))
            .unwrap_err();
        assert!(matches!(err, StoreError::Rejected(_)));
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn newer_schema_version_is_refused() {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", SCHEMA_VERSION + 1)
            .unwrap();
        assert!(SqliteStore::from_connection(conn).is_err());
    }
}
