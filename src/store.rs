use crate::error::StoreError;
use crate::record::{PositionRecord, SessionOverview, SessionSummary};

/// Append-only storage of position records.
///
/// Implementations must make each insert atomic and guarantee that
/// `query_latest` observes every insert that returned before it was called.
/// Ingestion relies on that read-your-writes behaviour for kinematics.
/// Records read back equal what was inserted, timestamps to the nanosecond;
/// `insert` may reject instants outside the years 0000-9999.
pub trait RecordStore: Send + Sync {
    /// Persist a record and return its store-assigned id.
    fn insert(&self, record: &PositionRecord) -> Result<i64, StoreError>;

    /// Most recently inserted record of a session (insertion order, not time).
    fn query_latest(
        &self,
        player_id: &str,
        session_id: &str,
    ) -> Result<Option<PositionRecord>, StoreError>;

    /// Up to `limit` records of a player across sessions, newest timestamp first.
    fn query_recent(&self, player_id: &str, limit: usize)
        -> Result<Vec<PositionRecord>, StoreError>;

    fn query_session_summary(
        &self,
        player_id: &str,
        session_id: &str,
    ) -> Result<Option<SessionSummary>, StoreError>;

    /// Stored sessions, most recently active first.
    fn list_sessions(&self, limit: usize) -> Result<Vec<SessionOverview>, StoreError>;

    fn count(&self) -> Result<u64, StoreError>;
}

/// Fold records into a summary; `None` for an empty input.
pub(crate) fn summarize<'a, I>(records: I) -> Option<SessionSummary>
where
    I: IntoIterator<Item = &'a PositionRecord>,
{
    let mut iter = records.into_iter();
    let first = iter.next()?;

    let mut summary = SessionSummary {
        count: 1,
        avg_speed: first.velocity(),
        max_speed: first.velocity(),
        avg_intensity: first.intensity(),
        first_ts: first.timestamp(),
        last_ts: first.timestamp(),
    };

    // avg_* hold running sums until the end
    for record in iter {
        summary.count += 1;
        summary.avg_speed += record.velocity();
        summary.max_speed = summary.max_speed.max(record.velocity());
        summary.avg_intensity += record.intensity();
        summary.first_ts = summary.first_ts.min(record.timestamp());
        summary.last_ts = summary.last_ts.max(record.timestamp());
    }

    let n = summary.count as f64;
    summary.avg_speed /= n;
    summary.avg_intensity /= n;
    Some(summary)
}
