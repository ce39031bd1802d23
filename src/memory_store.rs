use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::error::StoreError;
use crate::record::{PositionRecord, SessionOverview, SessionSummary};
use crate::store::{summarize, RecordStore};

/// In-process record store backing `ingest --dry-run`.
///
/// Test builds can tell it to reject one insert attempt to exercise
/// partial-failure paths.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    records: Vec<PositionRecord>,
    #[cfg(test)]
    insert_attempts: usize,
    #[cfg(test)]
    fail_on_attempt: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the `attempt`-th insert call (1-based).
    #[cfg(test)]
    pub fn failing_on(attempt: usize) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                fail_on_attempt: Some(attempt),
                ..MemoryState::default()
            }),
        }
    }

    #[cfg(test)]
    pub fn records(&self) -> Result<Vec<PositionRecord>, StoreError> {
        Ok(self.lock()?.records.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl RecordStore for MemoryStore {
    fn insert(&self, record: &PositionRecord) -> Result<i64, StoreError> {
        let mut state = self.lock()?;
        #[cfg(test)]
        {
            state.insert_attempts += 1;
            if state.fail_on_attempt == Some(state.insert_attempts) {
                return Err(StoreError::Rejected(format!(
                    "simulated failure on insert #{}",
                    state.insert_attempts
                )));
            }
        }

        let id = state.records.len() as i64 + 1;
        state.records.push(record.clone().with_id(id));
        Ok(id)
    }

    fn query_latest(
        &self,
        player_id: &str,
        session_id: &str,
    ) -> Result<Option<PositionRecord>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .records
            .iter()
            .rev()
            .find(|r| r.belongs_to(player_id, session_id))
            .cloned())
    }

    fn query_recent(
        &self,
        player_id: &str,
        limit: usize,
    ) -> Result<Vec<PositionRecord>, StoreError> {
        let state = self.lock()?;
        let mut recent: Vec<PositionRecord> = state
            .records
            .iter()
            .filter(|r| r.player_id() == player_id)
            .cloned()
            .collect();
        recent.sort_by(|a, b| {
            b.timestamp()
                .cmp(&a.timestamp())
                .then_with(|| b.id().cmp(&a.id()))
        });
        recent.truncate(limit);
        Ok(recent)
    }

    fn query_session_summary(
        &self,
        player_id: &str,
        session_id: &str,
    ) -> Result<Option<SessionSummary>, StoreError> {
        let state = self.lock()?;
        Ok(summarize(
            state
                .records
                .iter()
                .filter(|r| r.belongs_to(player_id, session_id)),
        ))
    }

    fn list_sessions(&self, limit: usize) -> Result<Vec<SessionOverview>, StoreError> {
        let state = self.lock()?;
        let mut grouped: HashMap<(&str, &str), Vec<&PositionRecord>> = HashMap::new();
        for record in &state.records {
            grouped
                .entry((record.player_id(), record.session_id()))
                .or_default()
                .push(record);
        }

        let mut sessions: Vec<SessionOverview> = grouped
            .into_iter()
            .filter_map(|((player_id, session_id), records)| {
                summarize(records).map(|summary| SessionOverview {
                    player_id: player_id.to_string(),
                    session_id: session_id.to_string(),
                    summary,
                })
            })
            .collect();
        sessions.sort_by(|a, b| b.summary.last_ts.cmp(&a.summary.last_ts));
        sessions.truncate(limit);
        Ok(sessions)
    }

    fn count(&self) -> Result<u64, StoreError> {
        Ok(self.lock()?.records.len() as u64)
    }
}
