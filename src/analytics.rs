use serde::Serialize;

use crate::aggregator::{aggregate, Heatmap, SessionStats, StatsConfig};
use crate::error::AnalyticsError;
use crate::record::{HeatmapPoint, SessionSummary};
use crate::store::RecordStore;

/// Statistics payload handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerReport {
    pub player_id: String,
    #[serde(flatten)]
    pub stats: SessionStats,
    pub heatmap: Vec<HeatmapPoint>,
}

/// Statistics over a player's newest records, capped by `config.recent_limit`.
///
/// Reading while the same session is still being ingested may see a moving
/// window of "latest" records; callers needing a stable snapshot must not
/// overlap the two.
pub fn analyze_player<S: RecordStore + ?Sized>(
    store: &S,
    player_id: &str,
    config: &StatsConfig,
) -> Result<PlayerReport, AnalyticsError> {
    let records = store.query_recent(player_id, config.recent_limit)?;
    let stats = aggregate(player_id, &records, config)?;

    log::info!(
        "[STATS] {}: {} records, max {:.2} m/s, {:.1} m, {} sprints",
        player_id,
        stats.records_count,
        stats.max_speed,
        stats.total_distance,
        stats.sprint_count
    );

    Ok(PlayerReport {
        player_id: player_id.to_string(),
        stats,
        heatmap: Heatmap::new(&records).iter().collect(),
    })
}

pub fn session_summary<S: RecordStore + ?Sized>(
    store: &S,
    player_id: &str,
    session_id: &str,
) -> Result<SessionSummary, AnalyticsError> {
    store
        .query_session_summary(player_id, session_id)?
        .ok_or_else(|| AnalyticsError::NoData {
            player_id: player_id.to_string(),
        })
}
