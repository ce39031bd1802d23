use serde::Serialize;
use std::iter::Map;
use std::slice::Iter;

use crate::error::AnalyticsError;
use crate::record::{HeatmapPoint, PositionRecord};

/// Speed above which a single sample counts as a sprint (m/s).
pub const DEFAULT_SPRINT_THRESHOLD_MPS: f64 = 4.0;
/// How many of a player's newest records feed the statistics.
pub const DEFAULT_RECENT_LIMIT: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsConfig {
    pub sprint_threshold_mps: f64,
    pub recent_limit: usize,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            sprint_threshold_mps: DEFAULT_SPRINT_THRESHOLD_MPS,
            recent_limit: DEFAULT_RECENT_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SessionStats {
    pub max_speed: f64,
    pub total_distance: f64,
    pub sprint_count: usize,
    pub avg_intensity: f64,
    pub records_count: usize,
}

/// Compute statistics over `records`, which arrive newest first.
///
/// `total_distance` sums the displacement between adjacent list entries in
/// the order given, without reordering by time.
pub fn aggregate(
    player_id: &str,
    records: &[PositionRecord],
    config: &StatsConfig,
) -> Result<SessionStats, AnalyticsError> {
    let Some(first) = records.first() else {
        return Err(AnalyticsError::NoData {
            player_id: player_id.to_string(),
        });
    };

    let max_speed = records
        .iter()
        .map(PositionRecord::velocity)
        .fold(first.velocity(), f64::max);
    let total_distance: f64 = records.windows(2).map(|w| w[1].distance_to(&w[0])).sum();
    let sprint_count = records
        .iter()
        .filter(|r| r.velocity() > config.sprint_threshold_mps)
        .count();
    let avg_intensity =
        records.iter().map(PositionRecord::intensity).sum::<f64>() / records.len() as f64;

    let stats = SessionStats {
        max_speed,
        total_distance,
        sprint_count,
        avg_intensity,
        records_count: records.len(),
    };
    log::debug!("[STATS] {}: {:?}", player_id, stats);
    Ok(stats)
}

/// Normalized-intensity points in input order. Iterating does not consume
/// the map; call [`Heatmap::iter`] again to restart.
#[derive(Debug, Clone, Copy)]
pub struct Heatmap<'a> {
    records: &'a [PositionRecord],
}

pub type HeatmapIter<'a> = Map<Iter<'a, PositionRecord>, fn(&PositionRecord) -> HeatmapPoint>;

fn to_point(record: &PositionRecord) -> HeatmapPoint {
    HeatmapPoint::from(record)
}

impl<'a> Heatmap<'a> {
    pub fn new(records: &'a [PositionRecord]) -> Self {
        Self { records }
    }

    pub fn iter(&self) -> HeatmapIter<'a> {
        self.records.iter().map(to_point as fn(&PositionRecord) -> HeatmapPoint)
    }
}

impl<'a> IntoIterator for Heatmap<'a> {
    type Item = HeatmapPoint;
    type IntoIter = HeatmapIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 22, 18, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn record(secs: i64, x: f64, y: f64, velocity: f64) -> PositionRecord {
        PositionRecord::new(at(secs), "p1", "s1", x, y, velocity, "")
    }

    #[test]
    fn two_record_statistics() {
        let records = vec![record(2, 0.0, 0.0, 1.0), record(0, 3.0, 4.0, 5.0)];
        let stats = aggregate("p1", &records, &StatsConfig::default()).unwrap();
        assert_eq!(stats.max_speed, 5.0);
        assert_eq!(stats.total_distance, 5.0);
        assert_eq!(stats.avg_intensity, 60.0);
        assert_eq!(stats.sprint_count, 1);
        assert_eq!(stats.records_count, 2);
    }

    #[test]
    fn empty_input_is_no_data() {
        let err = aggregate("p9", &[], &StatsConfig::default()).unwrap_err();
        assert!(matches!(err, AnalyticsError::NoData { ref player_id } if player_id == "p9"));
    }

    #[test]
    fn distance_follows_list_order_even_when_backtracking() {
        // Out-and-back path: every hop is counted
        let records = vec![
            record(3, 0.0, 0.0, 0.0),
            record(2, 10.0, 0.0, 0.0),
            record(1, 0.0, 0.0, 0.0),
        ];
        let stats = aggregate("p1", &records, &StatsConfig::default()).unwrap();
        assert_eq!(stats.total_distance, 20.0);
        assert_eq!(stats.max_speed, 0.0);
    }

    #[test]
    fn sprint_threshold_is_strict_and_configurable() {
        let records = vec![
            record(0, 1.0, 1.0, 4.0),
            record(1, 1.0, 1.0, 4.01),
            record(2, 1.0, 1.0, 6.0),
        ];
        let stats = aggregate("p1", &records, &StatsConfig::default()).unwrap();
        assert_eq!(stats.sprint_count, 2);

        let config = StatsConfig {
            sprint_threshold_mps: 5.0,
            ..StatsConfig::default()
        };
        assert_eq!(aggregate("p1", &records, &config).unwrap().sprint_count, 1);
    }

    #[test]
    fn single_record_has_no_distance() {
        let stats = aggregate("p1", &[record(0, 5.0, 5.0, 2.0)], &StatsConfig::default()).unwrap();
        assert_eq!(stats.total_distance, 0.0);
        assert_eq!(stats.avg_intensity, 40.0);
    }

    #[test]
    fn heatmap_is_restartable_and_ordered() {
        let records = vec![record(1, 1.0, 2.0, 5.0), record(0, 3.0, 4.0, 1.0)];
        let heatmap = Heatmap::new(&records);
        let first: Vec<HeatmapPoint> = heatmap.iter().collect();
        let second: Vec<HeatmapPoint> = heatmap.into_iter().collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_eq!(
            first[0],
            HeatmapPoint {
                x: 1.0,
                y: 2.0,
                intensity: 1.0
            }
        );
        assert!((first[1].intensity - 0.2).abs() < 1e-12);
    }
}
