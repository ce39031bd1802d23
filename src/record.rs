use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::kinematics::intensity_for;
use crate::zone::{classify, Zone};

/// One enriched position sample.
///
/// `zone` and `intensity` are derived from position and velocity when the
/// record is built and cannot be set independently. Records are never
/// mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionRecord {
    id: Option<i64>,
    timestamp: DateTime<Utc>,
    player_id: String,
    session_id: String,
    x: f64,
    y: f64,
    velocity: f64,
    intensity: f64,
    zone: Zone,
    raw: String,
}

impl PositionRecord {
    pub fn new(
        timestamp: DateTime<Utc>,
        player_id: impl Into<String>,
        session_id: impl Into<String>,
        x: f64,
        y: f64,
        velocity: f64,
        raw: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            timestamp,
            player_id: player_id.into(),
            session_id: session_id.into(),
            x,
            y,
            velocity,
            intensity: intensity_for(velocity),
            zone: classify(x, y),
            raw: raw.into(),
        }
    }

    /// Attach the identifier assigned by a record store.
    pub(crate) fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    pub fn intensity(&self) -> f64 {
        self.intensity
    }

    pub fn zone(&self) -> Zone {
        self.zone
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn distance_to(&self, other: &PositionRecord) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn belongs_to(&self, player_id: &str, session_id: &str) -> bool {
        self.player_id == player_id && self.session_id == session_id
    }
}

/// Aggregate view of one `(player_id, session_id)` pair as reported by a store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub count: u64,
    pub avg_speed: f64,
    pub max_speed: f64,
    pub avg_intensity: f64,
    pub first_ts: DateTime<Utc>,
    pub last_ts: DateTime<Utc>,
}

/// Row of the stored-sessions overview.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionOverview {
    pub player_id: String,
    pub session_id: String,
    pub summary: SessionSummary,
}

/// A point of the spatial intensity map; `intensity` is normalized to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HeatmapPoint {
    pub x: f64,
    pub y: f64,
    pub intensity: f64,
}

impl From<&PositionRecord> for HeatmapPoint {
    fn from(record: &PositionRecord) -> Self {
        Self {
            x: record.x,
            y: record.y,
            intensity: record.intensity / 100.0,
        }
    }
}
