use chrono::{DateTime, Utc};

use crate::record::PositionRecord;

/// Intensity points per m/s of speed.
const INTENSITY_PER_MPS: f64 = 20.0;
pub const MAX_INTENSITY: f64 = 100.0;

/// Bounded effort score in `[0, 100]` for a speed in m/s.
pub fn intensity_for(velocity: f64) -> f64 {
    (velocity.abs() * INTENSITY_PER_MPS).min(MAX_INTENSITY)
}

/// Parsed position of the row being ingested.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub x: f64,
    pub y: f64,
}

/// Speed in m/s for `sample`; intensity follows from it via [`intensity_for`].
///
/// An explicit velocity is used as-is. Otherwise speed is inferred from the
/// most recently inserted record of the same session; no prior record, or a
/// non-positive time step, yields zero.
pub fn derive_velocity(
    sample: &Sample,
    explicit_velocity: Option<f64>,
    prior: Option<&PositionRecord>,
) -> f64 {
    match (explicit_velocity, prior) {
        (Some(v), _) => v,
        (None, Some(prev)) => {
            let distance = ((sample.x - prev.x()).powi(2) + (sample.y - prev.y()).powi(2)).sqrt();
            let elapsed_ms = (sample.timestamp - prev.timestamp()).num_milliseconds();
            if elapsed_ms > 0 {
                distance / (elapsed_ms as f64 / 1000.0)
            } else {
                0.0
            }
        }
        (None, None) => 0.0,
    }
}

/// Parse a velocity cell, accepting only finite numbers.
pub fn parse_velocity(cell: &str) -> Option<f64> {
    cell.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 22, 18, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn prior(x: f64, y: f64, secs: i64) -> PositionRecord {
        PositionRecord::new(at(secs), "p1", "s1", x, y, 0.0, "")
    }

    #[test]
    fn infers_speed_from_prior_record() {
        let prev = prior(0.0, 0.0, 0);
        let sample = Sample {
            timestamp: at(2),
            x: 3.0,
            y: 4.0,
        };
        let v = derive_velocity(&sample, None, Some(&prev));
        assert_eq!(v, 2.5);
        assert_eq!(intensity_for(v), 50.0);
    }

    #[test]
    fn first_sample_of_session_is_at_rest() {
        let sample = Sample {
            timestamp: at(0),
            x: 12.0,
            y: 7.0,
        };
        assert_eq!(derive_velocity(&sample, None, None), 0.0);
    }

    #[test]
    fn explicit_velocity_wins() {
        let prev = prior(0.0, 0.0, 0);
        let sample = Sample {
            timestamp: at(1),
            x: 30.0,
            y: 0.0,
        };
        let v = derive_velocity(&sample, Some(3.0), Some(&prev));
        assert_eq!(v, 3.0);
        assert_eq!(intensity_for(v), 60.0);
    }

    #[test]
    fn non_positive_time_step_yields_zero() {
        let prev = prior(0.0, 0.0, 10);
        let same_instant = Sample {
            timestamp: at(10),
            x: 5.0,
            y: 0.0,
        };
        assert_eq!(derive_velocity(&same_instant, None, Some(&prev)), 0.0);

        let earlier = Sample {
            timestamp: at(4),
            x: 5.0,
            y: 0.0,
        };
        assert_eq!(derive_velocity(&earlier, None, Some(&prev)), 0.0);
    }

    #[test]
    fn sub_second_steps_keep_precision() {
        let prev = prior(0.0, 0.0, 0);
        let sample = Sample {
            timestamp: at(0) + Duration::milliseconds(40),
            x: 0.2,
            y: 0.0,
        };
        let v = derive_velocity(&sample, None, Some(&prev));
        assert!((v - 5.0).abs() < 1e-9);
    }

    #[test]
    fn intensity_is_capped_and_uses_magnitude() {
        assert_eq!(intensity_for(7.5), 100.0);
        assert_eq!(intensity_for(-2.0), 40.0);
        assert_eq!(intensity_for(0.0), 0.0);
    }

    #[test]
    fn velocity_cells_must_be_finite_numbers() {
        assert_eq!(parse_velocity(" 4.25 "), Some(4.25));
        assert_eq!(parse_velocity("fast"), None);
        assert_eq!(parse_velocity("NaN"), None);
        assert_eq!(parse_velocity(""), None);
    }
}
