use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Futsal court dimensions in meters.
pub const COURT_LENGTH_M: f64 = 40.0;
pub const COURT_WIDTH_M: f64 = 20.0;

const GOAL_AREA_RADIUS_M: f64 = 6.0;
const CENTER_CIRCLE_RADIUS_M: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Zone {
    OutOfField,
    HomeGoalArea,
    AwayGoalArea,
    CenterCircle,
    DefensiveThird,
    MiddleThird,
    AttackingThird,
}

impl Zone {
    pub const ALL: [Zone; 7] = [
        Zone::OutOfField,
        Zone::HomeGoalArea,
        Zone::AwayGoalArea,
        Zone::CenterCircle,
        Zone::DefensiveThird,
        Zone::MiddleThird,
        Zone::AttackingThird,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Zone::OutOfField => "OutOfField",
            Zone::HomeGoalArea => "HomeGoalArea",
            Zone::AwayGoalArea => "AwayGoalArea",
            Zone::CenterCircle => "CenterCircle",
            Zone::DefensiveThird => "DefensiveThird",
            Zone::MiddleThird => "MiddleThird",
            Zone::AttackingThird => "AttackingThird",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Zone::OutOfField => "Outside the field",
            Zone::HomeGoalArea => "Home goal area",
            Zone::AwayGoalArea => "Away goal area",
            Zone::CenterCircle => "Center circle",
            Zone::DefensiveThird => "Defensive third",
            Zone::MiddleThird => "Middle third",
            Zone::AttackingThird => "Attacking third",
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Zone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Zone::ALL
            .iter()
            .copied()
            .find(|zone| zone.as_str() == s)
            .ok_or_else(|| format!("unknown zone '{s}'"))
    }
}

fn distance(x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    ((x1 - x2).powi(2) + (y1 - y2).powi(2)).sqrt()
}

/// Map a court-relative position (meters) to its zone.
///
/// Branches are evaluated top to bottom and the first match wins. Positions
/// outside the 40x20 m surface are not rejected; they map to
/// [`Zone::OutOfField`].
pub fn classify(x: f64, y: f64) -> Zone {
    // NaN fails every comparison below, so test for in-range explicitly
    let in_field = (0.0..=COURT_LENGTH_M).contains(&x) && (0.0..=COURT_WIDTH_M).contains(&y);
    if !in_field {
        return Zone::OutOfField;
    }

    let mid_y = COURT_WIDTH_M / 2.0;

    if distance(x, y, 0.0, mid_y) <= GOAL_AREA_RADIUS_M && x <= GOAL_AREA_RADIUS_M {
        return Zone::HomeGoalArea;
    }
    if distance(x, y, COURT_LENGTH_M, mid_y) <= GOAL_AREA_RADIUS_M
        && x >= COURT_LENGTH_M - GOAL_AREA_RADIUS_M
    {
        return Zone::AwayGoalArea;
    }
    if distance(x, y, COURT_LENGTH_M / 2.0, mid_y) <= CENTER_CIRCLE_RADIUS_M {
        return Zone::CenterCircle;
    }

    if x <= COURT_LENGTH_M / 3.0 {
        Zone::DefensiveThird
    } else if x <= 2.0 * COURT_LENGTH_M / 3.0 {
        Zone::MiddleThird
    } else {
        Zone::AttackingThird
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_points_are_in_field() {
        assert_ne!(classify(0.0, 0.0), Zone::OutOfField);
        assert_ne!(classify(40.0, 20.0), Zone::OutOfField);
        assert_eq!(classify(-0.1, 5.0), Zone::OutOfField);
        assert_eq!(classify(41.0, 5.0), Zone::OutOfField);
        assert_eq!(classify(10.0, 20.5), Zone::OutOfField);
        assert_eq!(classify(10.0, -3.0), Zone::OutOfField);
    }

    #[test]
    fn non_finite_coordinates_are_out_of_field() {
        assert_eq!(classify(f64::NAN, 5.0), Zone::OutOfField);
        assert_eq!(classify(5.0, f64::INFINITY), Zone::OutOfField);
    }

    #[test]
    fn goal_areas_and_center_circle() {
        assert_eq!(classify(3.0, 10.0), Zone::HomeGoalArea);
        assert_eq!(classify(37.0, 10.0), Zone::AwayGoalArea);
        assert_eq!(classify(20.0, 10.0), Zone::CenterCircle);
        // Exactly on the arc counts as inside
        assert_eq!(classify(6.0, 10.0), Zone::HomeGoalArea);
        assert_eq!(classify(23.0, 10.0), Zone::CenterCircle);
        // Inside the radius horizontally but too far along y
        assert_eq!(classify(1.0, 16.5), Zone::DefensiveThird);
    }

    #[test]
    fn thirds() {
        assert_eq!(classify(5.0, 5.0), Zone::DefensiveThird);
        assert_eq!(classify(20.0, 5.0), Zone::MiddleThird);
        assert_eq!(classify(35.0, 5.0), Zone::AttackingThird);
        assert_eq!(classify(40.0 / 3.0, 1.0), Zone::DefensiveThird);
        assert_eq!(classify(80.0 / 3.0, 1.0), Zone::MiddleThird);
        assert_eq!(classify(26.7, 1.0), Zone::AttackingThird);
    }

    #[test]
    fn classification_is_deterministic() {
        for &(x, y) in &[(0.0, 0.0), (3.0, 10.0), (19.5, 11.0), (39.9, 0.1), (55.0, -1.0)] {
            let first = classify(x, y);
            for _ in 0..5 {
                assert_eq!(classify(x, y), first);
            }
        }
    }

    #[test]
    fn zone_names_round_trip_through_str() {
        for zone in Zone::ALL {
            assert_eq!(zone.as_str().parse::<Zone>(), Ok(zone));
        }
        assert!("Midfield".parse::<Zone>().is_err());
    }
}
