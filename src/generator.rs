use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::zone::{COURT_LENGTH_M, COURT_WIDTH_M};

/// Movement modes with their speed range (m/s) and selection weight.
const MODES: [(&str, f64, f64, f64); 4] = [
    ("walking", 0.5, 1.5, 0.3),
    ("jogging", 1.5, 3.0, 0.4),
    ("running", 3.0, 4.5, 0.2),
    ("sprinting", 4.5, 6.5, 0.1),
];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub tag_id: String,
    pub duration_secs: f64,
    pub sample_hz: f64,
    pub seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            tag_id: "1".to_string(),
            duration_secs: 300.0,
            sample_hz: 25.0,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneratedSample {
    pub timestamp: DateTime<Utc>,
    pub x: f64,
    pub y: f64,
}

fn pick_mode(rng: &mut impl Rng) -> (&'static str, f64) {
    let roll: f64 = rng.gen();
    let mut acc = 0.0;
    for (name, low, high, weight) in MODES {
        acc += weight;
        if roll < acc {
            return (name, rng.gen_range(low..high));
        }
    }
    let (name, low, high, _) = MODES[MODES.len() - 1];
    (name, rng.gen_range(low..high))
}

fn pick_target(rng: &mut impl Rng) -> (f64, f64) {
    (
        rng.gen_range(0.0..COURT_LENGTH_M),
        rng.gen_range(0.0..COURT_WIDTH_M),
    )
}

/// Simulate one player's movement on the court.
pub fn generate_session(config: &GeneratorConfig, start: DateTime<Utc>) -> Vec<GeneratedSample> {
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let step_ms = (1000.0 / config.sample_hz).round().max(1.0) as i64;
    let dt = step_ms as f64 / 1000.0;
    let total = (config.duration_secs * 1000.0 / step_ms as f64).floor() as usize;

    let (mut x, mut y) = (COURT_LENGTH_M / 2.0, COURT_WIDTH_M / 2.0);
    let (mut mode, mut speed) = pick_mode(&mut rng);
    let mut target = pick_target(&mut rng);
    log::debug!("[GENERATE] Starting in mode {} at {:.1} m/s", mode, speed);

    let mut samples = Vec::with_capacity(total);
    for i in 0..total {
        samples.push(GeneratedSample {
            timestamp: start + Duration::milliseconds(step_ms * i as i64),
            x,
            y,
        });

        let (dx, dy) = (target.0 - x, target.1 - y);
        let remaining = (dx * dx + dy * dy).sqrt();
        let step = speed * dt;
        if remaining <= step {
            x = target.0;
            y = target.1;
            (mode, speed) = pick_mode(&mut rng);
            target = pick_target(&mut rng);
            log::trace!("[GENERATE] Switching to {} at {:.1} m/s", mode, speed);
        } else {
            // Small lateral jitter, like sensor noise on a real tag
            let jitter = rng.gen_range(-0.02..0.02);
            x = (x + dx / remaining * step + jitter).clamp(0.0, COURT_LENGTH_M);
            y = (y + dy / remaining * step - jitter).clamp(0.0, COURT_WIDTH_M);
        }
    }
    samples
}

/// Write a `timestamp,tag_id,x,y` CSV and return the number of data rows.
pub fn write_csv(path: &Path, config: &GeneratorConfig, start: DateTime<Utc>) -> Result<usize> {
    let samples = generate_session(config, start);
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;

    writer
        .write_record(["timestamp", "tag_id", "x", "y"])
        .context("failed to write CSV header")?;
    for sample in &samples {
        writer
            .write_record([
                sample.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                config.tag_id.clone(),
                format!("{:.3}", sample.x),
                format!("{:.3}", sample.y),
            ])
            .context("failed to write CSV row")?;
    }
    writer.flush().context("failed to flush CSV")?;

    log::info!(
        "[GENERATE] Wrote {} samples ({:.0} s at {} Hz) to {}",
        samples.len(),
        config.duration_secs,
        config.sample_hz,
        path.display()
    );
    Ok(samples.len())
}
