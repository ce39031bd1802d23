mod aggregator;
mod analytics;
mod error;
mod generator;
mod kinematics;
mod memory_store;
mod pipeline;
mod record;
mod schema;
mod sqlite_store;
mod store;
mod zone;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use aggregator::{StatsConfig, DEFAULT_RECENT_LIMIT, DEFAULT_SPRINT_THRESHOLD_MPS};
use analytics::{analyze_player, session_summary, PlayerReport};
use error::AnalyticsError;
use generator::GeneratorConfig;
use memory_store::MemoryStore;
use pipeline::{IngestReport, IngestionPipeline, PipelineConfig, RowOrdering};
use record::SessionSummary;
use sqlite_store::SqliteStore;
use store::RecordStore;

#[derive(Parser, Debug)]
#[command(name = "uwb-analytics")]
#[command(about = "UWB futsal telemetry ingestion and session analytics", long_about = None)]
struct Args {
    /// SQLite database file
    #[arg(long, env = "UWB_DB", default_value = "uwb_analytics.db")]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest a CSV batch for one player/session
    Ingest {
        file: PathBuf,

        #[arg(short, long)]
        player: String,

        #[arg(short, long)]
        session: String,

        /// Keep file order instead of sorting rows by timestamp
        #[arg(long)]
        as_recorded: bool,

        /// Validate and derive into memory without touching the database
        #[arg(long)]
        dry_run: bool,

        #[arg(long)]
        json: bool,
    },

    /// Statistics and heatmap over a player's most recent records
    Stats {
        #[arg(short, long)]
        player: String,

        /// Maximum number of recent records to aggregate
        #[arg(long, default_value_t = DEFAULT_RECENT_LIMIT)]
        limit: usize,

        /// Speed (m/s) above which a sample counts as a sprint
        #[arg(long, default_value_t = DEFAULT_SPRINT_THRESHOLD_MPS)]
        sprint_threshold: f64,

        #[arg(long)]
        json: bool,
    },

    /// Summary of a single player/session pair
    Summary {
        #[arg(short, long)]
        player: String,

        #[arg(short, long)]
        session: String,

        #[arg(long)]
        json: bool,
    },

    /// List stored sessions, most recent first
    Sessions {
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Write a synthetic session CSV
    Generate {
        out: PathBuf,

        #[arg(long, default_value = "1")]
        tag: String,

        #[arg(long, default_value = "5.0")]
        minutes: f64,

        /// Samples per second
        #[arg(long, default_value = "25.0")]
        hz: f64,

        #[arg(long)]
        seed: Option<u64>,
    },

    /// Print the court zone of a position
    Zone {
        #[arg(allow_hyphen_values = true)]
        x: f64,
        #[arg(allow_hyphen_values = true)]
        y: f64,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    match args.command {
        Command::Ingest {
            file,
            player,
            session,
            as_recorded,
            dry_run,
            json,
        } => {
            let config = PipelineConfig {
                ordering: if as_recorded {
                    RowOrdering::AsRecorded
                } else {
                    RowOrdering::Chronological
                },
            };
            let store: Box<dyn RecordStore> = if dry_run {
                Box::new(MemoryStore::new())
            } else {
                Box::new(open_store(&args.db)?)
            };
            let report = IngestionPipeline::with_config(store.as_ref(), config)
                .ingest_path(&file, &player, &session);
            if json {
                print_json(&report)?;
            } else {
                print_ingest(&report);
            }
            if !report.success {
                std::process::exit(1);
            }
        }
        Command::Stats {
            player,
            limit,
            sprint_threshold,
            json,
        } => {
            let store = open_store(&args.db)?;
            let config = StatsConfig {
                sprint_threshold_mps: sprint_threshold,
                recent_limit: limit,
            };
            match analyze_player(&store, &player, &config) {
                Ok(report) if json => print_json(&report)?,
                Ok(report) => print_stats(&report),
                Err(AnalyticsError::NoData { player_id }) => no_data(&player_id),
                Err(e) => return Err(e).context("failed to compute statistics"),
            }
        }
        Command::Summary {
            player,
            session,
            json,
        } => {
            let store = open_store(&args.db)?;
            match session_summary(&store, &player, &session) {
                Ok(summary) if json => print_json(&summary)?,
                Ok(summary) => print_summary(&player, &session, &summary),
                Err(AnalyticsError::NoData { player_id }) => no_data(&player_id),
                Err(e) => return Err(e).context("failed to read session summary"),
            }
        }
        Command::Sessions { limit } => {
            let store = open_store(&args.db)?;
            let sessions = store.list_sessions(limit).context("failed to list sessions")?;
            if sessions.is_empty() {
                println!("No data stored yet. Ingest a CSV file to get started.");
                return Ok(());
            }
            println!(
                "{:<12} {:<20} {:>8} {:>10} {:>10}  Period",
                "Player", "Session", "Records", "Avg m/s", "Max m/s"
            );
            for s in &sessions {
                println!(
                    "{:<12} {:<20} {:>8} {:>10.2} {:>10.2}  {} - {}",
                    s.player_id,
                    s.session_id,
                    s.summary.count,
                    s.summary.avg_speed,
                    s.summary.max_speed,
                    s.summary.first_ts.format("%d/%m/%Y %H:%M"),
                    s.summary.last_ts.format("%d/%m/%Y %H:%M"),
                );
            }
            println!();
            println!(
                "Total records in database: {}",
                store.count().context("failed to count records")?
            );
        }
        Command::Generate {
            out,
            tag,
            minutes,
            hz,
            seed,
        } => {
            let config = GeneratorConfig {
                tag_id: tag,
                duration_secs: minutes * 60.0,
                sample_hz: hz,
                seed,
            };
            let rows = generator::write_csv(&out, &config, chrono::Utc::now())?;
            println!("Wrote {} rows to {}", rows, out.display());
        }
        Command::Zone { x, y } => {
            let zone = zone::classify(x, y);
            println!("({:.2}, {:.2}) -> {} [{}]", x, y, zone, zone.as_str());
        }
    }

    Ok(())
}

fn open_store(path: &std::path::Path) -> Result<SqliteStore> {
    SqliteStore::open(path).with_context(|| format!("could not open store {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to serialize output")?
    );
    Ok(())
}

fn no_data(player_id: &str) {
    println!("No data available for player {}.", player_id);
}

fn print_ingest(report: &IngestReport) {
    println!("{}", "-".repeat(40));
    if report.success {
        println!("  Processed successfully");
    } else {
        println!("  Processing failed");
    }
    println!("  Inserted:     {}", report.records_inserted);
    println!("  Skipped:      {}", report.rows_skipped);
    println!("  Errors:       {}", report.errors.len());
    for e in &report.errors {
        println!("    - {}", e);
    }
    println!("{}", "-".repeat(40));
}

fn print_stats(report: &PlayerReport) {
    let stats = &report.stats;
    println!();
    println!("{}", "=".repeat(40));
    println!("  Player {}", report.player_id);
    println!("{}", "=".repeat(40));
    println!("  Max Speed:     {:.2} m/s", stats.max_speed);
    println!("  Distance:      {:.1} m", stats.total_distance);
    println!("  Sprints:       {}", stats.sprint_count);
    println!("  Avg Intensity: {:.1}%", stats.avg_intensity);
    println!("  Records:       {}", stats.records_count);
    println!("  Heatmap:       {} points", report.heatmap.len());
    println!("{}", "-".repeat(40));
}

fn print_summary(player_id: &str, session_id: &str, summary: &SessionSummary) {
    println!();
    println!("{}", "-".repeat(40));
    println!("  Player {} / session {}", player_id, session_id);
    println!("  Records:       {}", summary.count);
    println!("  Avg Speed:     {:.2} m/s", summary.avg_speed);
    println!("  Max Speed:     {:.2} m/s", summary.max_speed);
    println!("  Avg Intensity: {:.1}%", summary.avg_intensity);
    println!(
        "  Period:        {} - {}",
        summary.first_ts.format("%d/%m/%Y"),
        summary.last_ts.format("%d/%m/%Y")
    );
    println!("{}", "-".repeat(40));
}
