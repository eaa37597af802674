//! Dietdesk operator CLI
//!
//! Usage:
//!   dietdesk init
//!   dietdesk register-doctor <name> <email> [--tier <tier>]
//!   dietdesk usage <doctor-id>
//!   dietdesk reset-usage [--force]
//!   dietdesk metrics --weight <kg> [--height <cm>] [--body-fat <%>] [--activity <level>] [--goal <goal>] [--rate <kg>]
//!
//! Configuration comes from the DIETDESK_* environment variables; `--db`
//! overrides the database path.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use dietdesk_core::config::PracticeConfig;
use dietdesk_core::nutrition::{self, MetricInput, Normalizer};
use dietdesk_core::{records, telemetry, Practice};
use tracing::info;

#[derive(Parser)]
#[command(name = "dietdesk")]
#[command(version)]
#[command(about = "Operate a dietdesk practice database", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Database file (defaults to DIETDESK_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and schema if missing
    Init,

    /// Register a doctor account
    RegisterDoctor {
        name: String,
        email: String,

        /// Subscription tier (essentiel, premium, pro)
        #[arg(short, long, default_value = "essentiel")]
        tier: String,
    },

    /// Print a doctor's usage for the current month
    Usage {
        doctor_id: String,
    },

    /// Start a new usage period when the month has changed
    ResetUsage {
        /// Zero every counter even within the same month
        #[arg(long)]
        force: bool,
    },

    /// Compute nutrition metrics without touching the database
    Metrics {
        /// Weight in kg
        #[arg(long)]
        weight: f64,

        /// Height in cm
        #[arg(long)]
        height: Option<f64>,

        /// Body fat percentage
        #[arg(long)]
        body_fat: Option<f64>,

        /// Activity level (e.g. sedentary, modéré, very-active)
        #[arg(long)]
        activity: Option<String>,

        /// Goal (e.g. lose, prise de masse, maintain)
        #[arg(long)]
        goal: Option<String>,

        /// Weekly weight change in kg
        #[arg(long)]
        rate: Option<f64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = PracticeConfig::from_env().context("Invalid configuration")?;
    telemetry::init(&config.log_filter);

    let db_path = cli.db.unwrap_or(config.db_path);

    match cli.command {
        Commands::Init => {
            open(&db_path)?;
            println!("Database ready at {}", db_path.display());
        }

        Commands::RegisterDoctor { name, email, tier } => {
            let practice = open(&db_path)?;
            let doctor = practice
                .register_doctor(&name, &email, &tier)
                .context("Failed to register doctor")?;
            println!("{}", serde_json::to_string_pretty(&doctor)?);
        }

        Commands::Usage { doctor_id } => {
            let practice = open(&db_path)?;
            let usage = practice
                .usage_report(&doctor_id)
                .with_context(|| format!("Failed to read usage for {}", doctor_id))?;
            println!("{}", serde_json::to_string_pretty(&usage)?);
        }

        Commands::ResetUsage { force } => {
            let practice = open(&db_path)?;
            if force {
                let changed = practice.reset_monthly_usage()?;
                println!("Reset {} counters", changed);
            } else {
                match practice.roll_over_usage(Utc::now())? {
                    Some(changed) => println!("New usage period, reset {} counters", changed),
                    None => println!("Usage period unchanged"),
                }
            }
        }

        Commands::Metrics {
            weight,
            height,
            body_fat,
            activity,
            goal,
            rate,
        } => {
            let normalizer = Normalizer::new();
            let input = MetricInput {
                weight_kg: weight,
                height_cm: height,
                body_fat_percent: body_fat,
                activity_level: normalizer.optional_activity_level(activity.as_deref())?,
                goal: normalizer.optional_goal(goal.as_deref())?,
                weekly_rate_kg: rate,
            };
            records::validate_measurements(&input)?;
            let metrics = nutrition::compute(&input);
            println!("{}", serde_json::to_string_pretty(&metrics)?);
        }
    }

    Ok(())
}

fn open(path: &Path) -> Result<Practice> {
    info!(path = %path.display(), "Opening database");
    Practice::open(path).with_context(|| format!("Failed to open {}", path.display()))
}
