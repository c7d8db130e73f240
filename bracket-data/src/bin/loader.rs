use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use bracket_core::ConfigLifecycleManager;
use bracket_data::{BracketCsvLoader, ConfigMetadata};
use bracket_db_sqlite::SqliteRepository;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Load a bracket set from a CSV file into a new tax configuration.
///
/// The CSV file should have the following columns:
/// - order: position of the bracket, lowest first
/// - lower: inclusive lower bound
/// - upper: exclusive upper bound (empty for the open-ended top bracket)
/// - rate: marginal rate as a percentage (e.g., 32.5)
/// - color_ref: DEFAULT or LEVEL_1..LEVEL_5 (empty for DEFAULT)
#[derive(Parser, Debug)]
#[command(name = "bracket-loader")]
#[command(about, long_about = None)]
struct Args {
    /// Path to the CSV file containing bracket data
    #[arg(short, long)]
    file: PathBuf,

    /// SQLite database path or URL; created if missing
    #[arg(short, long, default_value = "brackets.db")]
    database: String,

    /// Run database migrations before loading data
    #[arg(short, long, default_value_t = false)]
    migrate: bool,

    /// Run seed files from the specified directory after migrations
    #[arg(short, long)]
    seeds: Option<PathBuf>,

    /// First calendar year of the financial year (e.g., 2024 for 2024-25)
    #[arg(long)]
    fy_start: i32,

    /// Last calendar year of the financial year; defaults to fy-start + 1
    #[arg(long)]
    fy_end: Option<i32>,

    /// Version label stored with the configuration
    #[arg(short = 'V', long, default_value = "1.0.0")]
    version: String,

    /// Date the rates were last updated; defaults to today
    #[arg(long)]
    last_updated: Option<String>,

    /// Make the new configuration the active one
    #[arg(short, long, default_value_t = false)]
    activate: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::from("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .without_time()
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let repo = SqliteRepository::new(&args.database)
        .await
        .with_context(|| format!("Failed to connect to database: {}", args.database))?;

    if args.migrate {
        info!("Running migrations...");
        repo.run_migrations()
            .await
            .context("Failed to run migrations")?;
    }

    if let Some(seeds_dir) = &args.seeds {
        info!("Running seeds from: {}", seeds_dir.display());
        repo.run_seeds(seeds_dir)
            .await
            .with_context(|| format!("Failed to run seeds from: {}", seeds_dir.display()))?;
    }

    let file = File::open(&args.file)
        .with_context(|| format!("Failed to open: {}", args.file.display()))?;

    let records = BracketCsvLoader::parse(file)
        .with_context(|| format!("Failed to parse CSV: {}", args.file.display()))?;
    info!("Parsed {} brackets from {}", records.len(), args.file.display());

    let metadata = ConfigMetadata {
        financial_year_start: args.fy_start,
        financial_year_end: args.fy_end.unwrap_or(args.fy_start + 1),
        version: args.version,
        last_updated: args
            .last_updated
            .unwrap_or_else(|| chrono::Local::now().format("%Y-%m-%d").to_string()),
        activate: args.activate,
    };

    let mut manager = ConfigLifecycleManager::new(Arc::new(repo));
    let config = BracketCsvLoader::load(&mut manager, metadata, &records)
        .await
        .context("Failed to load brackets into database")?;

    println!(
        "Created tax configuration {} ({}) with {} brackets{}.",
        config.id,
        config.label(),
        config.brackets.len(),
        if config.is_active { ", now active" } else { "" }
    );

    Ok(())
}
