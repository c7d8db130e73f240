use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::Context;
use bracket_cli::{app, logging, settings::Settings};
use bracket_core::TaxConfig;
use bracket_data::ConfigMetadata;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::debug;

// ─── CLI definition ──────────────────────────────────────────────────────────

/// Progressive income tax calculator with versioned bracket configurations.
#[derive(Debug, Parser)]
#[command(name = "brackets", about, long_about = None)]
struct Cli {
    /// Settings file; defaults to ./brackets.toml when present.
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Database backend to use.
    #[arg(long, global = true)]
    backend: Option<String>,

    /// Database connection string.
    /// For SQLite this is a file path (e.g. `brackets.db`) or `:memory:`.
    #[arg(long, global = true)]
    db: Option<String>,

    /// Log level or filter directive (RUST_LOG still wins).
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Also append log records to this file.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Calculate tax on an income.
    Calculate {
        #[arg(long)]
        income: Decimal,

        /// Configuration id; defaults to the active configuration.
        #[arg(long)]
        config: Option<i64>,
    },
    /// List every configuration; the active one is marked with `*`.
    History,
    /// Show one configuration and its brackets.
    Show { id: i64 },
    /// Create a configuration from a bracket CSV file.
    Create {
        #[arg(short, long)]
        file: PathBuf,

        #[arg(long)]
        fy_start: i32,

        /// Defaults to fy-start + 1.
        #[arg(long)]
        fy_end: Option<i32>,

        #[arg(short = 'V', long, default_value = "1.0.0")]
        version: String,

        /// Defaults to today.
        #[arg(long)]
        last_updated: Option<String>,

        /// Make the new configuration the active one.
        #[arg(short, long, default_value_t = false)]
        activate: bool,
    },
    /// Make a configuration the only active one.
    Activate { id: i64 },
    /// Delete a configuration and its brackets.
    Delete {
        id: i64,

        /// Skip the confirmation prompt.
        #[arg(short, long, default_value_t = false)]
        yes: bool,
    },
}

// ─── confirmation ────────────────────────────────────────────────────────────

fn confirm_on_stdin(config: &TaxConfig) -> bool {
    eprint!(
        "Delete {} (id {}) with {} brackets{}? [y/N] ",
        config.label(),
        config.id,
        config.brackets.len(),
        if config.is_active { ", currently ACTIVE" } else { "" }
    );
    if io::stderr().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    match io::stdin().lock().read_line(&mut answer) {
        Ok(_) => matches!(answer.trim(), "y" | "Y" | "yes"),
        Err(_) => false,
    }
}

// ─── entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load(cli.settings.as_deref())?;
    let log_file = settings.log_file(cli.log_file);
    logging::init_logging(&settings.log_level(cli.log_level), log_file.as_deref())?;
    match &settings.source {
        Some(path) => debug!(path = %path.display(), "Loaded settings"),
        None => debug!("No settings file, using defaults"),
    }

    let db_config = settings.db_config(cli.backend, cli.db);
    let mut manager = app::open_manager(&db_config).await?;

    let output = match cli.command {
        Command::Calculate { income, config } => app::calculate(&manager, income, config).await?,
        Command::History => app::history(&mut manager).await?,
        Command::Show { id } => app::show(&manager, id).await?,
        Command::Create {
            file,
            fy_start,
            fy_end,
            version,
            last_updated,
            activate,
        } => {
            let metadata = ConfigMetadata {
                financial_year_start: fy_start,
                financial_year_end: fy_end.unwrap_or(fy_start + 1),
                version,
                last_updated: last_updated
                    .unwrap_or_else(|| chrono::Local::now().format("%Y-%m-%d").to_string()),
                activate,
            };
            app::create(&mut manager, &file, metadata)
                .await
                .with_context(|| format!("Failed to create configuration from {}", file.display()))?
        }
        Command::Activate { id } => app::activate(&mut manager, id).await?,
        Command::Delete { id, yes } => {
            if yes {
                app::delete(&mut manager, id, |_| true).await?
            } else {
                app::delete(&mut manager, id, confirm_on_stdin).await?
            }
        }
    };

    print!("{output}");
    Ok(())
}
