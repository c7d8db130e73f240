use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use bracket_core::calculations::common::round_half_up;
use bracket_core::db::{DbConfig, RepositoryRegistry};
use bracket_core::{ConfigLifecycleManager, DeleteOutcome, TaxConfig, TaxResult};
use bracket_data::{BracketCsvLoader, ConfigMetadata};
use bracket_db_sqlite::SqliteRepositoryFactory;
use rust_decimal::Decimal;
use tracing::debug;

/// Registry with every backend this binary was built with.
pub fn build_registry() -> RepositoryRegistry {
    let mut registry = RepositoryRegistry::new();
    registry.register(Box::new(SqliteRepositoryFactory));
    registry
}

pub async fn open_manager(config: &DbConfig) -> Result<ConfigLifecycleManager> {
    debug!("connecting to {} backend", config.backend);
    let repo = build_registry()
        .create(config)
        .await
        .with_context(|| format!("Failed to open {} database '{}'", config.backend, config.connection_string))?;
    Ok(ConfigLifecycleManager::new(Arc::from(repo)))
}

fn money(amount: Decimal) -> String {
    format!("{:.2}", round_half_up(amount))
}

fn percent(rate: Decimal) -> String {
    format!("{:.2}%", round_half_up(rate))
}

fn upper_label(upper: Option<i64>) -> String {
    upper.map_or_else(|| "and over".to_string(), |u| u.to_string())
}

pub fn format_result(
    config: &TaxConfig,
    result: &TaxResult,
) -> String {
    let result = result.rounded();
    let mut out = String::new();
    let _ = writeln!(out, "Configuration:  {} (id {})", config.label(), config.id);
    let _ = writeln!(out, "Income:         {}", money(result.income));
    let _ = writeln!(out, "Tax:            {}", money(result.total_tax));
    let _ = writeln!(out, "Net income:     {}", money(result.net_income));
    let _ = writeln!(out, "Effective rate: {}", percent(result.effective_rate));
    let _ = writeln!(out, "Marginal rate:  {}", percent(result.marginal_rate));
    for slice in &result.breakdown {
        let _ = writeln!(
            out,
            "  bracket {:>2} at {:>7}: {:>12} taxed {:>12}",
            slice.order,
            percent(slice.rate),
            money(slice.taxable_amount),
            money(slice.tax)
        );
    }
    out
}

pub fn format_history(configs: &[TaxConfig]) -> String {
    if configs.is_empty() {
        return "No tax configurations.\n".to_string();
    }
    let mut out = String::new();
    for config in configs {
        let _ = writeln!(
            out,
            "{} {:>4}  {:<20} {} brackets, updated {}",
            if config.is_active { "*" } else { " " },
            config.id,
            config.label(),
            config.brackets.len(),
            config.last_updated
        );
    }
    out
}

pub fn format_config(config: &TaxConfig) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} (id {}){}",
        config.label(),
        config.id,
        if config.is_active { " [active]" } else { "" }
    );
    let _ = writeln!(out, "Last updated: {}", config.last_updated);
    for bracket in &config.brackets {
        let ceiling = bracket
            .max_tax_amount
            .amount()
            .map_or_else(|| "-".to_string(), money);
        let _ = writeln!(
            out,
            "  {:>2}  {:>10} - {:<10} {:>7}  max tax {:>12}  {}",
            bracket.order,
            bracket.lower,
            upper_label(bracket.upper.bounded()),
            percent(bracket.rate),
            ceiling,
            bracket.color_ref.palette()
        );
    }
    out
}

/// Tax on `income` under configuration `config_id`, or the active one.
pub async fn calculate(
    manager: &ConfigLifecycleManager,
    income: Decimal,
    config_id: Option<i64>,
) -> Result<String> {
    let config = match config_id {
        Some(id) => manager.load_config(id).await?,
        None => match manager.load_active_config().await? {
            Some(config) => config,
            None => bail!("No active tax configuration; pass --config or activate one"),
        },
    };
    let result = ConfigLifecycleManager::calculate_for(&config, income)?;
    Ok(format_result(&config, &result))
}

pub async fn history(manager: &mut ConfigLifecycleManager) -> Result<String> {
    let configs = manager.fetch_history().await?;
    Ok(format_history(configs))
}

pub async fn show(
    manager: &ConfigLifecycleManager,
    id: i64,
) -> Result<String> {
    Ok(format_config(&manager.load_config(id).await?))
}

pub async fn create(
    manager: &mut ConfigLifecycleManager,
    file: &Path,
    metadata: ConfigMetadata,
) -> Result<String> {
    let reader = std::fs::File::open(file)
        .with_context(|| format!("Failed to open: {}", file.display()))?;
    let records = BracketCsvLoader::parse(reader)
        .with_context(|| format!("Failed to parse CSV: {}", file.display()))?;
    let config = BracketCsvLoader::load(manager, metadata, &records).await?;
    Ok(format!("Created:\n{}", format_config(&config)))
}

pub async fn activate(
    manager: &mut ConfigLifecycleManager,
    id: i64,
) -> Result<String> {
    manager.activate_config(id).await?;
    let label = manager
        .history()
        .iter()
        .find(|c| c.id == id)
        .map_or_else(|| format!("configuration {id}"), TaxConfig::label);
    Ok(format!("Activated {label}.\n"))
}

pub async fn delete<F>(
    manager: &mut ConfigLifecycleManager,
    id: i64,
    confirm: F,
) -> Result<String>
where
    F: FnOnce(&TaxConfig) -> bool,
{
    match manager.delete_config(id, confirm).await? {
        DeleteOutcome::Deleted { brackets_removed } => Ok(format!(
            "Deleted configuration {id} and {brackets_removed} brackets.\n"
        )),
        DeleteOutcome::Cancelled => Ok("Deletion cancelled.\n".to_string()),
    }
}
