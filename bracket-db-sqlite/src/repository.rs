use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bracket_core::{
    ColorRef, NewTaxBracket, NewTaxConfig, RepositoryError, TaxBracket, TaxConfigRecord,
    TaxConfigRepository, UpperBound,
};
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use tracing::debug;

use crate::decimal::{decimal_to_text, get_decimal, get_optional_decimal};

const CONFIG_COLUMNS: &str = "id, financial_year_start, financial_year_end, version, last_updated,
            is_active, created_at, updated_at";

const BRACKET_COLUMNS: &str = "id, tax_config_id, bracket_order, lower_bound, upper_bound, rate,
            color_ref, max_tax_amount, created_at";

pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Opens `database_url`, which may be a bare file path, `:memory:` or a
    /// `sqlite:` URL. Missing database files are created.
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database location: {}", database_url))?
            .create_if_missing(true)
            .foreign_keys(true);

        // Each in-memory connection is its own database.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to connect to database: {}", database_url))?;
        Ok(Self { pool })
    }

    pub async fn new_with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    /// Load and execute all SQL seed files from the specified directory.
    /// Files are executed in alphabetical order by filename.
    pub async fn run_seeds(
        &self,
        seeds_dir: &Path,
    ) -> Result<()> {
        let mut entries: Vec<_> = std::fs::read_dir(seeds_dir)
            .with_context(|| format!("Failed to read seeds directory '{}'", seeds_dir.display()))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "sql"))
            .collect();

        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let path = entry.path();
            let sql = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read seed file '{}'", path.display()))?;

            sqlx::raw_sql(&sql)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to execute seed file '{}'", path.display()))?;
            debug!(file = %path.display(), "Applied seed file");
        }

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn db_err(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Database(e.to_string())
}

fn row_to_config(row: &SqliteRow) -> Result<TaxConfigRecord, RepositoryError> {
    Ok(TaxConfigRecord {
        id: row.try_get("id").map_err(db_err)?,
        financial_year_start: row.try_get("financial_year_start").map_err(db_err)?,
        financial_year_end: row.try_get("financial_year_end").map_err(db_err)?,
        version: row.try_get("version").map_err(db_err)?,
        last_updated: row.try_get("last_updated").map_err(db_err)?,
        is_active: row.try_get("is_active").map_err(db_err)?,
        created_at: row
            .try_get::<DateTime<Utc>, _>("created_at")
            .map_err(|e| RepositoryError::Database(format!("Failed to get created_at: {}", e)))?,
        updated_at: row
            .try_get::<DateTime<Utc>, _>("updated_at")
            .map_err(|e| RepositoryError::Database(format!("Failed to get updated_at: {}", e)))?,
    })
}

fn row_to_bracket(row: &SqliteRow) -> Result<TaxBracket, RepositoryError> {
    let color_ref: String = row.try_get("color_ref").map_err(db_err)?;
    let color_ref = ColorRef::parse(&color_ref)
        .ok_or_else(|| RepositoryError::Database(format!("Invalid color ref: {}", color_ref)))?;
    let upper: Option<i64> = row.try_get("upper_bound").map_err(db_err)?;

    Ok(TaxBracket {
        id: row.try_get("id").map_err(db_err)?,
        tax_config_id: row.try_get("tax_config_id").map_err(db_err)?,
        order: row.try_get("bracket_order").map_err(db_err)?,
        lower: row.try_get("lower_bound").map_err(db_err)?,
        upper: UpperBound::from(upper),
        rate: get_decimal(row, "rate")?,
        color_ref,
        max_tax_amount: get_optional_decimal(row, "max_tax_amount")?.into(),
        created_at: row
            .try_get::<DateTime<Utc>, _>("created_at")
            .map_err(|e| RepositoryError::Database(format!("Failed to get created_at: {}", e)))?,
    })
}

#[async_trait]
impl TaxConfigRepository for SqliteRepository {
    async fn list_configs(
        &self,
        is_active: Option<bool>,
    ) -> Result<Vec<TaxConfigRecord>, RepositoryError> {
        const ORDERING: &str = "ORDER BY financial_year_start DESC, id DESC";

        let rows = match is_active {
            Some(flag) => {
                sqlx::query(&format!(
                    "SELECT {} FROM tax_config WHERE is_active = ? {}",
                    CONFIG_COLUMNS, ORDERING
                ))
                .bind(flag)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(&format!("SELECT {} FROM tax_config {}", CONFIG_COLUMNS, ORDERING))
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(db_err)?;

        rows.iter().map(row_to_config).collect()
    }

    async fn get_config(
        &self,
        id: i64,
    ) -> Result<TaxConfigRecord, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {} FROM tax_config WHERE id = ?", CONFIG_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or(RepositoryError::NotFound)?;

        row_to_config(&row)
    }

    async fn create_config(
        &self,
        config: &NewTaxConfig,
    ) -> Result<TaxConfigRecord, RepositoryError> {
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO tax_config (
                financial_year_start, financial_year_end, version, last_updated,
                is_active, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(config.financial_year_start)
        .bind(config.financial_year_end)
        .bind(&config.version)
        .bind(&config.last_updated)
        .bind(config.is_active)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        let id = result.last_insert_rowid();
        debug!(id, "Inserted tax_config row");
        self.get_config(id).await
    }

    async fn set_config_active(
        &self,
        id: i64,
        is_active: bool,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE tax_config SET is_active = ?, updated_at = ? WHERE id = ?")
            .bind(is_active)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn delete_config(
        &self,
        id: i64,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM tax_config WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn list_brackets(
        &self,
        tax_config_id: i64,
    ) -> Result<Vec<TaxBracket>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM tax_bracket WHERE tax_config_id = ? ORDER BY bracket_order, lower_bound",
            BRACKET_COLUMNS
        ))
        .bind(tax_config_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(row_to_bracket).collect()
    }

    async fn create_bracket(
        &self,
        tax_config_id: i64,
        bracket: &NewTaxBracket,
    ) -> Result<TaxBracket, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO tax_bracket (
                tax_config_id, bracket_order, lower_bound, upper_bound, rate,
                color_ref, max_tax_amount, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(tax_config_id)
        .bind(bracket.order)
        .bind(bracket.lower)
        .bind(bracket.upper.bounded())
        .bind(decimal_to_text(bracket.rate))
        .bind(bracket.color_ref.as_str())
        .bind(bracket.max_tax_amount.amount().map(decimal_to_text))
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        let id = result.last_insert_rowid();
        let row = sqlx::query(&format!("SELECT {} FROM tax_bracket WHERE id = ?", BRACKET_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or(RepositoryError::NotFound)?;

        row_to_bracket(&row)
    }

    async fn delete_bracket(
        &self,
        id: i64,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM tax_bracket WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }
}
