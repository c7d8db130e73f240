use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::bracket::{BracketInput, TaxBracket};

/// A stored configuration row, without its brackets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxConfigRecord {
    pub id: i64,
    pub financial_year_start: i32,
    pub financial_year_end: i32,
    /// Free-form label; never compared or ordered.
    pub version: String,
    pub last_updated: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A configuration together with the brackets it owns, sorted by `order`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxConfig {
    pub id: i64,
    pub financial_year_start: i32,
    pub financial_year_end: i32,
    pub version: String,
    pub last_updated: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub brackets: Vec<TaxBracket>,
}

impl TaxConfig {
    pub fn from_record(
        record: TaxConfigRecord,
        mut brackets: Vec<TaxBracket>,
    ) -> Self {
        brackets.sort_by_key(|b| (b.order, b.lower));
        Self {
            id: record.id,
            financial_year_start: record.financial_year_start,
            financial_year_end: record.financial_year_end,
            version: record.version,
            last_updated: record.last_updated,
            is_active: record.is_active,
            created_at: record.created_at,
            updated_at: record.updated_at,
            brackets,
        }
    }

    /// Display label such as `2024-2025 v1.0.0`.
    pub fn label(&self) -> String {
        format!(
            "{}-{} v{}",
            self.financial_year_start, self.financial_year_end, self.version
        )
    }
}

/// For inserting a configuration row (no id or timestamps)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTaxConfig {
    pub financial_year_start: i32,
    pub financial_year_end: i32,
    pub version: String,
    pub last_updated: String,
    pub is_active: bool,
}

/// Caller request for a new configuration and its brackets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTaxConfigInput {
    pub financial_year_start: i32,
    pub financial_year_end: i32,
    pub version: String,
    pub last_updated: String,
    #[serde(default)]
    pub is_active: Option<bool>,
    pub brackets: Vec<BracketInput>,
}
