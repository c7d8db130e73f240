use async_trait::async_trait;
use thiserror::Error;

use crate::models::{NewTaxBracket, NewTaxConfig, TaxBracket, TaxConfigRecord};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("Record not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Storage collaborator for tax configurations and their brackets.
///
/// Every method is a single request against the store; none of them enforce
/// the single-active-configuration rule; that sequencing lives in the
/// lifecycle manager.
#[async_trait]
pub trait TaxConfigRepository: Send + Sync {
    // Configurations
    async fn list_configs(
        &self,
        is_active: Option<bool>,
    ) -> Result<Vec<TaxConfigRecord>, RepositoryError>;

    async fn get_config(&self, id: i64) -> Result<TaxConfigRecord, RepositoryError>;

    async fn create_config(&self, config: &NewTaxConfig) -> Result<TaxConfigRecord, RepositoryError>;

    async fn set_config_active(&self, id: i64, is_active: bool) -> Result<(), RepositoryError>;

    async fn delete_config(&self, id: i64) -> Result<(), RepositoryError>;

    // Brackets
    async fn list_brackets(&self, tax_config_id: i64) -> Result<Vec<TaxBracket>, RepositoryError>;

    async fn create_bracket(
        &self,
        tax_config_id: i64,
        bracket: &NewTaxBracket,
    ) -> Result<TaxBracket, RepositoryError>;

    async fn delete_bracket(&self, id: i64) -> Result<(), RepositoryError>;
}
