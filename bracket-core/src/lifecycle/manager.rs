use std::sync::Arc;

use futures::future::join_all;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use super::error::{BatchOperation, LifecycleError, PartialFailure, SubFailure, SubRecord};
use crate::calculations::{TaxResult, calculate, precompute};
use crate::db::{RepositoryError, TaxConfigRepository};
use crate::models::{BracketInput, CreateTaxConfigInput, NewTaxConfig, TaxConfig, TaxConfigRecord};
use crate::validation::{validate_brackets, validate_config_input};

/// Result of [`ConfigLifecycleManager::delete_config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted { brackets_removed: usize },
    /// The confirmation callback declined; nothing was deleted.
    Cancelled,
}

/// Per-record results of one concurrent batch.
struct BatchResults<T> {
    committed: Vec<T>,
    failures: Vec<SubFailure>,
    errors: Vec<RepositoryError>,
}

impl<T> BatchResults<T> {
    fn collect(results: impl IntoIterator<Item = (SubRecord, Result<T, RepositoryError>)>) -> Self {
        let mut batch = Self {
            committed: Vec::new(),
            failures: Vec::new(),
            errors: Vec::new(),
        };
        for (record, result) in results {
            match result {
                Ok(value) => batch.committed.push(value),
                Err(err) => {
                    batch.failures.push(SubFailure {
                        record,
                        message: err.to_string(),
                    });
                    batch.errors.push(err);
                }
            }
        }
        batch
    }

    fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// `PartialFailure` once anything committed, otherwise a plain transport error.
    fn into_error(
        self,
        operation: BatchOperation,
        config_id: i64,
        succeeded: Vec<i64>,
    ) -> LifecycleError {
        if succeeded.is_empty() {
            LifecycleError::transport_from_all(&self.errors)
        } else {
            PartialFailure {
                operation,
                config_id,
                succeeded,
                failures: self.failures,
            }
            .into()
        }
    }
}

/// Owns the in-memory view of every tax configuration and sequences all
/// multi-record writes against the repository.
///
/// At most one configuration is active after any sequential call. Concurrent
/// activations from different actors may interleave; the last write per
/// configuration wins.
pub struct ConfigLifecycleManager {
    repo: Arc<dyn TaxConfigRepository>,
    history: Vec<TaxConfig>,
    history_error: Option<String>,
}

impl ConfigLifecycleManager {
    pub fn new(repo: Arc<dyn TaxConfigRepository>) -> Self {
        Self {
            repo,
            history: Vec::new(),
            history_error: None,
        }
    }

    /// Configurations as of the last refresh, in repository order.
    pub fn history(&self) -> &[TaxConfig] {
        &self.history
    }

    /// Message of the last failed refresh, cleared by the next successful one.
    pub fn history_error(&self) -> Option<&str> {
        self.history_error.as_deref()
    }

    /// The active entry of the in-memory view.
    pub fn active_config(&self) -> Option<&TaxConfig> {
        self.history.iter().find(|config| config.is_active)
    }

    /// Reloads every configuration with its brackets.
    ///
    /// On failure the error is also kept in [`history_error`](Self::history_error)
    /// and the previous view is left as it was.
    pub async fn fetch_history(&mut self) -> Result<&[TaxConfig], LifecycleError> {
        match self.load_all().await {
            Ok(configs) => {
                debug!(count = configs.len(), "Fetched tax configuration history");
                self.history = configs;
                self.history_error = None;
                Ok(&self.history)
            }
            Err(err) => {
                warn!(error = %err, "Failed to fetch tax configuration history");
                self.history_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    pub async fn load_config(&self, id: i64) -> Result<TaxConfig, LifecycleError> {
        let record = self
            .repo
            .get_config(id)
            .await
            .map_err(|e| LifecycleError::from_repository(id, e))?;
        self.attach_brackets(record).await
    }

    /// First active configuration in storage, if any.
    pub async fn load_active_config(&self) -> Result<Option<TaxConfig>, LifecycleError> {
        let active = self.repo.list_configs(Some(true)).await?;
        if active.len() > 1 {
            let ids: Vec<i64> = active.iter().map(|c| c.id).collect();
            warn!(?ids, "More than one active tax configuration in storage");
        }
        match active.into_iter().next() {
            Some(record) => Ok(Some(self.attach_brackets(record).await?)),
            None => Ok(None),
        }
    }

    /// Calculates against `config` after re-validating its stored brackets.
    pub fn calculate_for(
        config: &TaxConfig,
        income: Decimal,
    ) -> Result<TaxResult, LifecycleError> {
        let inputs: Vec<BracketInput> = config.brackets.iter().map(BracketInput::from).collect();
        validate_brackets(&inputs)?;
        Ok(calculate(income, &config.brackets))
    }

    /// Calculates against the active configuration in storage, `None` when no
    /// configuration is active.
    pub async fn calculate_with_active(
        &self,
        income: Decimal,
    ) -> Result<Option<TaxResult>, LifecycleError> {
        match self.load_active_config().await? {
            Some(config) => Self::calculate_for(&config, income).map(Some),
            None => Ok(None),
        }
    }

    /// Validates, precomputes and stores a configuration with its brackets.
    ///
    /// The record is always written inactive. When `input.is_active` is
    /// `Some(true)` the activation sequence runs after every bracket is stored.
    /// A bracket failure leaves the configuration in storage with the brackets
    /// that did commit and reports them in a [`PartialFailure`].
    pub async fn create_with_brackets(
        &mut self,
        input: CreateTaxConfigInput,
    ) -> Result<TaxConfig, LifecycleError> {
        validate_config_input(&input)?;
        let brackets = precompute(&input.brackets);

        let record = self
            .repo
            .create_config(&NewTaxConfig {
                financial_year_start: input.financial_year_start,
                financial_year_end: input.financial_year_end,
                version: input.version.clone(),
                last_updated: input.last_updated.clone(),
                is_active: false,
            })
            .await?;
        let config_id = record.id;
        debug!(config_id, brackets = brackets.len(), "Created tax configuration record");

        let repo = Arc::clone(&self.repo);
        let results = join_all(
            brackets
                .iter()
                .map(|bracket| repo.create_bracket(config_id, bracket)),
        )
        .await;
        let batch = BatchResults::collect(
            brackets
                .iter()
                .map(|bracket| SubRecord::BracketOrder(bracket.order))
                .zip(results),
        );

        if !batch.is_complete() {
            let stored: Vec<i64> = batch.committed.iter().map(|b| b.id).collect();
            warn!(
                config_id,
                stored = stored.len(),
                failed = batch.failures.len(),
                "Tax configuration left with incomplete brackets"
            );
            let err = PartialFailure {
                operation: BatchOperation::CreateBrackets,
                config_id,
                succeeded: stored,
                failures: batch.failures,
            };
            self.restore_view().await;
            return Err(err.into());
        }

        let config = TaxConfig::from_record(record, batch.committed);
        let position = self.history.partition_point(|c| {
            (c.financial_year_start, c.id) > (config.financial_year_start, config.id)
        });
        self.history.insert(position, config.clone());
        info!(config_id, label = %config.label(), "Created tax configuration");

        if input.is_active == Some(true) {
            self.activate_config(config_id).await?;
            return Ok(self
                .history
                .iter()
                .find(|c| c.id == config_id)
                .cloned()
                .unwrap_or(TaxConfig {
                    is_active: true,
                    ..config
                }));
        }
        Ok(config)
    }

    /// Makes `id` the only active configuration.
    ///
    /// Only configurations whose flag differs from the target state are
    /// updated, so repeating the call is harmless. Any failure discards the
    /// optimistic view and reloads from storage.
    pub async fn activate_config(&mut self, id: i64) -> Result<(), LifecycleError> {
        for config in &mut self.history {
            config.is_active = config.id == id;
        }

        if let Err(err) = self.apply_activation(id).await {
            warn!(config_id = id, error = %err, "Activation failed, reloading from storage");
            self.restore_view().await;
            return Err(err);
        }

        let refreshed = self.fetch_history().await.map(|_| ());
        if let Err(err) = refreshed {
            self.history.clear();
            return Err(err);
        }
        info!(config_id = id, "Activated tax configuration");
        Ok(())
    }

    /// Deletes a configuration after `confirm` approves it.
    ///
    /// Brackets go first, all at once. The configuration record is removed
    /// only when every bracket delete succeeded.
    pub async fn delete_config<F>(
        &mut self,
        id: i64,
        confirm: F,
    ) -> Result<DeleteOutcome, LifecycleError>
    where
        F: FnOnce(&TaxConfig) -> bool,
    {
        let config = self.load_config(id).await?;
        if !confirm(&config) {
            info!(config_id = id, "Deletion cancelled");
            return Ok(DeleteOutcome::Cancelled);
        }

        let repo = Arc::clone(&self.repo);
        let results = join_all(
            config
                .brackets
                .iter()
                .map(|bracket| repo.delete_bracket(bracket.id)),
        )
        .await;
        let total = config.brackets.len();
        let batch = BatchResults::collect(
            config
                .brackets
                .iter()
                .zip(results)
                .map(|(bracket, result)| (SubRecord::Bracket(bracket.id), result.map(|()| bracket.id))),
        );

        if !batch.is_complete() {
            warn!(
                config_id = id,
                deleted = batch.committed.len(),
                failed = batch.failures.len(),
                "Bracket deletion incomplete, keeping tax configuration"
            );
            let deleted = batch.committed.clone();
            let err = batch.into_error(BatchOperation::DeleteBrackets, id, deleted);
            self.restore_view().await;
            return Err(err);
        }
        debug!(config_id = id, brackets = total, "Deleted brackets");

        if let Err(err) = self.repo.delete_config(id).await {
            let err = LifecycleError::from_repository(id, err);
            warn!(config_id = id, error = %err, "Failed to delete tax configuration record");
            self.restore_view().await;
            return Err(err);
        }

        self.history.retain(|c| c.id != id);
        info!(config_id = id, brackets = total, "Deleted tax configuration");
        Ok(DeleteOutcome::Deleted {
            brackets_removed: total,
        })
    }

    async fn apply_activation(&self, id: i64) -> Result<(), LifecycleError> {
        let configs = self.repo.list_configs(None).await?;
        if !configs.iter().any(|c| c.id == id) {
            return Err(LifecycleError::NotFound(id));
        }

        let changes: Vec<(i64, bool)> = configs
            .iter()
            .filter(|c| c.is_active != (c.id == id))
            .map(|c| (c.id, c.id == id))
            .collect();
        if changes.is_empty() {
            debug!(config_id = id, "Active flags already consistent");
            return Ok(());
        }

        let results = join_all(
            changes
                .iter()
                .map(|&(config_id, is_active)| self.repo.set_config_active(config_id, is_active)),
        )
        .await;
        let batch = BatchResults::collect(
            changes
                .iter()
                .zip(results)
                .map(|(&(config_id, _), result)| (SubRecord::Config(config_id), result.map(|()| config_id))),
        );
        if batch.is_complete() {
            debug!(config_id = id, updated = changes.len(), "Updated active flags");
            return Ok(());
        }

        let updated = batch.committed.clone();
        Err(batch.into_error(BatchOperation::Activate, id, updated))
    }

    /// Reloads the view after a failed write; clears it if storage is unreachable.
    async fn restore_view(&mut self) {
        if self.fetch_history().await.is_err() {
            warn!("Clearing tax configuration view after failed reload");
            self.history.clear();
        }
    }

    async fn load_all(&self) -> Result<Vec<TaxConfig>, LifecycleError> {
        let records = self.repo.list_configs(None).await?;
        let results = join_all(
            records
                .iter()
                .map(|record| self.repo.list_brackets(record.id)),
        )
        .await;

        let mut configs = Vec::with_capacity(records.len());
        let mut errors = Vec::new();
        for (record, result) in records.into_iter().zip(results) {
            match result {
                Ok(brackets) => configs.push(TaxConfig::from_record(record, brackets)),
                Err(err) => errors.push(err),
            }
        }
        if !errors.is_empty() {
            return Err(LifecycleError::transport_from_all(&errors));
        }
        Ok(configs)
    }

    async fn attach_brackets(&self, record: TaxConfigRecord) -> Result<TaxConfig, LifecycleError> {
        let brackets = self.repo.list_brackets(record.id).await?;
        Ok(TaxConfig::from_record(record, brackets))
    }
}
