//! In-memory repository double that records every call and can be told to
//! fail specific requests.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::db::{RepositoryError, TaxConfigRepository};
use crate::models::{NewTaxBracket, NewTaxConfig, TaxBracket, TaxConfigRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    ListConfigs(Option<bool>),
    GetConfig(i64),
    CreateConfig,
    SetActive(i64, bool),
    DeleteConfig(i64),
    ListBrackets(i64),
    CreateBracket(i64),
    DeleteBracket(i64),
}

impl Call {
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Self::CreateConfig
                | Self::SetActive(..)
                | Self::DeleteConfig(_)
                | Self::CreateBracket(_)
                | Self::DeleteBracket(_)
        )
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, Self::DeleteConfig(_) | Self::DeleteBracket(_))
    }
}

#[derive(Default)]
struct State {
    configs: Vec<TaxConfigRecord>,
    brackets: Vec<TaxBracket>,
    next_id: i64,
    calls: Vec<Call>,
    fail_list_configs: bool,
    fail_create_config: bool,
    fail_bracket_orders: HashSet<i32>,
    fail_set_active: HashSet<i64>,
    fail_delete_brackets: HashSet<i64>,
    fail_delete_config: bool,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct FakeRepository {
    state: Mutex<State>,
}

impl FakeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("fake repository lock poisoned")
    }

    /// Stores a configuration directly, bypassing call recording.
    pub fn seed_config(&self, financial_year_start: i32, is_active: bool) -> i64 {
        let mut state = self.state();
        let id = state.next_id();
        let now = Utc::now();
        state.configs.push(TaxConfigRecord {
            id,
            financial_year_start,
            financial_year_end: financial_year_start + 1,
            version: "1.0.0".to_string(),
            last_updated: format!("{financial_year_start}-07-01"),
            is_active,
            created_at: now,
            updated_at: now,
        });
        id
    }

    /// Stores a bracket directly, bypassing call recording.
    pub fn seed_bracket(&self, tax_config_id: i64, bracket: &NewTaxBracket) -> i64 {
        let mut state = self.state();
        let id = state.next_id();
        state.brackets.push(stored_bracket(id, tax_config_id, bracket));
        id
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn active_ids(&self) -> Vec<i64> {
        self.state()
            .configs
            .iter()
            .filter(|c| c.is_active)
            .map(|c| c.id)
            .collect()
    }

    pub fn config_ids(&self) -> Vec<i64> {
        self.state().configs.iter().map(|c| c.id).collect()
    }

    pub fn bracket_ids(&self, tax_config_id: i64) -> Vec<i64> {
        self.state()
            .brackets
            .iter()
            .filter(|b| b.tax_config_id == tax_config_id)
            .map(|b| b.id)
            .collect()
    }

    pub fn fail_list_configs(&self, fail: bool) {
        self.state().fail_list_configs = fail;
    }

    pub fn fail_create_config(&self) {
        self.state().fail_create_config = true;
    }

    pub fn fail_create_bracket(&self, order: i32) {
        self.state().fail_bracket_orders.insert(order);
    }

    pub fn fail_set_active(&self, id: i64) {
        self.state().fail_set_active.insert(id);
    }

    pub fn fail_delete_bracket(&self, id: i64) {
        self.state().fail_delete_brackets.insert(id);
    }

    pub fn fail_delete_config(&self) {
        self.state().fail_delete_config = true;
    }
}

fn stored_bracket(id: i64, tax_config_id: i64, bracket: &NewTaxBracket) -> TaxBracket {
    TaxBracket {
        id,
        tax_config_id,
        order: bracket.order,
        lower: bracket.lower,
        upper: bracket.upper,
        rate: bracket.rate,
        color_ref: bracket.color_ref,
        max_tax_amount: bracket.max_tax_amount,
        created_at: Utc::now(),
    }
}

fn injected(what: &str) -> RepositoryError {
    RepositoryError::Database(format!("injected failure: {what}"))
}

#[async_trait]
impl TaxConfigRepository for FakeRepository {
    async fn list_configs(
        &self,
        is_active: Option<bool>,
    ) -> Result<Vec<TaxConfigRecord>, RepositoryError> {
        let mut state = self.state();
        state.calls.push(Call::ListConfigs(is_active));
        if state.fail_list_configs {
            return Err(RepositoryError::Connection("store unreachable".to_string()));
        }
        let mut configs: Vec<TaxConfigRecord> = state
            .configs
            .iter()
            .filter(|c| is_active.is_none_or(|flag| c.is_active == flag))
            .cloned()
            .collect();
        // Same order as the SQLite backend: newest year, then newest id.
        configs.sort_by_key(|c| std::cmp::Reverse((c.financial_year_start, c.id)));
        Ok(configs)
    }

    async fn get_config(&self, id: i64) -> Result<TaxConfigRecord, RepositoryError> {
        let mut state = self.state();
        state.calls.push(Call::GetConfig(id));
        state
            .configs
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn create_config(&self, config: &NewTaxConfig) -> Result<TaxConfigRecord, RepositoryError> {
        let mut state = self.state();
        state.calls.push(Call::CreateConfig);
        if state.fail_create_config {
            return Err(injected("create config"));
        }
        let id = state.next_id();
        let now = Utc::now();
        let record = TaxConfigRecord {
            id,
            financial_year_start: config.financial_year_start,
            financial_year_end: config.financial_year_end,
            version: config.version.clone(),
            last_updated: config.last_updated.clone(),
            is_active: config.is_active,
            created_at: now,
            updated_at: now,
        };
        state.configs.push(record.clone());
        Ok(record)
    }

    async fn set_config_active(&self, id: i64, is_active: bool) -> Result<(), RepositoryError> {
        let mut state = self.state();
        state.calls.push(Call::SetActive(id, is_active));
        if state.fail_set_active.contains(&id) {
            return Err(injected(&format!("set active on {id}")));
        }
        let config = state
            .configs
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(RepositoryError::NotFound)?;
        config.is_active = is_active;
        config.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_config(&self, id: i64) -> Result<(), RepositoryError> {
        let mut state = self.state();
        state.calls.push(Call::DeleteConfig(id));
        if state.fail_delete_config {
            return Err(injected("delete config"));
        }
        if state.brackets.iter().any(|b| b.tax_config_id == id) {
            return Err(RepositoryError::Database(
                "FOREIGN KEY constraint failed".to_string(),
            ));
        }
        let before = state.configs.len();
        state.configs.retain(|c| c.id != id);
        if state.configs.len() == before {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn list_brackets(&self, tax_config_id: i64) -> Result<Vec<TaxBracket>, RepositoryError> {
        let mut state = self.state();
        state.calls.push(Call::ListBrackets(tax_config_id));
        Ok(state
            .brackets
            .iter()
            .filter(|b| b.tax_config_id == tax_config_id)
            .cloned()
            .collect())
    }

    async fn create_bracket(
        &self,
        tax_config_id: i64,
        bracket: &NewTaxBracket,
    ) -> Result<TaxBracket, RepositoryError> {
        let mut state = self.state();
        state.calls.push(Call::CreateBracket(tax_config_id));
        if state.fail_bracket_orders.contains(&bracket.order) {
            return Err(injected(&format!("create bracket {}", bracket.order)));
        }
        let id = state.next_id();
        let stored = stored_bracket(id, tax_config_id, bracket);
        state.brackets.push(stored.clone());
        Ok(stored)
    }

    async fn delete_bracket(&self, id: i64) -> Result<(), RepositoryError> {
        let mut state = self.state();
        state.calls.push(Call::DeleteBracket(id));
        if state.fail_delete_brackets.contains(&id) {
            return Err(injected(&format!("delete bracket {id}")));
        }
        let before = state.brackets.len();
        state.brackets.retain(|b| b.id != id);
        if state.brackets.len() == before {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
