use std::fmt;

use thiserror::Error;

use crate::db::RepositoryError;
use crate::validation::ValidationError;

/// Multi-record step a [`PartialFailure`] happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOperation {
    CreateBrackets,
    DeleteBrackets,
    Activate,
}

impl fmt::Display for BatchOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::CreateBrackets => "creating brackets",
            Self::DeleteBrackets => "deleting brackets",
            Self::Activate => "updating active flags",
        })
    }
}

/// Sub-record a batch step was working on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubRecord {
    /// Bracket not yet stored, identified by its order.
    BracketOrder(i32),
    Bracket(i64),
    Config(i64),
}

impl fmt::Display for SubRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BracketOrder(order) => write!(f, "bracket order {order}"),
            Self::Bracket(id) => write!(f, "bracket {id}"),
            Self::Config(id) => write!(f, "config {id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubFailure {
    pub record: SubRecord,
    pub message: String,
}

/// Some, but not all, sub-operations of a batch committed.
///
/// `succeeded` holds the ids of committed records (brackets for create and
/// delete, configurations for activation) so the caller can clean up or retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialFailure {
    pub operation: BatchOperation,
    pub config_id: i64,
    pub succeeded: Vec<i64>,
    pub failures: Vec<SubFailure>,
}

impl PartialFailure {
    /// All collaborator messages joined with ", ".
    pub fn joined_messages(&self) -> String {
        self.failures
            .iter()
            .map(|failure| format!("{}: {}", failure.record, failure.message))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for PartialFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "partial failure {} for tax configuration {} ({} succeeded, {} failed): {}",
            self.operation,
            self.config_id,
            self.succeeded.len(),
            self.failures.len(),
            self.joined_messages()
        )
    }
}

impl std::error::Error for PartialFailure {}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("invalid tax configuration: {0}")]
    Validation(#[from] ValidationError),

    #[error("tax configuration {0} not found")]
    NotFound(i64),

    #[error(transparent)]
    PartialFailure(#[from] PartialFailure),

    #[error("transport error: {0}")]
    Transport(String),
}

impl LifecycleError {
    /// Maps a repository error raised while working on configuration `id`.
    pub(crate) fn from_repository(
        id: i64,
        err: RepositoryError,
    ) -> Self {
        match err {
            RepositoryError::NotFound => Self::NotFound(id),
            other => Self::Transport(other.to_string()),
        }
    }

    /// Joins the messages of several failed requests into one transport error.
    pub(crate) fn transport_from_all(errors: &[RepositoryError]) -> Self {
        Self::Transport(
            errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
        )
    }
}

impl From<RepositoryError> for LifecycleError {
    fn from(err: RepositoryError) -> Self {
        Self::Transport(err.to_string())
    }
}
