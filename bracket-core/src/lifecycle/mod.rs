//! Configuration lifecycle: create, activate and delete tax configurations
//! while keeping at most one active.

mod error;
#[cfg(test)]
mod fake_repository;
mod manager;

pub use error::{BatchOperation, LifecycleError, PartialFailure, SubFailure, SubRecord};
pub use manager::{ConfigLifecycleManager, DeleteOutcome};
