pub mod calculations;
pub mod db;
pub mod lifecycle;
pub mod models;
pub mod validation;

pub use calculations::{TaxResult, calculate, precompute};
pub use db::repository::{RepositoryError, TaxConfigRepository};
pub use lifecycle::{ConfigLifecycleManager, DeleteOutcome, LifecycleError};
pub use models::*;
pub use validation::ValidationError;
