//! Bracket arithmetic: the ceiling-tax pipeline run at creation time and the
//! progressive calculator run at query time.

pub mod common;
pub mod precompute;
pub mod progressive;

pub use precompute::precompute;
pub use progressive::{BracketSlice, ProgressiveTaxCalculator, TaxResult, calculate};
