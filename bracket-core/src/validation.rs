//! Structural checks for bracket sets and configuration requests.
//!
//! A valid bracket set, taken in `order` sequence, starts at any non-negative
//! lower bound, has each `lower` equal to the previous `upper`, and ends with
//! exactly one open-ended bracket. Validation never touches storage.

use std::collections::HashSet;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::{BracketInput, CreateTaxConfigInput, UpperBound};

/// A malformed bracket sequence or configuration request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("at least one bracket is required")]
    NoBrackets,

    #[error("bracket order {0} is used more than once")]
    DuplicateOrder(i32),

    #[error("bracket {order}: lower bound {lower} is negative")]
    NegativeLowerBound { order: i32, lower: i64 },

    #[error("bracket {order}: rate {rate} is outside 0..=100")]
    RateOutOfRange { order: i32, rate: Decimal },

    #[error("bracket {order}: upper bound {upper} must be above lower bound {lower}")]
    EmptyRange { order: i32, lower: i64, upper: i64 },

    #[error("no open-ended bracket; the last bracket must have no upper bound")]
    NoOpenEndedBracket,

    #[error("{0} open-ended brackets; only the last bracket may have no upper bound")]
    MultipleOpenEndedBrackets(usize),

    #[error("bracket {order} is open-ended but is not the last bracket")]
    OpenEndedNotLast { order: i32 },

    #[error("bracket {order}: gap between previous upper bound {expected} and lower bound {found}")]
    Gap { order: i32, expected: i64, found: i64 },

    #[error("bracket {order}: lower bound {found} overlaps previous upper bound {expected}")]
    Overlap { order: i32, expected: i64, found: i64 },

    #[error("financial year ends ({end}) before it starts ({start})")]
    FinancialYearRange { start: i32, end: i32 },
}

/// Validates a caller-supplied bracket set.
///
/// Brackets are examined in ascending `order`; the input slice may be in any
/// order. The first failing rule is reported.
pub fn validate_brackets(brackets: &[BracketInput]) -> Result<(), ValidationError> {
    if brackets.is_empty() {
        return Err(ValidationError::NoBrackets);
    }

    let mut seen = HashSet::with_capacity(brackets.len());
    for bracket in brackets {
        if !seen.insert(bracket.order) {
            return Err(ValidationError::DuplicateOrder(bracket.order));
        }
        check_bracket(bracket)?;
    }

    let mut sorted: Vec<&BracketInput> = brackets.iter().collect();
    sorted.sort_by_key(|b| b.order);

    let open_ended: Vec<&&BracketInput> =
        sorted.iter().filter(|b| b.upper.is_open_ended()).collect();
    match open_ended.as_slice() {
        [] => return Err(ValidationError::NoOpenEndedBracket),
        [only] => {
            let last = sorted[sorted.len() - 1];
            if only.order != last.order {
                return Err(ValidationError::OpenEndedNotLast { order: only.order });
            }
        }
        many => return Err(ValidationError::MultipleOpenEndedBrackets(many.len())),
    }

    for pair in sorted.windows(2) {
        let (prev, current) = (pair[0], pair[1]);
        // Only the last bracket is open-ended at this point.
        let Some(expected) = prev.upper.bounded() else {
            return Err(ValidationError::OpenEndedNotLast { order: prev.order });
        };
        if current.lower > expected {
            return Err(ValidationError::Gap {
                order: current.order,
                expected,
                found: current.lower,
            });
        }
        if current.lower < expected {
            return Err(ValidationError::Overlap {
                order: current.order,
                expected,
                found: current.lower,
            });
        }
    }

    Ok(())
}

/// Validates a configuration request: its financial year and its brackets.
pub fn validate_config_input(input: &CreateTaxConfigInput) -> Result<(), ValidationError> {
    if input.financial_year_end < input.financial_year_start {
        return Err(ValidationError::FinancialYearRange {
            start: input.financial_year_start,
            end: input.financial_year_end,
        });
    }
    validate_brackets(&input.brackets)
}

fn check_bracket(bracket: &BracketInput) -> Result<(), ValidationError> {
    if bracket.lower < 0 {
        return Err(ValidationError::NegativeLowerBound {
            order: bracket.order,
            lower: bracket.lower,
        });
    }
    if bracket.rate < Decimal::ZERO || bracket.rate > Decimal::ONE_HUNDRED {
        return Err(ValidationError::RateOutOfRange {
            order: bracket.order,
            rate: bracket.rate,
        });
    }
    match bracket.upper {
        UpperBound::Bounded(upper) if upper <= bracket.lower => Err(ValidationError::EmptyRange {
            order: bracket.order,
            lower: bracket.lower,
            upper,
        }),
        _ => Ok(()),
    }
}
