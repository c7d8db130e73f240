//! Progressive (marginal) income tax over an ordered bracket set.
//!
//! Income is consumed bracket by bracket: each bracket taxes a slice no wider
//! than `upper - lower` at its own rate, until no income remains. The last
//! bracket that taxed a non-empty slice is the marginal bracket.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use bracket_core::calculations::calculate;
//! use bracket_core::{BracketInput, ColorRef, UpperBound};
//!
//! let band = |order, lower, upper: Option<i64>, rate| BracketInput {
//!     order,
//!     lower,
//!     upper: UpperBound::from(upper),
//!     rate,
//!     color_ref: ColorRef::Default,
//! };
//! let brackets = vec![
//!     band(1, 0, Some(18200), dec!(0)),
//!     band(2, 18200, Some(45000), dec!(19)),
//!     band(3, 45000, Some(120000), dec!(32.5)),
//!     band(4, 120000, Some(180000), dec!(37)),
//!     band(5, 180000, None, dec!(45)),
//! ];
//!
//! let result = calculate(dec!(50000), &brackets);
//!
//! assert_eq!(result.total_tax, dec!(6042));
//! assert_eq!(result.net_income, dec!(43958));
//! assert_eq!(result.marginal_rate, dec!(19));
//! assert_eq!(result.rounded().effective_rate, dec!(12.08));
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calculations::common::{apply_rate, round_half_up};
use crate::models::{RateBand, UpperBound};

/// Tax owed within one bracket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketSlice {
    pub order: i32,
    pub rate: Decimal,
    /// Portion of income taxed by this bracket.
    pub taxable_amount: Decimal,
    pub tax: Decimal,
}

/// Outcome of a progressive tax calculation.
///
/// All amounts are full precision; call [`TaxResult::rounded`] for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxResult {
    pub income: Decimal,
    pub total_tax: Decimal,
    pub net_income: Decimal,
    /// Total tax as a percentage of income.
    pub effective_rate: Decimal,
    /// Rate of the bracket containing the top of income.
    pub marginal_rate: Decimal,
    pub marginal_order: Option<i32>,
    pub breakdown: Vec<BracketSlice>,
}

impl TaxResult {
    /// The result for income that attracts no tax at all.
    pub fn untaxed(income: Decimal) -> Self {
        Self {
            income,
            total_tax: Decimal::ZERO,
            net_income: income,
            effective_rate: Decimal::ZERO,
            marginal_rate: Decimal::ZERO,
            marginal_order: None,
            breakdown: Vec::new(),
        }
    }

    /// Copy with every money and rate figure rounded half-up to 2 dp.
    pub fn rounded(&self) -> Self {
        Self {
            income: round_half_up(self.income),
            total_tax: round_half_up(self.total_tax),
            net_income: round_half_up(self.net_income),
            effective_rate: round_half_up(self.effective_rate),
            marginal_rate: round_half_up(self.marginal_rate),
            marginal_order: self.marginal_order,
            breakdown: self
                .breakdown
                .iter()
                .map(|slice| BracketSlice {
                    order: slice.order,
                    rate: slice.rate,
                    taxable_amount: round_half_up(slice.taxable_amount),
                    tax: round_half_up(slice.tax),
                })
                .collect(),
        }
    }
}

/// Stateless calculator over a borrowed bracket set.
///
/// Brackets are sorted by `order`, ties broken by `lower`, so unsorted input
/// is tolerated.
#[derive(Debug, Clone)]
pub struct ProgressiveTaxCalculator<'a, B: RateBand> {
    brackets: Vec<&'a B>,
}

impl<'a, B: RateBand> ProgressiveTaxCalculator<'a, B> {
    pub fn new(brackets: &'a [B]) -> Self {
        let mut sorted: Vec<&'a B> = brackets.iter().collect();
        sorted.sort_by_key(|b| (b.order(), b.lower()));
        Self { brackets: sorted }
    }

    /// Computes tax, net income, effective and marginal rates for `income`.
    ///
    /// Non-positive income and an empty bracket set both produce
    /// [`TaxResult::untaxed`].
    pub fn calculate(
        &self,
        income: Decimal,
    ) -> TaxResult {
        if income <= Decimal::ZERO || self.brackets.is_empty() {
            return TaxResult::untaxed(income);
        }

        let mut remaining = income;
        let mut total_tax = Decimal::ZERO;
        let mut marginal: Option<&B> = None;
        let mut breakdown = Vec::new();

        for bracket in &self.brackets {
            if remaining <= Decimal::ZERO {
                break;
            }

            let slice = match bracket.upper() {
                UpperBound::Bounded(upper) => {
                    remaining.min(Decimal::from(upper) - Decimal::from(bracket.lower()))
                }
                UpperBound::OpenEnded => remaining,
            };
            if slice <= Decimal::ZERO {
                continue;
            }

            let tax = apply_rate(slice, bracket.rate());
            total_tax += tax;
            remaining -= slice;
            marginal = Some(*bracket);
            breakdown.push(BracketSlice {
                order: bracket.order(),
                rate: bracket.rate(),
                taxable_amount: slice,
                tax,
            });
        }

        TaxResult {
            income,
            total_tax,
            net_income: income - total_tax,
            effective_rate: total_tax / income * Decimal::ONE_HUNDRED,
            marginal_rate: marginal.map_or(Decimal::ZERO, |b| b.rate()),
            marginal_order: marginal.map(|b| b.order()),
            breakdown,
        }
    }
}

/// Convenience wrapper around [`ProgressiveTaxCalculator`].
pub fn calculate<B: RateBand>(
    income: Decimal,
    brackets: &[B],
) -> TaxResult {
    ProgressiveTaxCalculator::new(brackets).calculate(income)
}
