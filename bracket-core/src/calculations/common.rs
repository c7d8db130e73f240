//! Shared arithmetic for bracket calculations.
//!
//! Amounts are carried at full `Decimal` precision through every step and
//! only rounded with [`round_half_up`] when a result is presented.

use rust_decimal::{Decimal, RoundingStrategy};

/// Rounds a decimal value to exactly two decimal places using half-up rounding.
///
/// Values at exactly 0.005 are rounded away from zero.
///
/// # Examples
///
/// ```
/// use rust_decimal_macros::dec;
/// use bracket_core::calculations::common::round_half_up;
///
/// assert_eq!(round_half_up(dec!(123.454)), dec!(123.45));
/// assert_eq!(round_half_up(dec!(123.455)), dec!(123.46));
/// assert_eq!(round_half_up(dec!(-123.455)), dec!(-123.46));
/// ```
pub fn round_half_up(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Applies a percentage rate (e.g. `32.5` for 32.5%) to an amount.
///
/// The rate is scaled first so the product never exceeds `amount` for rates
/// up to 100.
///
/// ```
/// use rust_decimal_macros::dec;
/// use bracket_core::calculations::common::apply_rate;
///
/// assert_eq!(apply_rate(dec!(75000), dec!(32.5)), dec!(24375));
/// ```
pub fn apply_rate(
    amount: Decimal,
    rate_percent: Decimal,
) -> Decimal {
    amount * (rate_percent / Decimal::ONE_HUNDRED)
}
