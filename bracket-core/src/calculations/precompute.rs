//! Ceiling-tax precomputation run once when a configuration is created.
//!
//! Each bracket stores the cumulative tax owed at its own upper bound so front
//! ends can show "max tax" per tier without recalculating. Brackets are taken
//! in ascending `order`:
//!
//! | position            | stored `max_tax_amount`                                 |
//! |---------------------|---------------------------------------------------------|
//! | first               | `Amount(0)`                                             |
//! | open-ended          | `OpenEnded`                                             |
//! | any other           | previous amount + (upper - previous upper) × rate / 100 |
//!
//! The first-position rule takes precedence, so a lone open-ended bracket
//! stores `Amount(0)`.

use rust_decimal::Decimal;

use crate::calculations::common::apply_rate;
use crate::models::{BracketInput, MaxTaxAmount, NewTaxBracket, UpperBound};

/// Sorts brackets by `order` and fills in `max_tax_amount` for each.
///
/// Intended for sets that already passed
/// [`validate_brackets`](crate::validation::validate_brackets). On malformed
/// input the previous amount and bound fall back to zero and the current
/// lower bound rather than failing.
pub fn precompute(brackets: &[BracketInput]) -> Vec<NewTaxBracket> {
    let mut sorted: Vec<&BracketInput> = brackets.iter().collect();
    sorted.sort_by_key(|b| b.order);

    let mut computed: Vec<NewTaxBracket> = Vec::with_capacity(sorted.len());
    for bracket in sorted {
        let max_tax_amount = match (computed.last(), bracket.upper) {
            (None, _) => MaxTaxAmount::Amount(Decimal::ZERO),
            (Some(_), UpperBound::OpenEnded) => MaxTaxAmount::OpenEnded,
            (Some(prev), UpperBound::Bounded(upper)) => {
                let prev_amount = prev.max_tax_amount.amount().unwrap_or(Decimal::ZERO);
                let prev_upper = prev.upper.bounded().unwrap_or(bracket.lower);
                let width = Decimal::from(upper - prev_upper);
                MaxTaxAmount::Amount(prev_amount + apply_rate(width, bracket.rate))
            }
        };

        computed.push(NewTaxBracket {
            order: bracket.order,
            lower: bracket.lower,
            upper: bracket.upper,
            rate: bracket.rate,
            color_ref: bracket.color_ref,
            max_tax_amount,
        });
    }
    computed
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::models::ColorRef;

    fn bracket(
        order: i32,
        lower: i64,
        upper: Option<i64>,
        rate: Decimal,
    ) -> BracketInput {
        BracketInput {
            order,
            lower,
            upper: upper.into(),
            rate,
            color_ref: ColorRef::Default,
        }
    }

    fn resident_brackets() -> Vec<BracketInput> {
        vec![
            bracket(1, 0, Some(18200), dec!(0)),
            bracket(2, 18200, Some(45000), dec!(19)),
            bracket(3, 45000, Some(120000), dec!(32.5)),
            bracket(4, 120000, Some(180000), dec!(37)),
            bracket(5, 180000, None, dec!(45)),
        ]
    }

    fn amounts(brackets: &[NewTaxBracket]) -> Vec<MaxTaxAmount> {
        brackets.iter().map(|b| b.max_tax_amount).collect()
    }

    #[test]
    fn computes_cumulative_ceiling_tax() {
        let computed = precompute(&resident_brackets());

        assert_eq!(
            amounts(&computed),
            vec![
                MaxTaxAmount::Amount(dec!(0)),
                MaxTaxAmount::Amount(dec!(5092)),
                MaxTaxAmount::Amount(dec!(29467)),
                MaxTaxAmount::Amount(dec!(51667)),
                MaxTaxAmount::OpenEnded,
            ]
        );
    }

    #[test]
    fn first_bracket_stores_zero_even_when_taxed() {
        let brackets = vec![
            bracket(1, 0, Some(10000), dec!(10)),
            bracket(2, 10000, None, dec!(20)),
        ];

        let computed = precompute(&brackets);

        assert_eq!(computed[0].max_tax_amount, MaxTaxAmount::Amount(dec!(0)));
        assert_eq!(computed[1].max_tax_amount, MaxTaxAmount::OpenEnded);
    }

    #[test]
    fn lone_open_ended_bracket_stores_zero() {
        let computed = precompute(&[bracket(1, 0, None, dec!(30))]);

        assert_eq!(amounts(&computed), vec![MaxTaxAmount::Amount(dec!(0))]);
    }

    #[test]
    fn sorts_by_order_before_computing() {
        let mut shuffled = resident_brackets();
        shuffled.swap(0, 3);
        shuffled.swap(1, 4);

        let computed = precompute(&shuffled);

        let orders: Vec<i32> = computed.iter().map(|b| b.order).collect();
        assert_eq!(orders, vec![1, 2, 3, 4, 5]);
        assert_eq!(computed, precompute(&resident_brackets()));
    }

    #[test]
    fn keeps_fractional_amounts_unrounded() {
        let brackets = vec![
            bracket(1, 0, Some(1), dec!(0)),
            bracket(2, 1, Some(2), dec!(33.333)),
            bracket(3, 2, None, dec!(40)),
        ];

        let computed = precompute(&brackets);

        assert_eq!(computed[1].max_tax_amount, MaxTaxAmount::Amount(dec!(0.33333)));
    }

    #[test]
    fn carries_display_fields_through() {
        let mut brackets = resident_brackets();
        brackets[2].color_ref = ColorRef::Level3;

        let computed = precompute(&brackets);

        assert_eq!(computed[2].color_ref, ColorRef::Level3);
        assert_eq!(computed[2].lower, 45000);
        assert_eq!(computed[2].upper, UpperBound::Bounded(120000));
        assert_eq!(computed[2].rate, dec!(32.5));
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(precompute(&[]).is_empty());
    }
}
