//! Order pricing arithmetic.
//!
//! All amounts are [`Decimal`] in the store currency's standard unit (e.g.
//! dollars). Totals shown to customers and charged by the payment gateway are
//! externally observed, so the surcharge rounding below must not change.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Fixed order surcharge rate (2%).
pub const SURCHARGE_RATE: Decimal = Decimal::from_parts(2, 0, 0, false, 2);

/// Minor units per standard unit (cents per dollar).
const MINOR_UNITS: Decimal = Decimal::ONE_HUNDRED;

/// Surcharge owed on a base amount: `floor(base * 0.02)`.
///
/// Truncates toward negative infinity, never rounds.
#[must_use]
pub fn surcharge(base: Decimal) -> Decimal {
    (base * SURCHARGE_RATE).floor()
}

/// Total order amount: `base + floor(base * 0.02)`.
///
/// ```
/// use greencart_core::apply_surcharge;
/// use rust_decimal::Decimal;
///
/// assert_eq!(apply_surcharge(Decimal::from(1000)), Decimal::from(1020));
/// assert_eq!(apply_surcharge(Decimal::from(999)), Decimal::from(1018));
/// ```
#[must_use]
pub fn apply_surcharge(base: Decimal) -> Decimal {
    base + surcharge(base)
}

/// Per-unit amount displayed during hosted checkout, in minor units.
///
/// Computed as `floor(unit_price * 1.02 * 100)`. Returns `None` when the
/// result does not fit in an `i64`.
#[must_use]
pub fn checkout_unit_amount(unit_price: Decimal) -> Option<i64> {
    (unit_price * (Decimal::ONE + SURCHARGE_RATE) * MINOR_UNITS)
        .floor()
        .to_i64()
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_surcharge_rate_is_two_percent() {
        assert_eq!(SURCHARGE_RATE, dec!(0.02));
    }

    #[test]
    fn test_apply_surcharge_exact_thousand() {
        assert_eq!(apply_surcharge(dec!(1000)), dec!(1020));
    }

    #[test]
    fn test_apply_surcharge_floors() {
        // 999 * 0.02 = 19.98 -> 19
        assert_eq!(surcharge(dec!(999)), dec!(19));
        assert_eq!(apply_surcharge(dec!(999)), dec!(1018));
    }

    #[test]
    fn test_apply_surcharge_small_amounts() {
        assert_eq!(apply_surcharge(dec!(300)), dec!(306));
        assert_eq!(apply_surcharge(dec!(49)), dec!(49));
        assert_eq!(apply_surcharge(Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_apply_surcharge_fractional_base() {
        // 125.50 * 0.02 = 2.51 -> 2
        assert_eq!(apply_surcharge(dec!(125.50)), dec!(127.50));
    }

    #[test]
    fn test_checkout_unit_amount() {
        assert_eq!(checkout_unit_amount(dec!(100)), Some(10_200));
        // 9.99 * 1.02 * 100 = 1018.98 -> 1018
        assert_eq!(checkout_unit_amount(dec!(9.99)), Some(1018));
        assert_eq!(checkout_unit_amount(Decimal::ZERO), Some(0));
    }
}
