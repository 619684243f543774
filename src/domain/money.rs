//! Money helpers
//!
//! Currency values are decimals with 2-digit precision at the boundary.
//! The 0.01 tolerance absorbs rounding drift when comparing against zero.

use rust_decimal::{Decimal, RoundingStrategy};

/// Amounts within this distance of zero are considered settled.
pub const ALLOCATION_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Round a currency value to 2 decimal places, half away from zero.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Check whether a signed amount is zero within the allocation tolerance.
pub fn is_settled(value: Decimal) -> bool {
    value.abs() < ALLOCATION_TOLERANCE
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_tolerance_value() {
        assert_eq!(ALLOCATION_TOLERANCE, dec!(0.01));
    }

    #[test]
    fn test_round_money_half_away_from_zero() {
        assert_eq!(round_money(dec!(10.005)), dec!(10.01));
        assert_eq!(round_money(dec!(-10.005)), dec!(-10.01));
        assert_eq!(round_money(dec!(10.004)), dec!(10.00));
    }

    #[test]
    fn test_is_settled() {
        assert!(is_settled(dec!(0)));
        assert!(is_settled(dec!(0.009)));
        assert!(is_settled(dec!(-0.009)));
        assert!(!is_settled(dec!(0.01)));
        assert!(!is_settled(dec!(-0.01)));
    }
}
