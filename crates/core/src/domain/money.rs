use rust_decimal::Decimal;

/// Largest number of digits allowed before the decimal point.
pub const MAX_INTEGER_DIGITS: u32 = 8;
/// Largest number of digits allowed after the decimal point.
pub const MAX_FRACTION_DIGITS: u32 = 2;

pub const DIGITS_MESSAGE: &str = "Maximum 8 integer digits and 2 decimal places";

/// Whether `amount` fits the `8.2` money shape accepted at the boundary.
pub fn within_money_bounds(amount: &Decimal) -> bool {
    if amount.scale() > MAX_FRACTION_DIGITS {
        return false;
    }

    let integer_limit = Decimal::from(10_u64.pow(MAX_INTEGER_DIGITS));
    amount.trunc().abs() < integer_limit
}
