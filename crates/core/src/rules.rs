//! Redemption rules for applying a coupon to a basket.
//!
//! Every function here is pure. The checks run in a fixed order: eligibility, then the
//! remainder check, then the mutation. Only [`redeem`] should be used by callers; it hands
//! back a new basket so a rejected application never touches the caller's copy.

use rust_decimal::Decimal;

use crate::domain::basket::Basket;
use crate::domain::coupon::Coupon;
use crate::errors::CouponError;

pub fn check_eligibility(coupon: &Coupon, basket: &Basket) -> Result<(), CouponError> {
    if coupon.min_basket_value > basket.value {
        return Err(CouponError::InsufficientBasketValue(coupon.min_basket_value));
    }

    Ok(())
}

/// Basket value left after stacking the coupon discount on top of what is already applied.
pub fn compute_remainder(coupon: &Coupon, basket: &Basket) -> Decimal {
    basket.value - (coupon.discount + basket.applied_discount)
}

pub fn validate_discount(remainder: Decimal) -> Result<(), CouponError> {
    if remainder < Decimal::ZERO {
        return Err(CouponError::InvalidDiscount(remainder));
    }

    Ok(())
}

/// Infallible; callers must have passed both checks first.
pub fn apply_discount(basket: &mut Basket, discount: Decimal) {
    basket.application_successful = true;
    basket.applied_discount += discount;
}

pub fn redeem(coupon: &Coupon, basket: &Basket) -> Result<Basket, CouponError> {
    check_eligibility(coupon, basket)?;
    validate_discount(compute_remainder(coupon, basket))?;

    let mut redeemed = basket.clone();
    apply_discount(&mut redeemed, coupon.discount);
    Ok(redeemed)
}
