use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::money::{within_money_bounds, DIGITS_MESSAGE};
use crate::errors::ValidationErrors;

pub const COUPON_CODE_LENGTH: usize = 8;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CouponCode(pub String);

impl CouponCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Exactly eight ASCII letters or digits.
    pub fn is_well_formed(&self) -> bool {
        self.0.len() == COUPON_CODE_LENGTH && self.0.chars().all(|ch| ch.is_ascii_alphanumeric())
    }

    pub(crate) fn validate_into(&self, errors: &mut ValidationErrors) {
        if !self.is_well_formed() {
            errors.add("code", "Code must be exactly 8 alphanumeric characters");
        }
    }
}

impl fmt::Display for CouponCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    pub code: CouponCode,
    pub discount: Decimal,
    pub min_basket_value: Decimal,
}

/// Input for coupon creation. Nothing reaches the store until [`NewCoupon::validate`] passes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCoupon {
    pub code: CouponCode,
    pub discount: Decimal,
    pub min_basket_value: Decimal,
}

impl NewCoupon {
    pub fn new(code: impl Into<String>, discount: Decimal, min_basket_value: Decimal) -> Self {
        Self { code: CouponCode::new(code), discount, min_basket_value }
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        self.code.validate_into(&mut errors);

        if self.discount <= Decimal::ZERO {
            errors.add("discount", "Discount must be a positive number");
        } else if !within_money_bounds(&self.discount) {
            errors.add("discount", DIGITS_MESSAGE);
        }

        if self.min_basket_value < Decimal::ZERO {
            errors.add("min_basket_value", "Minimum basket value must be zero or positive");
        } else if !within_money_bounds(&self.min_basket_value) {
            errors.add("min_basket_value", DIGITS_MESSAGE);
        }

        errors.into_result()
    }

    pub fn into_coupon(self) -> Coupon {
        Coupon { code: self.code, discount: self.discount, min_basket_value: self.min_basket_value }
    }
}
