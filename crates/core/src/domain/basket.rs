use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::money::{within_money_bounds, DIGITS_MESSAGE};
use crate::errors::ValidationErrors;

pub const ALREADY_APPLIED_MESSAGE: &str =
    "A coupon has already been applied to this basket. No further applications are allowed.";

/// Request-scoped basket state. It is never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Basket {
    pub value: Decimal,
    pub applied_discount: Decimal,
    pub application_successful: bool,
}

impl Basket {
    pub fn new(value: Decimal, applied_discount: Decimal) -> Self {
        Self { value, applied_discount, application_successful: false }
    }

    /// Input checks for a basket that is about to receive a coupon.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.value < Decimal::ZERO {
            errors.add("value", "Basket value must be zero or positive");
        } else if !within_money_bounds(&self.value) {
            errors.add("value", DIGITS_MESSAGE);
        }

        if self.applied_discount < Decimal::ZERO {
            errors.add("applied_discount", "Applied discount must be zero or positive");
        } else if !within_money_bounds(&self.applied_discount) {
            errors.add("applied_discount", DIGITS_MESSAGE);
        }

        if self.application_successful {
            errors.add("application_successful", ALREADY_APPLIED_MESSAGE);
        }

        errors.into_result()
    }
}
