use std::collections::BTreeSet;

use tracing::{info, warn};

use crate::domain::basket::Basket;
use crate::domain::coupon::{Coupon, CouponCode, NewCoupon};
use crate::errors::{CouponError, ValidationErrors};
use crate::rules;
use crate::store::CouponStore;

/// Field errors for an apply request; basket fields are nested under `basket`.
pub fn validate_application(code: &CouponCode, basket: &Basket) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    code.validate_into(&mut errors);
    if let Err(basket_errors) = basket.validate() {
        errors.extend_nested("basket", basket_errors);
    }
    errors
}

/// Runs the redemption rules against a [`CouponStore`].
pub struct CouponService<S> {
    store: S,
}

impl<S: CouponStore> CouponService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn get_coupon(&self, code: &CouponCode) -> Result<Option<Coupon>, CouponError> {
        Ok(self.store.find_by_code(code).await?)
    }

    /// Applies the coupon to a copy of `basket`; the input is never modified.
    pub async fn apply_coupon(
        &self,
        code: &CouponCode,
        basket: &Basket,
    ) -> Result<Basket, CouponError> {
        validate_application(code, basket).into_result()?;

        let coupon = self
            .get_coupon(code)
            .await?
            .ok_or_else(|| CouponError::CouponNotFound(code.0.clone()))?;

        let redeemed = rules::redeem(&coupon, basket).map_err(|error| {
            warn!(
                event_name = "coupon.apply.rejected",
                coupon_code = %code,
                error = %error,
                "coupon application rejected"
            );
            error
        })?;

        info!(
            event_name = "coupon.apply.succeeded",
            coupon_code = %code,
            applied_discount = %redeemed.applied_discount,
            basket_value = %redeemed.value,
            "discount applied to basket"
        );
        Ok(redeemed)
    }

    pub async fn create_coupon(&self, input: NewCoupon) -> Result<Coupon, CouponError> {
        input.validate()?;

        if self.store.exists_by_code(&input.code).await? {
            return Err(CouponError::CouponCodeAlreadyExists(input.code.0));
        }

        // A concurrent insert can still win between the check and the save; the store's
        // conflict maps to the same error.
        let created = self.store.save(input).await?;

        info!(
            event_name = "coupon.create.succeeded",
            coupon_code = %created.code,
            discount = %created.discount,
            min_basket_value = %created.min_basket_value,
            "new coupon created"
        );
        Ok(created)
    }

    pub async fn get_coupons(&self, codes: &[CouponCode]) -> Result<Vec<Coupon>, CouponError> {
        if codes.is_empty() {
            return Ok(Vec::new());
        }

        let unique: Vec<CouponCode> =
            codes.iter().cloned().collect::<BTreeSet<_>>().into_iter().collect();
        Ok(self.store.find_by_codes(&unique).await?)
    }
}
