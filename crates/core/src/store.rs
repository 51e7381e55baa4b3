use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::coupon::{Coupon, CouponCode, NewCoupon};
use crate::errors::StoreError;

/// Persistence seam for coupons. Implementations must enforce code uniqueness
/// themselves and report a violation on [`CouponStore::save`] as [`StoreError::Conflict`].
#[async_trait]
pub trait CouponStore: Send + Sync {
    async fn find_by_code(&self, code: &CouponCode) -> Result<Option<Coupon>, StoreError>;

    /// Codes with no stored coupon are absent from the result.
    async fn find_by_codes(&self, codes: &[CouponCode]) -> Result<Vec<Coupon>, StoreError>;

    async fn exists_by_code(&self, code: &CouponCode) -> Result<bool, StoreError>;

    async fn save(&self, coupon: NewCoupon) -> Result<Coupon, StoreError>;
}

#[async_trait]
impl<S> CouponStore for Arc<S>
where
    S: CouponStore + ?Sized,
{
    async fn find_by_code(&self, code: &CouponCode) -> Result<Option<Coupon>, StoreError> {
        (**self).find_by_code(code).await
    }

    async fn find_by_codes(&self, codes: &[CouponCode]) -> Result<Vec<Coupon>, StoreError> {
        (**self).find_by_codes(codes).await
    }

    async fn exists_by_code(&self, code: &CouponCode) -> Result<bool, StoreError> {
        (**self).exists_by_code(code).await
    }

    async fn save(&self, coupon: NewCoupon) -> Result<Coupon, StoreError> {
        (**self).save(coupon).await
    }
}
