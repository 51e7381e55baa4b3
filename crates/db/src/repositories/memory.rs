use std::collections::HashMap;

use tokio::sync::RwLock;

use coupon_core::domain::coupon::{Coupon, CouponCode, NewCoupon};
use coupon_core::errors::StoreError;
use coupon_core::store::CouponStore;

/// Process-local store backing the service and HTTP tests without a database.
#[derive(Default)]
pub struct InMemoryCouponRepository {
    coupons: RwLock<HashMap<String, Coupon>>,
}

impl InMemoryCouponRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.coupons.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.coupons.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl CouponStore for InMemoryCouponRepository {
    async fn find_by_code(&self, code: &CouponCode) -> Result<Option<Coupon>, StoreError> {
        let coupons = self.coupons.read().await;
        Ok(coupons.get(code.as_str()).cloned())
    }

    async fn find_by_codes(&self, codes: &[CouponCode]) -> Result<Vec<Coupon>, StoreError> {
        let coupons = self.coupons.read().await;
        let mut found: Vec<Coupon> =
            codes.iter().filter_map(|code| coupons.get(code.as_str()).cloned()).collect();
        found.sort_by(|left, right| left.code.cmp(&right.code));
        found.dedup_by(|left, right| left.code == right.code);
        Ok(found)
    }

    async fn exists_by_code(&self, code: &CouponCode) -> Result<bool, StoreError> {
        let coupons = self.coupons.read().await;
        Ok(coupons.contains_key(code.as_str()))
    }

    async fn save(&self, coupon: NewCoupon) -> Result<Coupon, StoreError> {
        let mut coupons = self.coupons.write().await;
        if coupons.contains_key(coupon.code.as_str()) {
            return Err(StoreError::Conflict(coupon.code.as_str().to_string()));
        }

        let coupon = coupon.into_coupon();
        coupons.insert(coupon.code.as_str().to_string(), coupon.clone());
        Ok(coupon)
    }
}
