use std::str::FromStr;

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::Row;
use tracing::debug;

use coupon_core::domain::coupon::{Coupon, CouponCode, NewCoupon};
use coupon_core::errors::StoreError;
use coupon_core::store::CouponStore;

use super::RepositoryError;
use crate::DbPool;

pub struct SqlCouponRepository {
    pool: DbPool,
}

impl SqlCouponRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn parse_decimal(column: &str, raw: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(raw)
        .map_err(|e| RepositoryError::Decode(format!("{column} `{raw}` is not a decimal: {e}")))
}

fn row_to_coupon(row: &sqlx::sqlite::SqliteRow) -> Result<Coupon, RepositoryError> {
    let code: String = row.try_get("code").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let discount: String =
        row.try_get("discount").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let min_basket_value: String =
        row.try_get("min_basket_value").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Coupon {
        code: CouponCode(code),
        discount: parse_decimal("discount", &discount)?,
        min_basket_value: parse_decimal("min_basket_value", &min_basket_value)?,
    })
}

/// Stays well below SQLite's bound-variable limit.
const LOOKUP_CHUNK: usize = 500;

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

#[async_trait::async_trait]
impl CouponStore for SqlCouponRepository {
    async fn find_by_code(&self, code: &CouponCode) -> Result<Option<Coupon>, StoreError> {
        let row = sqlx::query("SELECT code, discount, min_basket_value FROM coupon WHERE code = ?")
            .bind(code.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        match row {
            Some(ref r) => Ok(Some(row_to_coupon(r)?)),
            None => Ok(None),
        }
    }

    async fn find_by_codes(&self, codes: &[CouponCode]) -> Result<Vec<Coupon>, StoreError> {
        if codes.is_empty() {
            return Ok(Vec::new());
        }

        let mut coupons = Vec::new();
        for chunk in codes.chunks(LOOKUP_CHUNK) {
            let sql = format!(
                "SELECT code, discount, min_basket_value FROM coupon WHERE code IN ({})",
                placeholders(chunk.len())
            );
            let mut query = sqlx::query(&sql);
            for code in chunk {
                query = query.bind(code.as_str());
            }

            let rows = query.fetch_all(&self.pool).await.map_err(RepositoryError::from)?;
            for row in &rows {
                coupons.push(row_to_coupon(row)?);
            }
        }

        coupons.sort_by(|a, b| a.code.as_str().cmp(b.code.as_str()));
        coupons.dedup_by(|a, b| a.code == b.code);
        Ok(coupons)
    }

    async fn exists_by_code(&self, code: &CouponCode) -> Result<bool, StoreError> {
        let exists: i64 = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM coupon WHERE code = ?)")
            .bind(code.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok(exists == 1)
    }

    async fn save(&self, coupon: NewCoupon) -> Result<Coupon, StoreError> {
        let result = sqlx::query(
            "INSERT INTO coupon (code, discount, min_basket_value, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(coupon.code.as_str())
        .bind(coupon.discount.to_string())
        .bind(coupon.min_basket_value.to_string())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from);

        match result {
            Ok(_) => {
                debug!(coupon_code = %coupon.code, "coupon row inserted");
                Ok(coupon.into_coupon())
            }
            Err(error) if error.is_unique_violation() => {
                Err(StoreError::Conflict(coupon.code.as_str().to_string()))
            }
            Err(error) => Err(error.into()),
        }
    }
}
