use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

struct SeedCouponContract {
    code: &'static str,
    discount: &'static str,
    min_basket_value: &'static str,
    description: &'static str,
}

const SEED_COUPONS: &[SeedCouponContract] = &[
    SeedCouponContract {
        code: "WELCOME1",
        discount: "5.00",
        min_basket_value: "0.00",
        description: "Flat welcome discount with no minimum",
    },
    SeedCouponContract {
        code: "SPRING25",
        discount: "25.00",
        min_basket_value: "100.00",
        description: "Seasonal discount gated on a 100.00 basket",
    },
    SeedCouponContract {
        code: "LOYAL050",
        discount: "10.50",
        min_basket_value: "50.00",
        description: "Loyalty discount gated on a 50.00 basket",
    },
];

/// Deterministic demo coupons for smoke runs against a fresh database.
pub struct DemoCouponSeed;

impl DemoCouponSeed {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_coupons.sql");

    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;

        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        let coupons_seeded = SEED_COUPONS
            .iter()
            .map(|coupon| SeededCoupon { code: coupon.code, description: coupon.description })
            .collect();

        Ok(SeedResult { coupons_seeded })
    }

    /// Checks that each demo coupon is stored with the expected amounts.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::with_capacity(SEED_COUPONS.len());

        for contract in SEED_COUPONS {
            let row: Option<(String, String)> = sqlx::query_as(
                "SELECT discount, min_basket_value FROM coupon WHERE code = ?1",
            )
            .bind(contract.code)
            .fetch_optional(pool)
            .await?;

            let matches = match row {
                Some((discount, min_basket_value)) => {
                    decimal_eq(&discount, contract.discount)?
                        && decimal_eq(&min_basket_value, contract.min_basket_value)?
                }
                None => false,
            };
            checks.push((contract.code, matches));
        }

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }

    pub fn codes() -> Vec<&'static str> {
        SEED_COUPONS.iter().map(|coupon| coupon.code).collect()
    }
}

fn decimal_eq(stored: &str, expected: &str) -> Result<bool, RepositoryError> {
    let parse = |raw: &str| {
        Decimal::from_str(raw).map_err(|error| RepositoryError::Decode(error.to_string()))
    };
    Ok(parse(stored)? == parse(expected)?)
}

#[derive(Debug)]
pub struct SeedResult {
    pub coupons_seeded: Vec<SeededCoupon>,
}

#[derive(Debug)]
pub struct SeededCoupon {
    pub code: &'static str,
    pub description: &'static str,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    #[tokio::test]
    async fn verify_fails_before_load() {
        let pool = setup().await;

        let result = DemoCouponSeed::verify(&pool).await.expect("verify");

        assert!(!result.all_present);
        assert!(result.checks.iter().all(|(_, ok)| !*ok));
    }

    #[tokio::test]
    async fn load_then_verify_passes() {
        let pool = setup().await;

        let seeded = DemoCouponSeed::load(&pool).await.expect("load");
        let result = DemoCouponSeed::verify(&pool).await.expect("verify");

        assert_eq!(seeded.coupons_seeded.len(), SEED_COUPONS.len());
        assert!(result.all_present, "checks: {:?}", result.checks);
    }

    #[tokio::test]
    async fn load_is_repeatable() {
        let pool = setup().await;

        DemoCouponSeed::load(&pool).await.expect("first load");
        DemoCouponSeed::load(&pool).await.expect("second load");

        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM coupon").fetch_one(&pool).await.expect("count");
        assert_eq!(count as usize, SEED_COUPONS.len());
    }

    #[test]
    fn sql_fixture_mentions_every_contract_code() {
        for code in DemoCouponSeed::codes() {
            assert!(DemoCouponSeed::SQL.contains(code), "fixture SQL is missing {code}");
        }
    }
}
