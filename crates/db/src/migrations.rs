use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

/// Number of embedded migrations not yet recorded as applied.
pub async fn pending_count(pool: &DbPool) -> Result<usize, sqlx::Error> {
    let (ledger_exists,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'",
    )
    .fetch_one(pool)
    .await?;
    if ledger_exists == 0 {
        return Ok(MIGRATOR.iter().count());
    }

    let applied: Vec<i64> =
        sqlx::query_scalar("SELECT version FROM _sqlx_migrations WHERE success = 1")
            .fetch_all(pool)
            .await?;

    Ok(MIGRATOR.iter().filter(|migration| !applied.contains(&migration.version)).count())
}

#[cfg(test)]
mod tests {
    use super::{pending_count, run_pending, MIGRATOR};
    use crate::connect_with_settings;

    #[tokio::test]
    async fn migrations_create_coupon_table() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("connect");
        run_pending(&pool).await.expect("migrations");

        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'coupon'",
        )
        .fetch_one(&pool)
        .await
        .expect("schema query");

        assert_eq!(count, 1);
        pool.close().await;
    }

    #[tokio::test]
    async fn pending_count_drops_to_zero_after_run() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("connect");

        assert_eq!(pending_count(&pool).await.expect("before"), MIGRATOR.iter().count());
        run_pending(&pool).await.expect("migrations");
        assert_eq!(pending_count(&pool).await.expect("after"), 0);

        pool.close().await;
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("connect");

        run_pending(&pool).await.expect("first run");
        run_pending(&pool).await.expect("second run");

        let (applied,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM _sqlx_migrations")
            .fetch_one(&pool)
            .await
            .expect("migration ledger");

        assert_eq!(applied as usize, MIGRATOR.iter().count());
        pool.close().await;
    }

    #[tokio::test]
    async fn coupon_code_is_unique_at_the_schema_level() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("connect");
        run_pending(&pool).await.expect("migrations");

        let insert = "INSERT INTO coupon (code, discount, min_basket_value, created_at)
                      VALUES ('AAAA1111', '5.00', '0', '2026-01-01T00:00:00Z')";
        sqlx::query(insert).execute(&pool).await.expect("first insert");
        let second = sqlx::query(insert).execute(&pool).await;

        let is_unique_violation = matches!(
            second,
            Err(sqlx::Error::Database(ref error)) if error.is_unique_violation()
        );
        assert!(is_unique_violation, "duplicate code should violate the unique constraint");
        pool.close().await;
    }
}
