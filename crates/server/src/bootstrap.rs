use std::sync::Arc;

use coupon_core::config::{AppConfig, ConfigError, LoadOptions};
use coupon_core::CouponService;
use coupon_db::{connect_with_settings, migrations, DbPool, SqlCouponRepository};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub service: Arc<CouponService<SqlCouponRepository>>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let service = Arc::new(CouponService::new(SqlCouponRepository::new(db_pool.clone())));
    info!(
        event_name = "system.bootstrap.service_ready",
        correlation_id = "bootstrap",
        "coupon service ready"
    );

    Ok(Application { config, db_pool, service })
}

#[cfg(test)]
mod tests {
    use coupon_core::config::{ConfigOverrides, LoadOptions};
    use coupon_core::{Basket, CouponCode, NewCoupon};
    use rust_decimal::Decimal;

    use crate::bootstrap::{bootstrap, BootstrapError};

    fn overrides(database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_rejects_invalid_config_before_touching_the_database() {
        let mut options = overrides("sqlite::memory:");
        options.overrides.port = Some(0);

        let result = bootstrap(options).await;

        assert!(matches!(result, Err(BootstrapError::Config(_))));
    }

    #[tokio::test]
    async fn bootstrap_rejects_non_sqlite_urls() {
        let result = bootstrap(overrides("postgres://localhost/coupons")).await;

        let message = result.err().expect("error").to_string();
        assert!(message.contains("database.url"));
    }

    #[tokio::test]
    async fn bootstrapped_service_creates_and_applies_coupons() {
        let app = bootstrap(overrides("sqlite::memory:")).await.expect("bootstrap should succeed");

        app.service
            .create_coupon(NewCoupon::new("BOOT0001", Decimal::new(1050, 2), Decimal::new(5000, 2)))
            .await
            .expect("create");
        let basket = app
            .service
            .apply_coupon(&CouponCode::new("BOOT0001"), &Basket::new(Decimal::new(10_000, 2), Decimal::ZERO))
            .await
            .expect("apply");

        assert_eq!(basket.applied_discount, Decimal::new(1050, 2));
        assert!(basket.application_successful);

        app.db_pool.close().await;
    }
}
