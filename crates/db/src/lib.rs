pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{connect_with_settings, DbPool};
pub use fixtures::{DemoCouponSeed, SeedResult, SeededCoupon, VerificationResult};
pub use repositories::{InMemoryCouponRepository, RepositoryError, SqlCouponRepository};
