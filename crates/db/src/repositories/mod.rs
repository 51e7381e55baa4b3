use thiserror::Error;

use coupon_core::errors::StoreError;

pub mod coupon;
pub mod memory;

pub use coupon::SqlCouponRepository;
pub use memory::InMemoryCouponRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl RepositoryError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::Database(sqlx::Error::Database(error)) if error.is_unique_violation())
    }
}

impl From<RepositoryError> for StoreError {
    fn from(error: RepositoryError) -> Self {
        if error.is_unique_violation() {
            return StoreError::Conflict(error.to_string());
        }

        match error {
            RepositoryError::Decode(message) => StoreError::Decode(message),
            RepositoryError::Database(error) => StoreError::Unavailable(error.to_string()),
        }
    }
}
