use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

/// Field-level input violations, keyed by field path. The first message recorded
/// for a field wins.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_insert_with(|| message.into());
    }

    /// Adds every entry of `other`; fields already present keep their message.
    pub fn merge(&mut self, other: ValidationErrors) {
        for (field, message) in other.0 {
            self.add(field, message);
        }
    }

    pub fn extend_nested(&mut self, prefix: &str, nested: ValidationErrors) {
        for (field, message) in nested.0 {
            self.add(format!("{prefix}.{field}"), message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(field, message)| (field.as_str(), message.as_str()))
    }

    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> =
            self.iter().map(|(field, message)| format!("{field}: {message}")).collect();
        f.write_str(&rendered.join("; "))
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("coupon code `{0}` violates the store uniqueness constraint")]
    Conflict(String),
    #[error("coupon store unavailable: {0}")]
    Unavailable(String),
    #[error("stored coupon could not be decoded: {0}")]
    Decode(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CouponError {
    #[error("coupon `{0}` does not exist")]
    CouponNotFound(String),
    #[error("basket value is below the coupon minimum of {0}")]
    InsufficientBasketValue(Decimal),
    #[error("discount would exceed the basket value (remainder {0})")]
    InvalidDiscount(Decimal),
    #[error("coupon code `{0}` already exists")]
    CouponCodeAlreadyExists(String),
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),
    #[error(transparent)]
    Store(StoreError),
}

impl From<ValidationErrors> for CouponError {
    fn from(value: ValidationErrors) -> Self {
        Self::Validation(value)
    }
}

impl From<StoreError> for CouponError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(code) => Self::CouponCodeAlreadyExists(code),
            other => Self::Store(other),
        }
    }
}

impl CouponError {
    /// Business rejections are deterministic; only store failures may succeed on a later call.
    pub fn is_business_rejection(&self) -> bool {
        !matches!(self, Self::Store(_))
    }

    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::Unprocessable { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("unprocessable entity: {errors}")]
    Unprocessable { errors: ValidationErrors, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &str {
        match self {
            Self::NotFound { message, .. } | Self::Conflict { message, .. } => message,
            Self::Unprocessable { .. } => "Validation error",
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::NotFound { correlation_id, .. }
            | Self::Conflict { correlation_id, .. }
            | Self::Unprocessable { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. } => correlation_id,
        }
    }
}

impl From<CouponError> for InterfaceError {
    fn from(value: CouponError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            CouponError::CouponNotFound(_) => {
                Self::NotFound { message: "Coupon code not exists".to_owned(), correlation_id }
            }
            CouponError::CouponCodeAlreadyExists(_) => {
                Self::Conflict { message: "Coupon code already exists".to_owned(), correlation_id }
            }
            CouponError::InsufficientBasketValue(_) => Self::Conflict {
                message: "Insufficient basket value to apply coupon".to_owned(),
                correlation_id,
            },
            CouponError::InvalidDiscount(_) => Self::Conflict {
                message: "Invalid discount exceeding basket value".to_owned(),
                correlation_id,
            },
            CouponError::Validation(errors) => Self::Unprocessable { errors, correlation_id },
            CouponError::Store(error) => {
                Self::ServiceUnavailable { message: error.to_string(), correlation_id }
            }
        }
    }
}
