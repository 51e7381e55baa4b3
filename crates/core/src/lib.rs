pub mod config;
pub mod domain;
pub mod errors;
pub mod rules;
pub mod service;
pub mod store;

pub use domain::basket::Basket;
pub use domain::coupon::{Coupon, CouponCode, NewCoupon};
pub use errors::{CouponError, InterfaceError, StoreError, ValidationErrors};
pub use service::{validate_application, CouponService};
pub use store::CouponStore;
