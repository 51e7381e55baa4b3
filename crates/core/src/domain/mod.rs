pub mod basket;
pub mod coupon;
pub mod money;
