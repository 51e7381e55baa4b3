use coupon_core::{Basket, CouponCode, CouponService};
use coupon_db::SqlCouponRepository;
use rust_decimal::Decimal;

use crate::commands::{connect_and_migrate, prepare, CommandResult};

/// Dry-run redemption: the basket is computed and printed, nothing is written.
pub fn run(code: String, value: Decimal, applied_discount: Decimal) -> CommandResult {
    let (config, runtime) = match prepare("apply") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    runtime.block_on(async {
        let pool = match connect_and_migrate(&config).await {
            Ok(pool) => pool,
            Err((error_class, message, exit_code)) => {
                return CommandResult::failure("apply", error_class, message, exit_code);
            }
        };

        let service = CouponService::new(SqlCouponRepository::new(pool.clone()));
        let code = CouponCode::new(code);
        let outcome = service.apply_coupon(&code, &Basket::new(value, applied_discount)).await;
        pool.close().await;

        match outcome {
            Ok(basket) => CommandResult::success_with_data(
                "apply",
                format!("coupon {code} applied, total discount {}", basket.applied_discount),
                serde_json::to_value(&basket).ok(),
            ),
            Err(error) => CommandResult::from_coupon_error("apply", error),
        }
    })
}
