use coupon_core::{CouponService, NewCoupon};
use coupon_db::SqlCouponRepository;
use rust_decimal::Decimal;

use crate::commands::{connect_and_migrate, prepare, CommandResult};

pub fn run(code: String, discount: Decimal, min_basket_value: Decimal) -> CommandResult {
    let (config, runtime) = match prepare("create") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    runtime.block_on(async {
        let pool = match connect_and_migrate(&config).await {
            Ok(pool) => pool,
            Err((error_class, message, exit_code)) => {
                return CommandResult::failure("create", error_class, message, exit_code);
            }
        };

        let service = CouponService::new(SqlCouponRepository::new(pool.clone()));
        let outcome = service.create_coupon(NewCoupon::new(code, discount, min_basket_value)).await;
        pool.close().await;

        match outcome {
            Ok(coupon) => CommandResult::success_with_data(
                "create",
                format!("coupon {} created", coupon.code),
                serde_json::to_value(&coupon).ok(),
            ),
            Err(error) => CommandResult::from_coupon_error("create", error),
        }
    })
}
