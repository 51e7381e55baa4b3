use coupon_core::{CouponCode, CouponService};
use coupon_db::SqlCouponRepository;

use crate::commands::{connect_and_migrate, prepare, CommandResult};

pub fn run(codes: Vec<String>) -> CommandResult {
    let (config, runtime) = match prepare("filter") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    runtime.block_on(async {
        let pool = match connect_and_migrate(&config).await {
            Ok(pool) => pool,
            Err((error_class, message, exit_code)) => {
                return CommandResult::failure("filter", error_class, message, exit_code);
            }
        };

        let service = CouponService::new(SqlCouponRepository::new(pool.clone()));
        let codes: Vec<CouponCode> = codes.into_iter().map(CouponCode::new).collect();
        let outcome = service.get_coupons(&codes).await;
        pool.close().await;

        match outcome {
            Ok(coupons) => CommandResult::success_with_data(
                "filter",
                format!("{} of {} requested coupons found", coupons.len(), codes.len()),
                serde_json::to_value(&coupons).ok(),
            ),
            Err(error) => CommandResult::from_coupon_error("filter", error),
        }
    })
}
