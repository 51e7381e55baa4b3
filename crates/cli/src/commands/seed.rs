use coupon_db::{DemoCouponSeed, SeededCoupon};

use crate::commands::{connect_and_migrate, prepare, CommandResult, StepFailure, EXIT_MIGRATION};

pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("seed") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = connect_and_migrate(&config).await?;

        let seed_result = DemoCouponSeed::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), EXIT_MIGRATION))?;

        let verification = DemoCouponSeed::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), EXIT_MIGRATION))?;

        let run_result: Result<Vec<SeededCoupon>, StepFailure> = if verification.all_present {
            Ok(seed_result.coupons_seeded)
        } else {
            let failed_checks = verification
                .checks
                .iter()
                .filter_map(|(check, passed)| (!passed).then_some(*check))
                .collect::<Vec<_>>();
            Err(("seed_verification", verification_message(&failed_checks), EXIT_MIGRATION))
        };

        pool.close().await;
        run_result
    });

    match result {
        Ok(coupons) => {
            let lines: Vec<String> = coupons
                .iter()
                .map(|coupon| format!("  - {}: {}", coupon.code, coupon.description))
                .collect();
            CommandResult::success(
                "seed",
                format!("demo coupons loaded:\n{}", lines.join("\n")),
            )
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn verification_message(failed_checks: &[&str]) -> String {
    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for coupons: {}", failed_checks.join(", "))
    }
}
