pub mod commands;

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "coupons",
    about = "Coupon operator CLI",
    long_about = "Run migrations, inspect configuration, check readiness, and manage coupons against the configured database.",
    after_help = "Examples:\n  coupons doctor --json\n  coupons create --code DISC2024 --discount 10.50 --min-basket-value 50\n  coupons apply --code DISC2024 --value 100\n  coupons filter DISC2024 SUMMER24"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load and verify the deterministic demo coupons")]
    Seed,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, DB connectivity, and schema readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Create a coupon")]
    Create {
        #[arg(long, help = "Eight alphanumeric characters")]
        code: String,
        #[arg(long, help = "Fixed discount amount, greater than zero")]
        discount: Decimal,
        #[arg(long, default_value = "0", help = "Minimum basket value for the coupon to apply")]
        min_basket_value: Decimal,
    },
    #[command(about = "Compute the basket after applying a coupon, without persisting anything")]
    Apply {
        #[arg(long)]
        code: String,
        #[arg(long, help = "Basket value")]
        value: Decimal,
        #[arg(long, default_value = "0", help = "Discount already applied to the basket")]
        applied_discount: Decimal,
    },
    #[command(about = "Look up stored coupons by code; unknown codes are skipped")]
    Filter {
        #[arg(required = false)]
        codes: Vec<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Create { code, discount, min_basket_value } => {
            commands::create::run(code, discount, min_basket_value)
        }
        Command::Apply { code, value, applied_discount } => {
            commands::apply::run(code, value, applied_discount)
        }
        Command::Filter { codes } => commands::filter::run(codes),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
