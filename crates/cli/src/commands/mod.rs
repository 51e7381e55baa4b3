pub mod apply;
pub mod config;
pub mod create;
pub mod doctor;
pub mod filter;
pub mod migrate;
pub mod seed;

use coupon_core::config::{AppConfig, LoadOptions};
use coupon_core::CouponError;
use coupon_db::{connect_with_settings, migrations, DbPool};
use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Runtime;

pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_RUNTIME: u8 = 3;
pub const EXIT_DATABASE: u8 = 4;
pub const EXIT_MIGRATION: u8 = 5;
pub const EXIT_REJECTED: u8 = 6;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with_data(command, message, None)
    }

    pub fn success_with_data(
        command: &str,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    /// Business rejections exit with [`EXIT_REJECTED`]; store outages count as database failures.
    pub fn from_coupon_error(command: &str, error: CouponError) -> Self {
        let (error_class, exit_code) = match &error {
            CouponError::CouponNotFound(_) => ("not_found", EXIT_REJECTED),
            CouponError::CouponCodeAlreadyExists(_)
            | CouponError::InsufficientBasketValue(_)
            | CouponError::InvalidDiscount(_) => ("conflict", EXIT_REJECTED),
            CouponError::Validation(_) => ("validation", EXIT_REJECTED),
            CouponError::Store(_) => ("db_connectivity", EXIT_DATABASE),
        };

        let message = match &error {
            CouponError::Validation(errors) => format!("Validation error: {errors}"),
            CouponError::Store(store_error) => store_error.to_string(),
            _ => error.clone().into_interface(command).user_message().to_string(),
        };

        Self::failure(command, error_class, message, exit_code)
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Loads config and builds a current-thread runtime, or returns the failure to print.
pub(crate) fn prepare(command: &str) -> Result<(AppConfig, Runtime), CommandResult> {
    let config = AppConfig::load(LoadOptions::default()).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            EXIT_CONFIG,
        )
    })?;

    let runtime =
        tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
            CommandResult::failure(
                command,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                EXIT_RUNTIME,
            )
        })?;

    Ok((config, runtime))
}

pub(crate) type StepFailure = (&'static str, String, u8);

pub(crate) async fn connect_and_migrate(config: &AppConfig) -> Result<DbPool, StepFailure> {
    let pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(|error| ("db_connectivity", error.to_string(), EXIT_DATABASE))?;

    migrations::run_pending(&pool)
        .await
        .map_err(|error| ("migration", error.to_string(), EXIT_MIGRATION))?;

    Ok(pool)
}
