use std::env;
use std::sync::{Mutex, OnceLock};

use coupon_cli::commands::{apply, config, create, doctor, filter, migrate, seed};
use rust_decimal::Decimal;
use serde_json::Value;

fn database_url(dir: &tempfile::TempDir) -> String {
    format!("sqlite://{}?mode=rwc", dir.path().join("coupons.db").display())
}

#[test]
fn migrate_returns_success_with_valid_env() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(&dir);

    with_env(&[("COUPONS_DATABASE_URL", &url)], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_for_non_sqlite_url() {
    with_env(&[("COUPONS_DATABASE_URL", "postgres://localhost/coupons")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn seed_lists_demo_coupons_and_is_idempotent() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(&dir);

    with_env(&[("COUPONS_DATABASE_URL", &url)], || {
        let first = seed::run();
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");
        let first_payload = parse_payload(&first.output);
        assert_eq!(first_payload["command"], "seed");
        let message = first_payload["message"].as_str().unwrap_or("");
        assert!(message.contains("  - WELCOME1: Flat welcome discount with no minimum"));
        assert!(message.contains("  - LOYAL050: Loyalty discount gated on a 50.00 basket"));

        let second = seed::run();
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");
        assert_eq!(first_payload["message"], parse_payload(&second.output)["message"]);
    });
}

#[test]
fn create_apply_and_filter_share_the_configured_database() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(&dir);

    with_env(&[("COUPONS_DATABASE_URL", &url)], || {
        let created =
            create::run("DISC2024".to_string(), Decimal::new(1050, 2), Decimal::new(5000, 2));
        assert_eq!(created.exit_code, 0, "create failed: {}", created.output);
        assert_eq!(parse_payload(&created.output)["data"]["code"], "DISC2024");

        let applied = apply::run("DISC2024".to_string(), Decimal::new(10_000, 2), Decimal::ZERO);
        assert_eq!(applied.exit_code, 0, "apply failed: {}", applied.output);
        let basket = parse_payload(&applied.output);
        assert_eq!(basket["data"]["applied_discount"], "10.50");
        assert_eq!(basket["data"]["application_successful"], true);

        let filtered = filter::run(vec!["DISC2024".to_string(), "MISSING1".to_string()]);
        assert_eq!(filtered.exit_code, 0, "filter failed: {}", filtered.output);
        let payload = parse_payload(&filtered.output);
        assert_eq!(payload["data"].as_array().map(Vec::len), Some(1));
        assert_eq!(payload["message"], "1 of 2 requested coupons found");
    });
}

#[test]
fn duplicate_create_is_a_business_rejection() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(&dir);

    with_env(&[("COUPONS_DATABASE_URL", &url)], || {
        let first = create::run("TWICE001".to_string(), Decimal::ONE, Decimal::ZERO);
        assert_eq!(first.exit_code, 0);

        let second = create::run("TWICE001".to_string(), Decimal::ONE, Decimal::ZERO);
        assert_eq!(second.exit_code, 6);
        let payload = parse_payload(&second.output);
        assert_eq!(payload["error_class"], "conflict");
        assert_eq!(payload["message"], "Coupon code already exists");
    });
}

#[test]
fn apply_rejections_carry_user_messages() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(&dir);

    with_env(&[("COUPONS_DATABASE_URL", &url)], || {
        let missing = apply::run("NOPE0000".to_string(), Decimal::new(100, 0), Decimal::ZERO);
        assert_eq!(missing.exit_code, 6);
        assert_eq!(parse_payload(&missing.output)["error_class"], "not_found");

        let created =
            create::run("MIN50000".to_string(), Decimal::new(10, 0), Decimal::new(50, 0));
        assert_eq!(created.exit_code, 0);

        let short = apply::run("MIN50000".to_string(), Decimal::new(4999, 2), Decimal::ZERO);
        assert_eq!(short.exit_code, 6);
        assert_eq!(
            parse_payload(&short.output)["message"],
            "Insufficient basket value to apply coupon"
        );
    });
}

#[test]
fn invalid_code_is_reported_as_validation() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(&dir);

    with_env(&[("COUPONS_DATABASE_URL", &url)], || {
        let result = create::run("bad".to_string(), Decimal::ONE, Decimal::ZERO);

        assert_eq!(result.exit_code, 6);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "validation");
        assert!(payload["message"].as_str().unwrap_or("").contains("code:"));
    });
}

#[test]
fn doctor_passes_after_migrate() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(&dir);

    with_env(&[("COUPONS_DATABASE_URL", &url)], || {
        assert_eq!(migrate::run().exit_code, 0);

        let report: Value =
            serde_json::from_str(&doctor::run(true)).expect("doctor output should be JSON");
        assert_eq!(report["overall_status"], "pass", "report: {report}");
        assert_eq!(report["checks"].as_array().map(Vec::len), Some(3));
    });
}

#[test]
fn doctor_flags_pending_migrations() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(&dir);

    with_env(&[("COUPONS_DATABASE_URL", &url)], || {
        let report: Value =
            serde_json::from_str(&doctor::run(true)).expect("doctor output should be JSON");

        assert_eq!(report["overall_status"], "fail");
        let schema = report["checks"]
            .as_array()
            .and_then(|checks| checks.iter().find(|check| check["name"] == "schema_migrations"))
            .cloned()
            .unwrap_or(Value::Null);
        assert_eq!(schema["status"], "fail");
    });
}

#[test]
fn config_attributes_env_sources() {
    with_env(&[("COUPONS_DATABASE_URL", "sqlite::memory:"), ("COUPONS_LOG_LEVEL", "debug")], || {
        let output = config::run();

        assert!(output.contains("- database.url = sqlite::memory: (source: env (COUPONS_DATABASE_URL))"));
        assert!(output.contains("- logging.level = debug (source: env (COUPONS_LOG_LEVEL))"));
        assert!(output.contains("- server.port = 8080 (source: default)"));
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard = ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    let keys = [
        "COUPONS_DATABASE_URL",
        "COUPONS_DATABASE_MAX_CONNECTIONS",
        "COUPONS_DATABASE_TIMEOUT_SECS",
        "COUPONS_SERVER_BIND_ADDRESS",
        "COUPONS_SERVER_PORT",
        "COUPONS_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "COUPONS_LOGGING_LEVEL",
        "COUPONS_LOGGING_FORMAT",
        "COUPONS_LOG_LEVEL",
        "COUPONS_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
