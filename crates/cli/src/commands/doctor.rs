use coupon_core::config::{AppConfig, LoadOptions};
use coupon_db::{connect_with_settings, migrations};
use serde::Serialize;
use serde_json::json;

const CONFIG_CHECK: &str = "config_validation";
const CONNECTIVITY_CHECK: &str = "database_connectivity";
const SCHEMA_CHECK: &str = "schema_migrations";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str, reason: &str) -> Self {
        Self { name, status: CheckStatus::Skipped, details: format!("skipped because {reason}") }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

impl DoctorReport {
    fn from_checks(checks: Vec<DoctorCheck>) -> Self {
        let failed = checks.iter().filter(|check| check.status != CheckStatus::Pass).count();
        let (overall_status, summary) = if failed == 0 {
            (CheckStatus::Pass, "doctor: all readiness checks passed".to_string())
        } else {
            (CheckStatus::Fail, format!("doctor: {failed} of {} readiness checks did not pass", checks.len()))
        };
        Self { overall_status, summary, checks }
    }
}

pub fn run(json_output: bool) -> String {
    let report = DoctorReport::from_checks(run_checks());

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            json!({
                "overall_status": "fail",
                "summary": "doctor serialization failed",
                "error": error.to_string(),
            })
            .to_string()
        });
    }

    render_human(&report)
}

fn run_checks() -> Vec<DoctorCheck> {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return vec![
                DoctorCheck::fail(CONFIG_CHECK, error.to_string()),
                DoctorCheck::skipped(CONNECTIVITY_CHECK, "configuration did not load"),
                DoctorCheck::skipped(SCHEMA_CHECK, "configuration did not load"),
            ];
        }
    };

    let mut checks = vec![DoctorCheck::pass(CONFIG_CHECK, "configuration loaded and validated")];
    checks.extend(database_checks(&config));
    checks
}

/// Connects once and inspects the migration ledger without applying anything.
fn database_checks(config: &AppConfig) -> [DoctorCheck; 2] {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return [
                DoctorCheck::fail(CONNECTIVITY_CHECK, format!("failed to initialize async runtime: {error}")),
                DoctorCheck::skipped(SCHEMA_CHECK, "no async runtime was available"),
            ];
        }
    };

    runtime.block_on(async {
        let pool = match connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        {
            Ok(pool) => pool,
            Err(error) => {
                return [
                    DoctorCheck::fail(CONNECTIVITY_CHECK, format!("failed to connect to database: {error}")),
                    DoctorCheck::skipped(SCHEMA_CHECK, "the database was unreachable"),
                ];
            }
        };

        let connectivity =
            DoctorCheck::pass(CONNECTIVITY_CHECK, format!("connected using `{}`", config.database.url));
        let schema = match migrations::pending_count(&pool).await {
            Ok(0) => DoctorCheck::pass(SCHEMA_CHECK, "all migrations applied"),
            Ok(pending) => DoctorCheck::fail(
                SCHEMA_CHECK,
                format!("{pending} pending migration(s); run `coupons migrate`"),
            ),
            Err(error) => {
                DoctorCheck::fail(SCHEMA_CHECK, format!("failed to read migration ledger: {error}"))
            }
        };
        pool.close().await;

        [connectivity, schema]
    })
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];

    lines.extend(report.checks.iter().map(|check| {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        format!("- [{marker}] {}: {}", check.name, check.details)
    }));

    lines.join("\n")
}
