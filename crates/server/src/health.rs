use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use coupon_db::{migrations, DbPool};
use serde::Serialize;

pub const HEALTH_PATH: &str = "/health";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    Ready,
    Degraded,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Probe {
    pub name: &'static str,
    pub status: Readiness,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: Readiness,
    pub probes: Vec<Probe>,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new().route(HEALTH_PATH, get(health)).with_state(db_pool)
}

/// Readiness requires a reachable database with every embedded migration applied.
pub async fn health(State(pool): State<DbPool>) -> (StatusCode, Json<HealthReport>) {
    let probes = vec![coupon_table_probe(&pool).await, schema_probe(&pool).await];
    let ready = probes.iter().all(|probe| probe.status == Readiness::Ready);

    let report = HealthReport {
        status: if ready { Readiness::Ready } else { Readiness::Degraded },
        probes,
        checked_at: Utc::now().to_rfc3339(),
    };

    if !ready {
        tracing::warn!(event_name = "system.health.degraded", "health probe reported degraded state");
    }

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(report))
}

async fn coupon_table_probe(pool: &DbPool) -> Probe {
    let (status, detail) =
        match sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM coupon").fetch_one(pool).await {
            Ok(count) => (Readiness::Ready, format!("{count} coupons stored")),
            Err(error) => (Readiness::Degraded, format!("coupon table query failed: {error}")),
        };
    Probe { name: "coupon_store", status, detail }
}

async fn schema_probe(pool: &DbPool) -> Probe {
    let (status, detail) = match migrations::pending_count(pool).await {
        Ok(0) => (Readiness::Ready, "schema is current".to_string()),
        Ok(pending) => (Readiness::Degraded, format!("{pending} migrations pending")),
        Err(error) => (Readiness::Degraded, format!("migration state unavailable: {error}")),
    };
    Probe { name: "schema", status, detail }
}
