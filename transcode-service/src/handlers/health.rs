//! Health/readiness/liveness endpoints. `/health/ready` checks the database
//! pool; `/health/live` only confirms the process is scheduling tasks.

use std::collections::HashMap;
use std::time::Instant;

use actix_web::{web, HttpResponse};
use serde::Serialize;
use sqlx::PgPool;

pub struct HealthState {
    pub db_pool: Option<PgPool>,
}

#[derive(Serialize, Clone)]
#[serde(rename_all = "lowercase")]
enum ComponentStatus {
    Healthy,
    Unhealthy,
}

#[derive(Serialize)]
struct ComponentCheck {
    status: ComponentStatus,
    message: String,
    latency_ms: u64,
}

#[derive(Serialize)]
struct ReadinessResponse {
    ready: bool,
    checks: HashMap<String, ComponentCheck>,
}

async fn check_postgres(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").fetch_one(pool).await.map(|_| ())
}

pub async fn health_summary() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": "media-service",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn readiness_summary(state: web::Data<HealthState>) -> HttpResponse {
    let mut checks = HashMap::new();
    let mut ready = true;

    if let Some(pool) = &state.db_pool {
        let start = Instant::now();
        let result = check_postgres(pool).await;
        let latency_ms = start.elapsed().as_millis() as u64;
        let check = match result {
            Ok(_) => ComponentCheck {
                status: ComponentStatus::Healthy,
                message: "PostgreSQL connection successful".to_string(),
                latency_ms,
            },
            Err(e) => {
                ready = false;
                ComponentCheck {
                    status: ComponentStatus::Unhealthy,
                    message: format!("PostgreSQL connection failed: {e}"),
                    latency_ms,
                }
            }
        };
        checks.insert("postgresql".to_string(), check);
    }

    let body = ReadinessResponse { ready, checks };
    if ready {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}

pub async fn liveness_summary() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "alive" }))
}
