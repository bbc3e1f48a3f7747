use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use bookclub_core::config::SchedulerMode;
use bookclub_core::errors::{ApplicationError, DomainError};
use bookclub_db::DbPool;
use bookclub_runtime::BookClubService;

#[derive(Clone)]
pub struct HealthState {
    pub db_pool: DbPool,
    pub service: Arc<BookClubService>,
    pub scheduler_mode: SchedulerMode,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: HealthCheck,
    pub cycle: HealthCheck,
    pub scheduler: HealthCheck,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

/// Readiness follows the database only; the cycle line is informational.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let ready = database.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        database,
        cycle: cycle_check(&state.service).await,
        scheduler: HealthCheck {
            status: "ready",
            detail: match state.scheduler_mode {
                SchedulerMode::Interval => "in-process interval checks".to_owned(),
                SchedulerMode::External => "checks triggered via /cron/check-phases".to_owned(),
            },
        },
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => HealthCheck { status: "ready", detail: "database query succeeded".to_owned() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}

async fn cycle_check(service: &BookClubService) -> HealthCheck {
    match service.current_cycle().await {
        Ok(cycle) => HealthCheck {
            status: "ready",
            detail: format!("{} in {} phase", cycle.name, cycle.current_phase),
        },
        Err(ApplicationError::Domain(DomainError::NotFound { .. })) => {
            HealthCheck { status: "ready", detail: "no active cycle".to_owned() }
        }
        Err(error) => HealthCheck { status: "degraded", detail: error.to_string() },
    }
}
