/*!
 * # Health Check Module
 *
 * - Liveness (`/health`): service name, version and uptime
 * - Readiness (`/health/ready`): pings the database, 503 when unreachable
 */

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, error};
use utoipa::ToSchema;

pub const SERVICE_NAME: &str = "purchase-management-api";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Up,
    Down,
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct HealthInfo {
    pub service: String,
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct ReadinessInfo {
    pub ready: bool,
    pub database: HealthStatus,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone)]
pub struct HealthState {
    pub db_pool: Arc<DatabaseConnection>,
    pub start_time: SystemTime,
}

impl HealthState {
    pub fn new(db_pool: Arc<DatabaseConnection>) -> Self {
        Self {
            db_pool,
            start_time: SystemTime::now(),
        }
    }

    pub fn uptime(&self) -> u64 {
        SystemTime::now()
            .duration_since(self.start_time)
            .unwrap_or(Duration::from_secs(0))
            .as_secs()
    }
}

/// Liveness probe
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is running", body = HealthInfo)),
    tag = "health"
)]
pub async fn health_check(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    debug!("health check");
    Json(HealthInfo {
        service: SERVICE_NAME.to_string(),
        status: HealthStatus::Up,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime(),
        timestamp: Utc::now(),
    })
}

/// Readiness probe backed by a database ping
#[utoipa::path(
    get,
    path = "/health/ready",
    responses(
        (status = 200, description = "Database reachable", body = ReadinessInfo),
        (status = 503, description = "Database unreachable", body = ReadinessInfo)
    ),
    tag = "health"
)]
pub async fn readiness_check(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let database = match state.db_pool.ping().await {
        Ok(()) => HealthStatus::Up,
        Err(e) => {
            error!(error = %e, "database readiness check failed");
            HealthStatus::Down
        }
    };

    let status_code = match database {
        HealthStatus::Up => StatusCode::OK,
        HealthStatus::Down => StatusCode::SERVICE_UNAVAILABLE,
    };

    (
        status_code,
        Json(ReadinessInfo {
            ready: database == HealthStatus::Up,
            database,
            timestamp: Utc::now(),
        }),
    )
}

/// Health endpoints, mounted under `/health`
pub fn health_routes(db_pool: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/ready", get(readiness_check))
        .with_state(Arc::new(HealthState::new(db_pool)))
}
