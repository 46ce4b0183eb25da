//! Dashboard overview and health check
//!
//! - GET /api/admin/dashboard - Counts for the staff landing page
//! - GET /api/health - Liveness and database ping

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::services::{Action, DashboardStats, Resource};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub version: &'static str,
}

/// Nested under `/api/admin/dashboard`
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(stats))
}

async fn stats(
    State(state): State<AppState>,
    current: AuthenticatedUser,
) -> Result<Json<DashboardStats>, ApiError> {
    current.require(Resource::Dashboard, Action::Read)?;
    let stats = state
        .dashboard
        .stats()
        .await
        .map_err(|e| ApiError::internal(format!("{:#}", e)))?;
    Ok(Json(stats))
}

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (status, database, code) = match state.pool.ping().await {
        Ok(()) => ("ok", "ok", StatusCode::OK),
        Err(e) => {
            tracing::error!("Health check database ping failed: {:#}", e);
            ("degraded", "unreachable", StatusCode::SERVICE_UNAVAILABLE)
        }
    };
    (
        code,
        Json(HealthResponse {
            status,
            database,
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}
