//! HTTP API for the booking service.
//!
//! Booking operations are called in-process through `cabin_booking`; the HTTP
//! surface is limited to monitoring.
//!
//! # Endpoints
//!
//! - `GET /health` - Database connectivity and hold reclaimer backlog

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

/// Application state shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<PgPool>,
    /// Interval of the hold reclaimer, reported by `/health`
    pub sweep_interval: Duration,
}

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .with_state(state)
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `200 OK` when the database answers, `503 Service Unavailable`
/// otherwise. `stale_holds` counts holds past their expiry that the reclaimer
/// has not canceled yet; a growing value means sweeps are failing.
///
/// # Example
///
/// ```bash
/// curl http://localhost:8080/health
/// # {"status":"healthy","database":true,"reclaimer":{"interval_secs":60,"stale_holds":0},...}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    crate::metrics::db_connections_active(state.pool.size());

    let stale_holds: Option<i64> = sqlx::query_scalar(
        "SELECT COUNT(*) FROM bookings WHERE status = 'hold' AND hold_expires_at <= NOW()",
    )
    .fetch_one(&*state.pool)
    .await
    .map_err(|e| log::warn!("Health check query failed: {e}"))
    .ok();

    let db_healthy = stale_holds.is_some();
    let status_code = if db_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if db_healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "database": db_healthy,
        "reclaimer": {
            "interval_secs": state.sweep_interval.as_secs(),
            "stale_holds": stale_holds,
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
