use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;
use crate::supervisor::Supervisor;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok` when the database and the worker are both up, else `degraded`.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether the database is reachable.
    pub db_healthy: bool,
    /// Whether the worker process is alive.
    pub worker_running: bool,
}

/// GET /health -- returns service, database and worker health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = yolo_db::health_check(&state.pool).await.is_ok();
    let worker_running = Supervisor::is_running(&mut *state.worker.lock().await);

    let status = if db_healthy && worker_running {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        worker_running,
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
