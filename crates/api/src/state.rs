use std::sync::Arc;

use tokio::sync::Mutex;

use crate::supervisor::TaskHandle;

/// Shared application state available to all Axum handlers via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: yolo_db::DbPool,
    /// Handle of the supervised worker process.
    pub worker: Arc<Mutex<TaskHandle>>,
}
