use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tokio::sync::Mutex;
use tower::ServiceExt;

use yolo_api::config::ServerConfig;
use yolo_api::router::build_app_router;
use yolo_api::state::AppState;
use yolo_api::supervisor::{Supervisor, TaskHandle, TaskSpec};
use yolo_events::BrokerConfig;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        request_timeout_secs: 30,
        database_url: String::new(),
        worker_bin: PathBuf::from("sleep"),
        worker_stop_timeout: Duration::from_secs(2),
    }
}

pub fn test_supervisor() -> Supervisor {
    let config = test_config();
    Supervisor::new(BrokerConfig::default(), config.worker_stop_timeout)
}

/// A stand-in worker process that idles until stopped or its [`TestApp`]
/// is dropped.
pub fn idle_worker(supervisor: &Supervisor) -> TaskHandle {
    supervisor
        .start(TaskSpec::IsolatedWorker {
            program: "sleep".into(),
            args: vec!["30".into()],
        })
        .unwrap()
}

/// The application router plus the worker it reports on.
///
/// Dropping it kills the worker process if it is still running.
pub struct TestApp {
    router: Router,
    worker: Arc<Mutex<TaskHandle>>,
}

impl TestApp {
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn worker(&self) -> Arc<Mutex<TaskHandle>> {
        Arc::clone(&self.worker)
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let Ok(mut worker) = self.worker.try_lock() else {
            return;
        };
        if !Supervisor::is_running(&mut *worker) {
            return;
        }
        if let Some(pid) = worker.pid() {
            // SAFETY: kill(2) on the live child spawned by `idle_worker`.
            unsafe { libc::kill(pid as libc::pid_t, libc::SIGKILL) };
        }
    }
}

/// Build the application with the production middleware stack.
pub fn build_test_app(pool: PgPool, worker: TaskHandle) -> TestApp {
    let config = test_config();
    let worker = Arc::new(Mutex::new(worker));
    let state = AppState {
        pool,
        worker: Arc::clone(&worker),
    };
    TestApp {
        router: build_app_router(state, &config),
        worker,
    }
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
