use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use yolo_api::config::ServerConfig;
use yolo_api::router::build_app_router;
use yolo_api::state::AppState;
use yolo_api::supervisor::{ConsumerKind, Supervisor, TaskSpec};
use yolo_events::BrokerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "yolo_api=debug,yolo_events=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env()?;
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let pool = yolo_db::create_pool(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    yolo_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    yolo_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database ready");

    // --- Supervised tasks ---
    let supervisor = Supervisor::new(BrokerConfig::from_env(), config.worker_stop_timeout);
    let (worker, mut consumers) = supervisor
        .start_all(
            TaskSpec::worker(&config.worker_bin),
            &[ConsumerKind::Billing, ConsumerKind::Analytics],
        )
        .context("Failed to start supervised tasks")?;

    // --- Router ---
    let worker = Arc::new(Mutex::new(worker));
    let state = AppState {
        pool,
        worker: Arc::clone(&worker),
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let host: std::net::IpAddr = config
        .host
        .parse()
        .with_context(|| format!("Invalid HOST '{}'", config.host))?;
    let addr = SocketAddr::new(host, config.port);
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // --- Post-shutdown cleanup ---
    {
        let mut worker = worker.lock().await;
        match supervisor.stop(&mut worker).await {
            Ok(outcome) => tracing::info!(?outcome, "Worker stop finished"),
            Err(e) => tracing::error!(error = %e, "Failed to stop worker"),
        }
    }
    for handle in &mut consumers {
        if let Err(e) = supervisor.stop(handle).await {
            tracing::warn!(task = handle.name(), error = %e, "Failed to stop consumer");
        }
    }
    supervisor.shutdown_consumers();

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
