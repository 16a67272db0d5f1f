use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use yolo_cloud::S3ObjectStore;
use yolo_core::layout::StorageLayout;
use yolo_db::PgStore;
use yolo_events::{AmqpEventPublisher, CallbackDispatcher};
use yolo_inference::HttpPredictor;
use yolo_pipeline::{Collaborators, JobHandler};
use yolo_worker::signal::shutdown_signal;
use yolo_worker::{MessageConsumer, WorkerConfig};

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "yolo_worker=debug,yolo_pipeline=debug,yolo_events=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Jobs run strictly one at a time, so a single-threaded runtime is enough.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build Tokio runtime")?;

    runtime.block_on(run())
}

async fn run() -> anyhow::Result<()> {
    // --- Configuration ---
    let config = WorkerConfig::from_env()?;
    tracing::info!(
        queue = %config.consumer.queue,
        exchange = %config.broker.exchange,
        dead_letter_exchange = ?config.consumer.dead_letter_exchange,
        "Loaded worker configuration"
    );

    // --- Database ---
    let pool = yolo_db::create_pool(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    yolo_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database ready");
    let store = PgStore::new(pool);

    // --- Collaborators ---
    let publisher = Arc::new(AmqpEventPublisher::new(config.broker.clone()));
    let callback = CallbackDispatcher::from_env().context("Failed to build callback client")?;
    let predictor = HttpPredictor::from_env().context("Failed to build inference client")?;
    let layout = StorageLayout::from_env();
    tracing::info!(uploads = %layout.root().display(), "Storage layout");

    let handler = JobHandler::new(
        Collaborators {
            object_store: Arc::new(S3ObjectStore::from_env().await),
            predictor: Arc::new(predictor),
            predictions: Arc::new(store.clone()),
            identities: Arc::new(store),
            callback: Arc::new(callback),
            publisher: publisher.clone(),
        },
        layout,
    );

    // --- Shutdown ---
    let shutdown = CancellationToken::new();
    let shutdown_trigger = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown_trigger.cancel();
    });

    // --- Consume ---
    MessageConsumer::new(config.consumer, handler)
        .run(shutdown)
        .await;

    publisher.close().await;
    tracing::info!("Worker shut down");
    Ok(())
}
