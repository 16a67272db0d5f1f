//! Interfaces of the external collaborators used by the job handler.
//!
//! Production implementations live in the adapter crates (`yolo-cloud`,
//! `yolo-inference`, `yolo-db`, `yolo-events`); tests substitute in-memory
//! fakes. All handles are constructed once at process start and shared
//! via `Arc<dyn Trait>`.

use std::path::Path;

use async_trait::async_trait;

use crate::error::{
    CallbackError, InferenceError, ObjectStoreError, PublishError, RepositoryError,
};
use crate::events::{CallbackOutcome, CallbackSummary, ImageProcessedEvent};
use crate::prediction::{InferenceOutput, PredictionArtifact};
use crate::types::DbId;

/// Remote object storage holding uploaded images.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Download `key` to `dest`, creating parent directories as needed.
    async fn fetch(&self, key: &str, dest: &Path) -> Result<(), ObjectStoreError>;
}

/// Object-detection engine.
#[async_trait]
pub trait Predictor: Send + Sync {
    /// Run detection on `input` and write the annotated image to `dest`.
    ///
    /// The annotated image must be fully written before this returns.
    async fn predict(&self, input: &Path, dest: &Path) -> Result<InferenceOutput, InferenceError>;
}

/// Write side of the prediction store.
#[async_trait]
pub trait PredictionRepository: Send + Sync {
    /// Persist the session row and all detection rows as one unit of work.
    async fn save_prediction(&self, artifact: &PredictionArtifact) -> Result<(), RepositoryError>;
}

/// Resolves job owners to user ids.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Return the id of `username`, creating the user on first sight.
    ///
    /// Repeated calls with the same name return the same id.
    async fn resolve_or_create_user(&self, username: &str) -> Result<DbId, RepositoryError>;

    /// Return the id of the shared anonymous user, creating it if needed.
    async fn anonymous_user_id(&self) -> Result<DbId, RepositoryError>;
}

/// Publishes domain events to downstream services.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &ImageProcessedEvent) -> Result<(), PublishError>;
}

/// Sends the completion summary of a job to an HTTP endpoint.
#[async_trait]
pub trait CallbackNotifier: Send + Sync {
    /// Notify `url_override` if given, else the configured default target.
    async fn notify(
        &self,
        summary: &CallbackSummary,
        url_override: Option<&str>,
    ) -> Result<CallbackOutcome, CallbackError>;
}
