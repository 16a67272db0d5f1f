//! Job handler: one queue message in, one [`JobOutcome`] out.
//!
//! Order of work for a job:
//!
//! 1. decode the payload and pick the uid (generated when absent)
//! 2. resolve the input image (drop on failure)
//! 3. create the predicted-image directory and run inference
//! 4. resolve the owner and persist the prediction
//! 5. notify the callback target, then publish `images.processed`
//!
//! Failures in steps 1 and 3-4 are returned as [`JobError`]. Callback and
//! publish failures are logged and recorded in the [`JobReport`] only.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use yolo_core::error::{InferenceError, RepositoryError};
use yolo_core::events::{CallbackOutcome, CallbackSummary, ImageProcessedEvent};
use yolo_core::layout::{is_safe_segment, StorageLayout};
use yolo_core::payload::JobPayload;
use yolo_core::prediction::PredictionArtifact;
use yolo_core::traits::{
    CallbackNotifier, EventPublisher, IdentityStore, ObjectStore, PredictionRepository, Predictor,
};
use yolo_core::types::DbId;

use crate::resolver::{InputError, InputResolver};

// ---------------------------------------------------------------------------
// Outcome types
// ---------------------------------------------------------------------------

/// Failure that rejects the message.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// The body is not a JSON object with the expected field types.
    #[error("Malformed job payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Failed to create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Inference failed: {0}")]
    Inference(#[from] InferenceError),

    #[error("Failed to resolve job owner: {0}")]
    Identity(#[source] RepositoryError),

    #[error("Failed to persist prediction: {0}")]
    Persistence(#[source] RepositoryError),
}

/// What happened to the completion callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackStatus {
    Delivered { status: u16 },
    /// No target URL; the summary was logged.
    Skipped,
    Failed(String),
}

/// Result of a job that ran to completion.
#[derive(Debug, Clone, PartialEq)]
pub struct JobReport {
    pub artifact: PredictionArtifact,
    pub callback: CallbackStatus,
    pub published: bool,
}

/// Non-failing end states of a job. Both are acknowledged.
#[derive(Debug)]
pub enum JobOutcome {
    /// The job was discarded before inference.
    Dropped { uid: String, reason: InputError },
    Completed(JobReport),
}

// ---------------------------------------------------------------------------
// JobHandler
// ---------------------------------------------------------------------------

/// Shared handles the handler is built from.
pub struct Collaborators {
    pub object_store: Arc<dyn ObjectStore>,
    pub predictor: Arc<dyn Predictor>,
    pub predictions: Arc<dyn PredictionRepository>,
    pub identities: Arc<dyn IdentityStore>,
    pub callback: Arc<dyn CallbackNotifier>,
    pub publisher: Arc<dyn EventPublisher>,
}

pub struct JobHandler {
    resolver: InputResolver,
    predictor: Arc<dyn Predictor>,
    predictions: Arc<dyn PredictionRepository>,
    identities: Arc<dyn IdentityStore>,
    callback: Arc<dyn CallbackNotifier>,
    publisher: Arc<dyn EventPublisher>,
}

impl JobHandler {
    pub fn new(collaborators: Collaborators, layout: StorageLayout) -> Self {
        Self {
            resolver: InputResolver::new(collaborators.object_store, layout),
            predictor: collaborators.predictor,
            predictions: collaborators.predictions,
            identities: collaborators.identities,
            callback: collaborators.callback,
            publisher: collaborators.publisher,
        }
    }

    pub fn layout(&self) -> &StorageLayout {
        self.resolver.layout()
    }

    /// Process one raw message body.
    pub async fn handle(&self, body: &[u8]) -> Result<JobOutcome, JobError> {
        let payload = JobPayload::from_slice(body)?;
        self.process(&payload).await
    }

    /// Process an already decoded payload.
    pub async fn process(&self, payload: &JobPayload) -> Result<JobOutcome, JobError> {
        let uid = payload
            .prediction_uid()
            .map(str::to_owned)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let chat_id = payload.chat_id();
        if let Some(chat_id) = chat_id {
            if !is_safe_segment(chat_id) {
                return Ok(self.drop_job(uid, InputError::UnsafeChatId(chat_id.to_owned())));
            }
        }

        let input = match self.resolver.resolve(payload, &uid).await {
            Ok(path) => path,
            Err(reason) => return Ok(self.drop_job(uid, reason)),
        };

        let predicted = self.prepare_output(chat_id, &input, &uid).await?;

        tracing::info!(uid, input = %input.display(), "Running inference");
        let output = self.predictor.predict(&input, &predicted).await?;
        if output.count != output.detections.len() {
            tracing::warn!(
                uid,
                reported = output.count,
                detections = output.detections.len(),
                "Inference count disagrees with detections, using detection count"
            );
        }

        let user_id = self.resolve_owner(payload).await?;

        let artifact = PredictionArtifact {
            uid: uid.clone(),
            original_image: path_string(&input),
            predicted_image: path_string(&predicted),
            user_id,
            detections: output.detections,
        };
        self.predictions
            .save_prediction(&artifact)
            .await
            .map_err(JobError::Persistence)?;

        tracing::info!(
            uid,
            user_id,
            detection_count = artifact.detection_count(),
            "Prediction saved"
        );

        let callback = self.notify(&artifact, payload.callback_url()).await;
        let published = self.publish(&artifact, chat_id).await;

        Ok(JobOutcome::Completed(JobReport {
            artifact,
            callback,
            published,
        }))
    }

    // ---- private helpers ----

    fn drop_job(&self, uid: String, reason: InputError) -> JobOutcome {
        tracing::warn!(uid, reason = %reason, "Dropping job");
        JobOutcome::Dropped { uid, reason }
    }

    async fn prepare_output(
        &self,
        chat_id: Option<&str>,
        input: &Path,
        uid: &str,
    ) -> Result<PathBuf, JobError> {
        let dir = self.layout().predicted_dir_for(chat_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| JobError::OutputDir {
                path: dir.clone(),
                source,
            })?;
        Ok(self.layout().predicted_path(chat_id, input, uid))
    }

    /// `user_id` if given, else the user named `username`, else anonymous.
    async fn resolve_owner(&self, payload: &JobPayload) -> Result<DbId, JobError> {
        if let Some(id) = payload.user_id {
            return Ok(id);
        }
        let resolved = match payload.username() {
            Some(username) => self.identities.resolve_or_create_user(username).await,
            None => self.identities.anonymous_user_id().await,
        };
        resolved.map_err(JobError::Identity)
    }

    async fn notify(&self, artifact: &PredictionArtifact, url: Option<&str>) -> CallbackStatus {
        let summary = CallbackSummary::from_artifact(artifact);
        match self.callback.notify(&summary, url).await {
            Ok(CallbackOutcome::Delivered { status }) => CallbackStatus::Delivered { status },
            Ok(CallbackOutcome::Skipped) => CallbackStatus::Skipped,
            Err(e) => {
                tracing::error!(uid = %artifact.uid, error = %e, "Callback failed");
                CallbackStatus::Failed(e.to_string())
            }
        }
    }

    async fn publish(&self, artifact: &PredictionArtifact, chat_id: Option<&str>) -> bool {
        let event = ImageProcessedEvent::from_artifact(artifact, chat_id);
        match self.publisher.publish(&event).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(uid = %artifact.uid, error = %e, "Failed to publish event");
                false
            }
        }
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
