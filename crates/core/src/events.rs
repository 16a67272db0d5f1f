//! Outbound messages produced by a completed job.
//!
//! [`ImageProcessedEvent`] goes to the topic exchange for downstream
//! services; [`CallbackSummary`] goes to the per-job or default callback URL.

use serde::{Deserialize, Serialize};

use crate::prediction::PredictionArtifact;
use crate::types::DbId;

/// Routing key of the domain event published after each completed job.
pub const IMAGES_PROCESSED: &str = "images.processed";

/// Domain event published once per successfully processed job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageProcessedEvent {
    pub prediction_uid: String,
    pub user_id: DbId,
    pub labels: Vec<String>,
    pub detection_count: usize,
    /// Serialized as `null` when the job had no chat namespace.
    pub chat_id: Option<String>,
}

impl ImageProcessedEvent {
    pub fn from_artifact(artifact: &PredictionArtifact, chat_id: Option<&str>) -> Self {
        Self {
            prediction_uid: artifact.uid.clone(),
            user_id: artifact.user_id,
            labels: artifact.labels(),
            detection_count: artifact.detection_count(),
            chat_id: chat_id.map(str::to_owned),
        }
    }

    /// Routing key this event is published under.
    pub fn routing_key(&self) -> &'static str {
        IMAGES_PROCESSED
    }
}

/// JSON body POSTed to the completion callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackSummary {
    pub prediction_uid: String,
    pub user_id: DbId,
    pub labels: Vec<String>,
    pub detection_count: usize,
    pub predicted_path: String,
}

impl CallbackSummary {
    pub fn from_artifact(artifact: &PredictionArtifact) -> Self {
        Self {
            prediction_uid: artifact.uid.clone(),
            user_id: artifact.user_id,
            labels: artifact.labels(),
            detection_count: artifact.detection_count(),
            predicted_path: artifact.predicted_image.clone(),
        }
    }
}

/// Result of a callback attempt that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// The target answered with a 2xx status.
    Delivered { status: u16 },
    /// No target URL was configured; the summary was logged instead.
    Skipped,
}
