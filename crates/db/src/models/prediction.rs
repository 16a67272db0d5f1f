//! Prediction session and detection rows.

use sqlx::FromRow;
use yolo_core::types::{DbId, Timestamp};

/// Row from `prediction_sessions`.
#[derive(Debug, Clone, FromRow)]
pub struct PredictionSession {
    pub uid: String,
    pub original_image: String,
    pub predicted_image: String,
    pub user_id: DbId,
    pub created_at: Timestamp,
}

/// Row from `detection_objects`.
#[derive(Debug, Clone, FromRow)]
pub struct DetectionObject {
    pub id: DbId,
    pub prediction_uid: String,
    pub label: String,
    pub score: f64,
    /// JSON text of `[x1, y1, x2, y2]`.
    #[sqlx(rename = "box")]
    pub bbox: String,
}
