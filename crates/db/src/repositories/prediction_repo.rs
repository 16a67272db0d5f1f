//! Repository for `prediction_sessions` and `detection_objects`.

use sqlx::PgPool;
use yolo_core::prediction::PredictionArtifact;

use crate::models::prediction::{DetectionObject, PredictionSession};

const SESSION_COLUMNS: &str = "uid, original_image, predicted_image, user_id, created_at";
const DETECTION_COLUMNS: &str = "id, prediction_uid, label, score, box";

/// Persistence of completed predictions.
pub struct PredictionRepo;

impl PredictionRepo {
    /// Insert the session row and one detection row per detection in a
    /// single transaction. Nothing is written if any insert fails.
    pub async fn create_with_detections(
        pool: &PgPool,
        artifact: &PredictionArtifact,
    ) -> Result<PredictionSession, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO prediction_sessions (uid, original_image, predicted_image, user_id)
             VALUES ($1, $2, $3, $4)
             RETURNING {SESSION_COLUMNS}"
        );
        let session = sqlx::query_as::<_, PredictionSession>(&query)
            .bind(&artifact.uid)
            .bind(&artifact.original_image)
            .bind(&artifact.predicted_image)
            .bind(artifact.user_id)
            .fetch_one(&mut *tx)
            .await?;

        for detection in &artifact.detections {
            sqlx::query(
                "INSERT INTO detection_objects (prediction_uid, label, score, box)
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(&artifact.uid)
            .bind(&detection.label)
            .bind(detection.score)
            .bind(detection.box_text())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(session)
    }

    /// Find a session by uid.
    pub async fn find_by_uid(
        pool: &PgPool,
        uid: &str,
    ) -> Result<Option<PredictionSession>, sqlx::Error> {
        let query = format!("SELECT {SESSION_COLUMNS} FROM prediction_sessions WHERE uid = $1");
        sqlx::query_as::<_, PredictionSession>(&query)
            .bind(uid)
            .fetch_optional(pool)
            .await
    }

    /// List the detections of a session in insertion order.
    pub async fn list_detections(
        pool: &PgPool,
        prediction_uid: &str,
    ) -> Result<Vec<DetectionObject>, sqlx::Error> {
        let query = format!(
            "SELECT {DETECTION_COLUMNS} FROM detection_objects
             WHERE prediction_uid = $1
             ORDER BY id"
        );
        sqlx::query_as::<_, DetectionObject>(&query)
            .bind(prediction_uid)
            .fetch_all(pool)
            .await
    }
}
