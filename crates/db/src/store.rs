//! Postgres-backed implementations of the pipeline's repository traits.

use async_trait::async_trait;
use yolo_core::error::RepositoryError;
use yolo_core::prediction::PredictionArtifact;
use yolo_core::traits::{IdentityStore, PredictionRepository};
use yolo_core::types::DbId;

use crate::models::user::{ANONYMOUS_USERNAME, PLACEHOLDER_PASSWORD};
use crate::repositories::{PredictionRepo, UserRepo};
use crate::DbPool;

/// Prediction repository and identity store over one connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PredictionRepository for PgStore {
    async fn save_prediction(&self, artifact: &PredictionArtifact) -> Result<(), RepositoryError> {
        PredictionRepo::create_with_detections(&self.pool, artifact)
            .await
            .map_err(|e| classify(e, &artifact.uid))?;

        tracing::debug!(
            uid = %artifact.uid,
            detections = artifact.detections.len(),
            "Prediction persisted"
        );
        Ok(())
    }
}

#[async_trait]
impl IdentityStore for PgStore {
    async fn resolve_or_create_user(&self, username: &str) -> Result<DbId, RepositoryError> {
        let user = UserRepo::find_or_create(&self.pool, username, PLACEHOLDER_PASSWORD)
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;
        Ok(user.id)
    }

    async fn anonymous_user_id(&self) -> Result<DbId, RepositoryError> {
        self.resolve_or_create_user(ANONYMOUS_USERNAME).await
    }
}

/// Map a sqlx error from the prediction insert into a [`RepositoryError`].
///
/// A unique violation on the session primary key (SQLSTATE 23505) means
/// the uid was already persisted.
fn classify(err: sqlx::Error, uid: &str) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            return RepositoryError::Duplicate(uid.to_owned());
        }
    }
    RepositoryError::Database(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn non_database_errors_are_generic() {
        let err = classify(sqlx::Error::RowNotFound, "abc");
        assert_matches!(err, RepositoryError::Database(_));
    }

    #[test]
    fn pool_timeout_is_generic() {
        let err = classify(sqlx::Error::PoolTimedOut, "abc");
        assert_matches!(err, RepositoryError::Database(msg) if msg.contains("timed out"));
    }
}
