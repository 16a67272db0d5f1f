//! Error types shared across the pipeline.
//!
//! Each external collaborator has its own error enum so the job handler can
//! classify a failure by the stage it came from. Adapters map their native
//! errors (sqlx, reqwest, lapin, aws-sdk) into these with a message string.

use std::path::PathBuf;

/// Startup failures of the binaries.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A required environment variable is missing or unparsable.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Failure to fetch an object from the object store.
#[derive(Debug, thiserror::Error)]
pub enum ObjectStoreError {
    /// Bucket or region is missing from the environment.
    #[error("Object store is not configured")]
    NotConfigured,

    #[error("Failed to download '{key}': {message}")]
    Download { key: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure reported by the inference engine.
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Cannot read input image {path}: {source}")]
    UnreadableInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Inference backend error: {0}")]
    Backend(String),

    #[error("Failed to write annotated image {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure in the repository or identity store.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// A prediction with this uid already exists.
    #[error("Prediction '{0}' already exists")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(String),
}

/// Failure to publish a domain event.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Broker error: {0}")]
    Broker(String),
}

/// Failure to deliver a completion callback.
#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    /// Network, DNS, TLS or timeout failure.
    #[error("Callback request failed: {0}")]
    Request(String),

    /// The remote server returned a non-2xx status code.
    #[error("Callback returned HTTP {0}")]
    HttpStatus(u16),
}
