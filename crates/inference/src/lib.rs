//! Client for the object-detection inference server.
//!
//! - [`api`]: thin HTTP client for the server's `/predict` endpoint.
//! - [`predictor`]: [`yolo_core::traits::Predictor`] implementation that
//!   uploads an image and writes the annotated result to disk.

pub mod api;
pub mod predictor;

pub use api::{InferenceApi, InferenceApiError, PredictResponse};
pub use predictor::HttpPredictor;
