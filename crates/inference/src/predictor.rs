//! [`Predictor`] backed by the inference server.

use std::path::Path;

use async_trait::async_trait;
use base64::Engine;
use yolo_core::error::InferenceError;
use yolo_core::prediction::InferenceOutput;
use yolo_core::traits::Predictor;

use crate::api::InferenceApi;

/// Default server address when `INFERENCE_URL` is unset.
pub const DEFAULT_INFERENCE_URL: &str = "http://localhost:8000";

pub struct HttpPredictor {
    api: InferenceApi,
}

impl HttpPredictor {
    pub fn new(api: InferenceApi) -> Self {
        Self { api }
    }

    /// Read the server address from `INFERENCE_URL`.
    pub fn from_env() -> Result<Self, reqwest::Error> {
        let url =
            std::env::var("INFERENCE_URL").unwrap_or_else(|_| DEFAULT_INFERENCE_URL.to_string());
        Ok(Self::new(InferenceApi::new(url)?))
    }
}

#[async_trait]
impl Predictor for HttpPredictor {
    async fn predict(&self, input: &Path, dest: &Path) -> Result<InferenceOutput, InferenceError> {
        let image = tokio::fs::read(input)
            .await
            .map_err(|source| InferenceError::UnreadableInput {
                path: input.to_path_buf(),
                source,
            })?;

        let file_name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image.jpg".to_string());

        let response = self
            .api
            .predict(&file_name, image)
            .await
            .map_err(|e| InferenceError::Backend(e.to_string()))?;

        let annotated = base64::engine::general_purpose::STANDARD
            .decode(response.annotated_image.as_bytes())
            .map_err(|e| InferenceError::Backend(format!("invalid annotated image: {e}")))?;

        tokio::fs::write(dest, &annotated)
            .await
            .map_err(|source| InferenceError::Output {
                path: dest.to_path_buf(),
                source,
            })?;

        let count = response.count.unwrap_or(response.detections.len());
        tracing::debug!(
            input = %input.display(),
            dest = %dest.display(),
            count,
            "Inference completed"
        );

        Ok(InferenceOutput {
            detections: response.detections,
            count,
        })
    }
}
