//! REST client for the inference server.
//!
//! The server exposes a single `POST /predict` endpoint taking the image as
//! a multipart `file` field and answering with the detections plus the
//! annotated image encoded as base64 JPEG.

use std::time::Duration;

use serde::Deserialize;
use yolo_core::prediction::Detection;

/// Time allowed to establish the TCP/TLS connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Total time allowed for one `/predict` round trip, upload included.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// HTTP client for a single inference server.
pub struct InferenceApi {
    client: reqwest::Client,
    api_url: String,
}

/// Body of a successful `/predict` response.
#[derive(Debug, Deserialize)]
pub struct PredictResponse {
    /// Detections in model order.
    #[serde(default)]
    pub detections: Vec<Detection>,
    /// Object count as reported by the server, if it sends one.
    #[serde(default)]
    pub count: Option<usize>,
    /// Annotated image, base64-encoded JPEG.
    pub annotated_image: String,
}

/// Errors from the inference REST layer.
#[derive(Debug, thiserror::Error)]
pub enum InferenceApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server returned a non-2xx status code.
    #[error("Inference API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

impl InferenceApi {
    /// Create a new API client with [`DEFAULT_REQUEST_TIMEOUT`].
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://localhost:8000`.
    pub fn new(api_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        Self::with_timeout(api_url, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a client whose requests fail once `timeout` has elapsed.
    pub fn with_timeout(
        api_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .timeout(timeout)
            .build()?;
        Ok(Self::with_client(client, api_url))
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self { client, api_url }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Upload one image for detection.
    ///
    /// Sends `POST /predict` with the bytes as the multipart `file` field.
    pub async fn predict(
        &self,
        file_name: &str,
        image: Vec<u8>,
    ) -> Result<PredictResponse, InferenceApiError> {
        let part = reqwest::multipart::Part::bytes(image).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(format!("{}/predict", self.api_url))
            .multipart(form)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    /// Return the response unchanged on success, or an
    /// [`InferenceApiError::ApiError`] with the status and body text.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, InferenceApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(InferenceApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, InferenceApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}
