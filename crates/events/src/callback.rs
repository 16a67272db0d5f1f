//! Completion callback delivery.
//!
//! [`CallbackDispatcher`] POSTs a [`CallbackSummary`] to the job's own
//! callback URL or the configured default. Delivery is a single attempt:
//! failures are returned to the caller to log and never retried.

use std::time::Duration;

use async_trait::async_trait;
use yolo_core::error::CallbackError;
use yolo_core::events::{CallbackOutcome, CallbackSummary};
use yolo_core::traits::CallbackNotifier;

/// Time allowed to establish the TCP/TLS connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Total time allowed for one callback request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// CallbackDispatcher
// ---------------------------------------------------------------------------

pub struct CallbackDispatcher {
    client: reqwest::Client,
    default_url: Option<String>,
}

impl CallbackDispatcher {
    /// Create a dispatcher that falls back to `default_url` when a job does
    /// not carry its own callback URL.
    pub fn new(default_url: Option<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            default_url: default_url.filter(|u| !u.trim().is_empty()),
        })
    }

    /// Read the default target from `CALLBACK_URL`.
    pub fn from_env() -> Result<Self, reqwest::Error> {
        Self::new(std::env::var("CALLBACK_URL").ok())
    }

    pub fn default_url(&self) -> Option<&str> {
        self.default_url.as_deref()
    }

    /// Execute a single POST request and check the response status.
    async fn send(&self, url: &str, summary: &CallbackSummary) -> Result<u16, CallbackError> {
        let response = self
            .client
            .post(url)
            .json(summary)
            .send()
            .await
            .map_err(|e| CallbackError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CallbackError::HttpStatus(status.as_u16()));
        }
        Ok(status.as_u16())
    }
}

#[async_trait]
impl CallbackNotifier for CallbackDispatcher {
    async fn notify(
        &self,
        summary: &CallbackSummary,
        url_override: Option<&str>,
    ) -> Result<CallbackOutcome, CallbackError> {
        let Some(url) = url_override.or(self.default_url()) else {
            tracing::info!(
                prediction_uid = %summary.prediction_uid,
                user_id = summary.user_id,
                labels = ?summary.labels,
                detection_count = summary.detection_count,
                predicted_path = %summary.predicted_path,
                "No callback URL configured, prediction summary"
            );
            return Ok(CallbackOutcome::Skipped);
        };

        let status = self.send(url, summary).await?;
        tracing::debug!(prediction_uid = %summary.prediction_uid, url, status, "Callback delivered");
        Ok(CallbackOutcome::Delivered { status })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
