//! HTTP client for the detection service.
//!
//! This module posts batches of feature records to `/predict_batch` and
//! decodes the returned verdict. Every call is bounded by the configured
//! timeout; failures end the current pass and are never retried here.

use std::future::Future;
use std::time::Duration;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use crate::models::{FeatureRecord, Verdict};
use crate::utils::endpoint_url;

/// Errors that can occur while talking to the detection service
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Connection to detection service failed: {0}")]
    Connection(#[source] reqwest::Error),
    #[error("Detection service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Invalid verdict: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Anything that can turn a batch of records into a verdict
pub trait BatchSubmitter {
    fn submit(&self, records: Vec<FeatureRecord>) -> impl Future<Output = Result<Verdict, TransportError>> + Send;
}

#[derive(Debug, Deserialize)]
struct HealthBody {
    status: String,
}

/// Detection service client
#[derive(Debug, Clone)]
pub struct DetectionClient {
    /// HTTP client
    client: Client,
    /// Full URL of the predict_batch endpoint
    predict_url: String,
    /// Full URL of the health endpoint
    health_url: String,
    /// Request timeout
    timeout: Duration,
}

impl DetectionClient {
    /// Create a new client for the service at `base_url`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(TransportError::Client)?;
        Ok(Self {
            client,
            predict_url: endpoint_url(base_url, "predict_batch"),
            health_url: endpoint_url(base_url, "health"),
            timeout,
        })
    }

    /// Send a batch and decode the verdict
    ///
    /// # Returns
    ///
    /// * `Ok(Verdict)` if the service answered with a 2xx status and a valid body
    /// * `Err(TransportError::Status)` for any other status, carrying the body
    /// * `Err(TransportError::Timeout)` / `Err(TransportError::Connection)` if the call did not complete
    /// * `Err(TransportError::Decode)` if the body is not a verdict
    pub async fn predict_batch(&self, records: &[FeatureRecord]) -> Result<Verdict, TransportError> {
        let response = self
            .client
            .post(&self.predict_url)
            .json(records)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.request_error(e))?;
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// True when the service answers `/health` with `healthy`
    pub async fn health(&self) -> Result<bool, TransportError> {
        let response = self
            .client
            .get(&self.health_url)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| self.request_error(e))?;
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let health: HealthBody = serde_json::from_str(&body)?;
        Ok(health.status == "healthy")
    }

    pub fn predict_url(&self) -> &str {
        &self.predict_url
    }

    fn request_error(&self, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout(self.timeout)
        } else {
            TransportError::Connection(e)
        }
    }
}

impl BatchSubmitter for DetectionClient {
    async fn submit(&self, records: Vec<FeatureRecord>) -> Result<Verdict, TransportError> {
        self.predict_batch(&records).await
    }
}
