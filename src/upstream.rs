use std::time::Duration;

use bytes::Bytes;
use reqwest::{header::CONTENT_TYPE, Client, Url};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::{
    config::RelayConfig,
    error::RelayError,
    models::{ClassificationResult, UploadedImage},
};

pub const PREDICTION_KEY_HEADER: &str = "Prediction-Key";
const UPSTREAM_ERROR: &str = "Upstream classification API error";

/// Client for the cloud prediction endpoint. One instance is shared by every
/// worker, so requests reuse its connection pool.
#[derive(Debug)]
pub struct UpstreamClient {
    client: Client,
    url: Url,
    prediction_key: String,
    timeout: Duration,
}

impl UpstreamClient {
    pub fn new(config: &RelayConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(config.upstream_timeout).build()?;

        Ok(Self {
            client,
            url: config.prediction_url()?,
            prediction_key: config.prediction_key.clone(),
            timeout: config.upstream_timeout,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Sends the raw image bytes upstream and returns its predictions sorted
    /// by descending probability.
    pub async fn predict(&self, image: UploadedImage) -> Result<ClassificationResult, RelayError> {
        info!(
            "Forwarding {} bytes ({}) to {}",
            image.bytes.len(),
            image.content_type.as_deref().unwrap_or("unknown type"),
            self.url
        );

        let response = self
            .client
            .post(self.url.clone())
            .header(PREDICTION_KEY_HEADER, &self.prediction_key)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(image.bytes)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            let detail = error_detail(&body);
            warn!("Upstream returned {status}: {detail:?}");
            return Err(RelayError::Upstream {
                status: status.as_u16(),
                message: UPSTREAM_ERROR.to_string(),
                detail,
            });
        }

        let payload: Value = serde_json::from_slice(&body).map_err(|e| {
            error!("Upstream returned malformed JSON: {e}");
            RelayError::Transport {
                detail: format!("Upstream returned malformed JSON: {e}"),
            }
        })?;

        Ok(ClassificationResult::from_upstream(&payload))
    }

    fn transport_error(&self, e: reqwest::Error) -> RelayError {
        let detail = if e.is_timeout() {
            format!("Upstream request timed out after {:?}", self.timeout)
        } else if e.is_connect() {
            format!("Could not connect to upstream: {e}")
        } else {
            format!("Upstream request failed: {e}")
        };

        error!("{detail}");
        RelayError::Transport { detail }
    }
}

/// Upstream error bodies are passed through as JSON when they parse, as text
/// otherwise, and dropped when empty.
fn error_detail(body: &Bytes) -> Option<Value> {
    if body.is_empty() {
        return None;
    }

    serde_json::from_slice(body).ok().or_else(|| {
        Some(Value::String(
            String::from_utf8_lossy(body).trim().to_string(),
        ))
    })
}
