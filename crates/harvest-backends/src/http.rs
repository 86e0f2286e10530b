//! HTTP document publisher

use async_trait::async_trait;
use harvest_core::{PublishError, PublishOutcome, PublishRequest, Publisher};
use serde_json::Value;
use std::time::Duration;

/// Header carrying the shared secret
pub const SECRET_HEADER: &str = "X-Actor-Secret";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Posts documents as JSON
#[derive(Debug, Clone)]
pub struct HttpPublisher {
    client: reqwest::Client,
}

impl HttpPublisher {
    /// Create publisher with default timeout
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built
    pub fn new() -> Result<Self, PublishError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Create publisher with request timeout
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built
    pub fn with_timeout(timeout: Duration) -> Result<Self, PublishError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PublishError::Misconfigured(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Publisher for HttpPublisher {
    async fn publish(&self, request: &PublishRequest) -> Result<PublishOutcome, PublishError> {
        let url = request.endpoint();
        let response = self
            .client
            .post(&url)
            .header(SECRET_HEADER, &request.secret)
            .json(request)
            .send()
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
        tracing::debug!(%url, status, "publish response");

        Ok(PublishOutcome::from_response(status, body))
    }
}
