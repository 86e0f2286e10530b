//! Submission of generated documents

use crate::error::PublishError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Path appended to the publish base URL
pub const SUBMIT_PATH: &str = "/api/submit-llms-txt";

/// Document submission
#[derive(Clone, Serialize)]
pub struct PublishRequest {
    /// Brand domain
    pub domain: String,
    /// Document text
    #[serde(rename = "llms_txt")]
    pub document: String,
    /// Endpoint base URL
    #[serde(skip)]
    pub base_url: String,
    /// Shared secret sent in a header
    #[serde(skip)]
    pub secret: String,
}

impl fmt::Debug for PublishRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublishRequest")
            .field("domain", &self.domain)
            .field("document_len", &self.document.len())
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl PublishRequest {
    /// Full endpoint URL
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}{SUBMIT_PATH}", self.base_url.trim_end_matches('/'))
    }
}

/// Endpoint answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishOutcome {
    /// Endpoint accepted the document
    pub success: bool,
    /// Response body on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    /// Response body on rejection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    /// HTTP status on rejection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl PublishOutcome {
    /// Classify a response: only status 200 counts as accepted
    #[must_use]
    pub fn from_response(status: u16, body: Value) -> Self {
        if status == 200 {
            Self {
                success: true,
                response: Some(body),
                error: None,
                status: None,
            }
        } else {
            Self {
                success: false,
                response: None,
                error: Some(body),
                status: Some(status),
            }
        }
    }
}

/// Sends generated documents to the publishing endpoint
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Submit `request`
    ///
    /// A rejection is an `Ok` outcome with `success == false`; only
    /// transport problems are errors.
    async fn publish(&self, request: &PublishRequest) -> Result<PublishOutcome, PublishError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(base: &str) -> PublishRequest {
        PublishRequest {
            domain: "example.com".into(),
            document: "# Doc".into(),
            base_url: base.into(),
            secret: "s3cret".into(),
        }
    }

    #[test]
    fn endpoint_strips_trailing_slash() {
        assert_eq!(
            request("https://styleguide.fyi/").endpoint(),
            "https://styleguide.fyi/api/submit-llms-txt"
        );
        assert_eq!(
            request("http://localhost:5000").endpoint(),
            "http://localhost:5000/api/submit-llms-txt"
        );
    }

    #[test]
    fn body_has_wire_names_and_no_secret() {
        let body = serde_json::to_value(request("x")).unwrap();
        assert_eq!(body, json!({"domain": "example.com", "llms_txt": "# Doc"}));
        assert!(!format!("{:?}", request("x")).contains("s3cret"));
    }

    #[test]
    fn outcome_classification() {
        let ok = PublishOutcome::from_response(200, json!({"id": 1}));
        assert_eq!(serde_json::to_value(&ok).unwrap(), json!({"success": true, "response": {"id": 1}}));

        let rejected = PublishOutcome::from_response(403, json!({"error": "bad secret"}));
        assert_eq!(
            serde_json::to_value(&rejected).unwrap(),
            json!({"success": false, "error": {"error": "bad secret"}, "status": 403})
        );
    }
}
