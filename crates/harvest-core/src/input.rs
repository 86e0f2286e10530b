//! Run input and mode selection

use crate::error::HarvestError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Input of one run
///
/// Field names follow the camelCase JSON the platform sends. The publish
/// fields also accept their legacy `flaskApi*` names.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunInput {
    /// Task for capture mode
    pub task: Option<String>,
    /// Starting URL for capture mode
    pub url: Option<String>,
    /// Agent credential, overrides the environment
    pub anthropic_api_key: Option<String>,
    /// Store id handed over by a webhook
    pub default_key_value_store_id: Option<String>,
    /// Store id given directly
    pub kv_store_id: Option<String>,
    /// Brand domain for generation mode
    pub domain: Option<String>,
    /// Publish endpoint base URL
    #[serde(alias = "flaskApiUrl")]
    pub publish_url: Option<String>,
    /// Publish secret
    #[serde(alias = "flaskApiSecret")]
    pub publish_secret: Option<String>,
    /// Dataset receiving the result record
    pub output_dataset_id: Option<String>,
}

impl fmt::Debug for RunInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunInput")
            .field("task", &self.task)
            .field("url", &self.url)
            .field("has_api_key", &self.anthropic_api_key.is_some())
            .field("store_id", &self.store_id())
            .field("domain", &self.domain)
            .field("publish_url", &self.publish_url)
            .field("has_publish_secret", &self.publish_secret.is_some())
            .field("output_dataset_id", &self.output_dataset_id)
            .finish()
    }
}

/// Selected operating mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// Generate a document from an existing store
    Generate {
        /// Store holding the source files
        store_id: String,
        /// Brand domain
        domain: String,
    },
    /// Run a task and capture its outputs
    Capture {
        /// Task text
        task: String,
        /// Optional starting URL
        url: Option<String>,
    },
}

impl RunMode {
    /// Short name for logs
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Generate { .. } => "generate",
            Self::Capture { .. } => "capture",
        }
    }
}

fn present(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.trim().is_empty())
}

impl RunInput {
    /// Parse input JSON
    ///
    /// # Errors
    /// Returns `HarvestError::InvalidInput` if the JSON does not match
    pub fn from_value(value: Value) -> Result<Self, HarvestError> {
        serde_json::from_value(value).map_err(|e| HarvestError::InvalidInput(e.to_string()))
    }

    /// Store id, webhook id first
    #[must_use]
    pub fn store_id(&self) -> Option<&str> {
        present(self.default_key_value_store_id.as_ref()).or(present(self.kv_store_id.as_ref()))
    }

    /// Check whether the stored `INPUT` record must be consulted
    #[must_use]
    pub fn needs_stored_input(&self) -> bool {
        self.store_id().is_some() && present(self.domain.as_ref()).is_none()
    }

    /// Fill gaps from a stored `INPUT` record
    ///
    /// Values already present win. Non-string values are ignored.
    pub fn merge_stored(&mut self, stored: &Value) {
        let field = |names: &[&str]| {
            names.iter().find_map(|name| match stored.get(*name) {
                Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
                Some(Value::Null) | None => None,
                Some(_) => {
                    tracing::warn!(field = *name, "Ignoring non-string value in stored input");
                    None
                }
            })
        };

        if present(self.domain.as_ref()).is_none() {
            self.domain = field(&["domain"]);
        }
        if present(self.publish_secret.as_ref()).is_none() {
            self.publish_secret = field(&["publishSecret", "flaskApiSecret"]);
        }
        if present(self.anthropic_api_key.as_ref()).is_none() {
            self.anthropic_api_key = field(&["anthropicApiKey"]);
        }
        tracing::info!(
            domain = ?self.domain,
            has_publish_secret = self.publish_secret.is_some(),
            has_api_key = self.anthropic_api_key.is_some(),
            "Merged stored input"
        );
    }

    /// Select the operating mode
    ///
    /// # Errors
    /// Returns `HarvestError::InvalidInput` when neither store id plus
    /// domain nor a task is given
    pub fn mode(&self) -> Result<RunMode, HarvestError> {
        if let (Some(store_id), Some(domain)) = (self.store_id(), present(self.domain.as_ref())) {
            return Ok(RunMode::Generate {
                store_id: store_id.to_string(),
                domain: domain.to_string(),
            });
        }
        if let Some(task) = present(self.task.as_ref()) {
            return Ok(RunMode::Capture {
                task: task.to_string(),
                url: present(self.url.as_ref()).map(str::to_string),
            });
        }
        Err(HarvestError::InvalidInput(
            "must provide either (kvStoreId + domain) or (task)".to_string(),
        ))
    }
}
