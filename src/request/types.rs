use crate::config::InferenceConfig;
use serde::{Deserialize, Serialize};

/// A single inference request as passed on the command line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(rename = "modelId")]
    pub model_id: String,
    pub message: String,
    pub config: InferenceConfig,
}

/// The one line printed to stdout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InferenceOutcome {
    Response { response: String },
    Error { error: String },
}

impl InferenceOutcome {
    pub fn response(text: impl Into<String>) -> Self {
        Self::Response {
            response: text.into(),
        }
    }

    pub fn error(err: impl ToString) -> Self {
        Self::Error {
            error: err.to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            serde_json::json!({ "error": format!("Serialization error: {e}") }).to_string()
        })
    }
}
