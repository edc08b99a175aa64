use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Request body for the remote translation API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationRequest {
    pub text: String,
    pub source_language: String,
    pub target_language: String,
}

impl TranslationRequest {
    pub fn new(
        text: impl Into<String>,
        source_language: impl Into<String>,
        target_language: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            source_language: source_language.into(),
            target_language: target_language.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationData {
    pub translated_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// Response envelope returned by the translation API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<TranslationData>,
}

impl TranslationResponse {
    /// Anything other than `status == "success"` with a `data` payload is an API failure.
    pub fn into_result(self) -> Result<TranslationData, TranslateError> {
        match (self.status.as_str(), self.data) {
            ("success", Some(data)) => Ok(data),
            _ => Err(TranslateError::Api(
                self.message.unwrap_or_else(|| "Unknown error".to_string()),
            )),
        }
    }
}

/// The display string is what ends up in the conversation log.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TranslateError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("{0}")]
    Api(String),
    #[error("malformed response: {0}")]
    Decode(String),
}

#[async_trait]
pub trait TranslationClient: Send + Sync {
    /// Translate a single utterance. Dropping the returned future abandons the call.
    async fn translate(
        &self,
        request: &TranslationRequest,
    ) -> Result<TranslationData, TranslateError>;
}
