use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::interface::{
    TranslateError, TranslationClient, TranslationData, TranslationRequest, TranslationResponse,
};
use crate::config::TranslationConfig;
use crate::credentials::CredentialProvider;

/// Translation client that talks to the remote HTTP API
pub struct HttpTranslationClient {
    client: Client,
    url: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl HttpTranslationClient {
    pub fn new(
        config: &TranslationConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: config.endpoint_url(),
            credentials,
        })
    }
}

#[async_trait]
impl TranslationClient for HttpTranslationClient {
    async fn translate(
        &self,
        request: &TranslationRequest,
    ) -> Result<TranslationData, TranslateError> {
        debug!(
            "Sending translation request: {} -> {}, {} chars",
            request.source_language,
            request.target_language,
            request.text.chars().count()
        );

        let mut builder = self.client.post(&self.url).json(request);
        if let Some(token) = self.credentials.bearer_token() {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TranslateError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| TranslateError::Transport(e.to_string()))?;

        // Error envelopes are honoured even on non-2xx responses
        match serde_json::from_slice::<TranslationResponse>(&body) {
            Ok(envelope) => envelope.into_result(),
            Err(_) if !status.is_success() => {
                warn!("Translation API returned {} with an unreadable body", status);
                Err(TranslateError::Api(format!("HTTP {}", status.as_u16())))
            }
            Err(e) => Err(TranslateError::Decode(e.to_string())),
        }
    }
}
