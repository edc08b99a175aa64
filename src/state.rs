use std::sync::Arc;
use dashmap::DashMap;
use tokio::sync::watch;
use uuid::Uuid;

use crate::config::Config;
use crate::connectivity::{ConnectivityMonitor, ConnectivityStatus};
use crate::credentials::{CredentialProvider, EnvCredentials, StaticCredentials};
use crate::conversation::TranslationSession;
use crate::translate::{HttpTranslationClient, TranslationClient};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub translator: Arc<dyn TranslationClient>,
    /// One session per connected client
    pub sessions: Arc<DashMap<String, Arc<TranslationSession>>>,
    pub connectivity: watch::Receiver<ConnectivityStatus>,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let credentials: Arc<dyn CredentialProvider> =
            match &config.translation_config.api_key_env {
                Some(var) => Arc::new(EnvCredentials::new(var.clone())),
                None => Arc::new(StaticCredentials::new(
                    config.translation_config.api_key.clone(),
                )),
            };
        let translator = Arc::new(HttpTranslationClient::new(
            &config.translation_config,
            credentials,
        )?);

        let monitor = ConnectivityMonitor::new(config.health_url(), &config.connectivity_config)?;
        let connectivity = monitor.spawn();

        Ok(Self::with_parts(config, translator, connectivity))
    }

    pub fn with_parts(
        config: Config,
        translator: Arc<dyn TranslationClient>,
        connectivity: watch::Receiver<ConnectivityStatus>,
    ) -> Self {
        Self {
            config,
            translator,
            sessions: Arc::new(DashMap::new()),
            connectivity,
        }
    }

    pub fn generate_client_uid(&self) -> String {
        Uuid::new_v4().to_string()
    }
}
