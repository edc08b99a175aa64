use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub system_config: SystemConfig,
    pub translation_config: TranslationConfig,
    #[serde(default)]
    pub connectivity_config: ConnectivityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    12393
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationConfig {
    pub base_url: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Bearer token; `${VAR}` placeholders are expanded at load time
    #[serde(default)]
    pub api_key: Option<String>,
    /// When set, the token is re-read from this env var on every request
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_source_language")]
    pub source_language: String,
    #[serde(default = "default_target_language")]
    pub target_language: String,
    #[serde(default = "default_translation_timeout")]
    pub timeout_secs: u64,
}

fn default_endpoint() -> String {
    "/translate".to_string()
}

fn default_source_language() -> String {
    "en".to_string()
}

fn default_target_language() -> String {
    "yo".to_string()
}

fn default_translation_timeout() -> u64 {
    30
}

impl TranslationConfig {
    pub fn endpoint_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if self.endpoint.starts_with('/') {
            format!("{}{}", base, self.endpoint)
        } else {
            format!("{}/{}", base, self.endpoint)
        }
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            endpoint: default_endpoint(),
            api_key: None,
            api_key_env: None,
            source_language: default_source_language(),
            target_language: default_target_language(),
            timeout_secs: default_translation_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectivityConfig {
    /// Health check target; falls back to the translation base URL
    #[serde(default)]
    pub health_url: Option<String>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_weak_latency")]
    pub weak_latency_ms: u64,
    #[serde(default = "default_check_timeout")]
    pub timeout_secs: u64,
}

fn default_poll_interval() -> u64 {
    5
}

fn default_weak_latency() -> u64 {
    1500
}

fn default_check_timeout() -> u64 {
    5
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            health_url: None,
            poll_interval_secs: default_poll_interval(),
            weak_latency_ms: default_weak_latency(),
            timeout_secs: default_check_timeout(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            anyhow::bail!("Configuration file not found: {}", path);
        }

        let bytes = fs::read(path)?;
        // decode() strips a UTF-8 BOM if one is present
        let (content, _, had_errors) = encoding_rs::UTF_8.decode(&bytes);
        if had_errors {
            tracing::warn!("Configuration file {} contains invalid UTF-8", path);
        }
        let content = substitute_env_vars(&content)?;

        let path_lower = path.to_lowercase();
        let config = if path_lower.ends_with(".json") {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };
        Ok(config)
    }

    /// The health check URL for the connectivity monitor
    pub fn health_url(&self) -> String {
        self.connectivity_config
            .health_url
            .clone()
            .unwrap_or_else(|| self.translation_config.base_url.clone())
    }
}

const ENV_PLACEHOLDER: &str = r"\$\{(\w+)\}";

/// Replace `${VAR_NAME}` with the value of the environment variable, leaving unknown names intact
pub fn substitute_env_vars(content: &str) -> Result<String> {
    let pattern = Regex::new(ENV_PLACEHOLDER)?;
    let replaced = pattern.replace_all(content, |caps: &regex::Captures| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    });
    Ok(replaced.into_owned())
}

/// True when a value still holds a `${VAR}` that `substitute_env_vars` could not resolve
pub fn contains_unresolved_placeholder(value: &str) -> bool {
    Regex::new(ENV_PLACEHOLDER)
        .map(|pattern| pattern.is_match(value))
        .unwrap_or(false)
}
