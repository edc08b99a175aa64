use tracing::warn;

use crate::config::contains_unresolved_placeholder;

/// Supplies the bearer token used by the translation transport.
/// How the token was generated or stored is not this module's concern.
pub trait CredentialProvider: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

/// Token fixed at startup, typically from the config file
pub struct StaticCredentials {
    token: Option<String>,
}

impl StaticCredentials {
    pub fn new(token: Option<String>) -> Self {
        let token = token.filter(|t| !t.trim().is_empty()).filter(|t| {
            // An unset `${VAR}` survives config loading verbatim
            if contains_unresolved_placeholder(t) {
                warn!("API key references an unset environment variable; sending no token");
                return false;
            }
            true
        });
        Self { token }
    }
}

impl CredentialProvider for StaticCredentials {
    fn bearer_token(&self) -> Option<String> {
        self.token.clone()
    }
}

/// Token read from an environment variable on every call, so rotation takes effect without restart
pub struct EnvCredentials {
    var_name: String,
}

impl EnvCredentials {
    pub fn new(var_name: impl Into<String>) -> Self {
        Self {
            var_name: var_name.into(),
        }
    }
}

impl CredentialProvider for EnvCredentials {
    fn bearer_token(&self) -> Option<String> {
        std::env::var(&self.var_name)
            .ok()
            .filter(|t| !t.trim().is_empty())
    }
}
