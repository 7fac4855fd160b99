use crate::proxy::authenticator::CredentialsSnapshot;
use crate::proxy::ProxyConfig;
use serde::{Deserialize, Serialize};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub proxy: ProxyConfig,
    /// GitHub OAuth application client id, injected for higher rate limits
    #[serde(default)]
    pub github_client_id: Option<String>,
    #[serde(default)]
    pub github_client_secret: Option<String>,
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn credentials(&self) -> CredentialsSnapshot {
        CredentialsSnapshot {
            client_id: self.github_client_id.clone(),
            client_secret: self.github_client_secret.clone(),
        }
    }
}
