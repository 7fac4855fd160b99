use serde::{Deserialize, Serialize};

pub const DEFAULT_UPSTREAM_URL: &str = "https://api.github.com";

/// Reverse proxy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Whether to listen on all interfaces
    /// - false: 127.0.0.1 only
    /// - true: 0.0.0.0
    #[serde(default)]
    pub allow_lan_access: bool,

    /// Listening port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log every request, and log the body of upstream error responses
    #[serde(default)]
    pub log_requests: bool,

    /// Upstream API base URL (scheme + host)
    #[serde(default = "default_upstream_url")]
    pub upstream_url: String,

    /// Maximum number of upstream calls in flight at once
    #[serde(default = "default_max_concurrent_upstream")]
    pub max_concurrent_upstream: usize,

    /// Upstream request timeout (seconds). Unset means no timeout: a hung
    /// upstream call keeps the gate closed until it returns.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// Port for the metrics/health listener; `None` disables it
    #[serde(default = "default_metrics_port")]
    pub metrics_port: Option<u16>,

    /// Outbound proxy for upstream calls
    #[serde(default)]
    pub upstream_proxy: UpstreamProxyConfig,
}

/// Outbound proxy configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpstreamProxyConfig {
    pub enabled: bool,
    /// Proxy address (http://, https://, socks5://)
    pub url: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            allow_lan_access: false,
            port: default_port(),
            log_requests: false,
            upstream_url: default_upstream_url(),
            max_concurrent_upstream: default_max_concurrent_upstream(),
            request_timeout_secs: None,
            metrics_port: default_metrics_port(),
            upstream_proxy: UpstreamProxyConfig::default(),
        }
    }
}

fn default_port() -> u16 {
    3180
}

fn default_upstream_url() -> String {
    DEFAULT_UPSTREAM_URL.to_string()
}

fn default_max_concurrent_upstream() -> usize {
    1
}

fn default_metrics_port() -> Option<u16> {
    Some(6060)
}

impl ProxyConfig {
    /// Actual listening address
    pub fn get_bind_address(&self) -> &str {
        if self.allow_lan_access {
            "0.0.0.0"
        } else {
            "127.0.0.1"
        }
    }
}
