// Upstream client implementation
// Thin wrapper around reqwest that targets the configured API host

use reqwest::{header::HeaderMap, Client, Method, Response};
use tokio::time::Duration;

use crate::error::{AppError, AppResult};
use crate::proxy::config::ProxyConfig;

/// Projection of an inbound request onto the upstream host.
pub struct OutboundRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Option<reqwest::Body>,
}

pub struct UpstreamClient {
    http_client: Client,
    base_url: String,
}

impl UpstreamClient {
    pub fn new(config: &ProxyConfig) -> AppResult<Self> {
        let mut builder = Client::builder();

        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        let proxy_config = &config.upstream_proxy;
        if proxy_config.enabled && !proxy_config.url.is_empty() {
            let proxy = reqwest::Proxy::all(&proxy_config.url)?;
            builder = builder.proxy(proxy);
            tracing::info!("UpstreamClient enabled proxy: {}", proxy_config.url);
        }

        let base_url = config.upstream_url.trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(AppError::Config(format!(
                "upstream_url must be an http(s) URL: {}",
                config.upstream_url
            )));
        }

        Ok(Self {
            http_client: builder.build()?,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the upstream URL from the raw path and query. reqwest reparses it:
    /// dot segments are resolved and `'` or non-ASCII query bytes get percent-encoded.
    fn build_url(&self, path: &str, query: Option<&str>) -> String {
        match query {
            Some(qs) if !qs.is_empty() => format!("{}{}?{}", self.base_url, path, qs),
            _ => format!("{}{}", self.base_url, path),
        }
    }

    /// Issue the call. Resolves once response headers are in; the body is
    /// left on the returned `Response` for the caller to stream.
    pub async fn send(&self, request: OutboundRequest) -> Result<Response, reqwest::Error> {
        let url = self.build_url(&request.path, request.query.as_deref());
        let mut builder = self
            .http_client
            .request(request.method, url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        builder.send().await
    }
}
