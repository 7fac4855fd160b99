use crate::error::{AppError, AppResult};
use crate::proxy::{
    authenticator::CredentialWatcher, common::gate::SerializationGate, config::ProxyConfig,
    metrics::MetricsExporter, rate_limit::RateLimitRegistry, upstream::client::UpstreamClient,
};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

/// Axum application state
///
/// Built once at startup and shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub rate_limits: Arc<RateLimitRegistry>,
    pub credentials: Arc<CredentialWatcher>,
    pub gate: Arc<SerializationGate>,
    pub metrics: Arc<MetricsExporter>,
    pub upstream: Arc<UpstreamClient>,
    pub log_requests: bool,
}

impl AppState {
    pub fn new(config: &ProxyConfig) -> AppResult<Self> {
        Ok(Self {
            rate_limits: Arc::new(RateLimitRegistry::new()),
            credentials: Arc::new(CredentialWatcher::new()),
            gate: Arc::new(SerializationGate::new(config.max_concurrent_upstream)),
            metrics: Arc::new(MetricsExporter::new()),
            upstream: Arc::new(UpstreamClient::new(config)?),
            log_requests: config.log_requests,
        })
    }
}

/// Proxy routes: every method and path goes to the forwarder.
pub fn build_router(state: AppState) -> Router {
    use crate::proxy::{handlers, middleware};

    let mut app = Router::new().fallback(handlers::forward::handle_forward);
    if state.log_requests {
        app = app.layer(axum::middleware::from_fn(middleware::request_log_middleware));
    }
    app.layer(axum::middleware::from_fn_with_state(
        state.metrics.clone(),
        middleware::metrics_middleware,
    ))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

/// Metrics/health routes, served on their own port so no upstream path is shadowed.
pub fn build_metrics_router(metrics: Arc<MetricsExporter>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(health_check_handler))
        .with_state(metrics)
}

/// Axum server instance
pub struct AxumServer {
    shutdown_tx: Option<oneshot::Sender<()>>,
    local_addr: SocketAddr,
}

impl AxumServer {
    /// Bind `host:port` and serve `app` on a background task
    pub async fn start(
        host: &str,
        port: u16,
        app: Router,
    ) -> AppResult<(Self, tokio::task::JoinHandle<()>)> {
        // Bind address
        let addr = format!("{}:{}", host, port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|source| AppError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        tracing::info!("Listening at http://{}", local_addr);

        // Create shutdown channel
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let server_instance = Self {
            shutdown_tx: Some(shutdown_tx),
            local_addr,
        };

        // Start server in new task
        let handle = tokio::spawn(async move {
            use hyper::server::conn::http1;
            use hyper_util::rt::TokioIo;
            use hyper_util::service::TowerToHyperService;

            loop {
                tokio::select! {
                    res = listener.accept() => {
                        match res {
                            Ok((stream, _)) => {
                                let io = TokioIo::new(stream);
                                let service = TowerToHyperService::new(app.clone());

                                tokio::task::spawn(async move {
                                    if let Err(err) = http1::Builder::new()
                                        .serve_connection(io, service)
                                        .await
                                    {
                                        debug!("Connection handling finished or errored: {:?}", err);
                                    }
                                });
                            }
                            Err(e) => {
                                error!("Failed to accept connection: {:?}", e);
                            }
                        }
                    }
                    _ = &mut shutdown_rx => {
                        tracing::info!("Server at {} stopped listening", local_addr);
                        break;
                    }
                }
            }
        });

        Ok((server_instance, handle))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop server
    pub fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

async fn metrics_handler(State(metrics): State<Arc<MetricsExporter>>) -> Response {
    match metrics.encode() {
        Ok(text) => (
            [(
                header::CONTENT_TYPE,
                "application/openmetrics-text; version=1.0.0; charset=utf-8",
            )],
            text,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Health check handler
async fn health_check_handler() -> Response {
    Json(serde_json::json!({
        "status": "ok"
    }))
    .into_response()
}
