// In-process mock of the upstream API used by handler tests

use axum::{extract::Request, response::Response, Router};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::proxy::config::ProxyConfig;
use crate::proxy::server::{build_router, AppState};

/// What the mock saw of one upstream call
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: axum::http::HeaderMap,
    pub body: bytes::Bytes,
}

#[derive(Clone, Default)]
pub struct UpstreamRecorder {
    pub hits: Arc<AtomicUsize>,
    pub in_flight: Arc<AtomicUsize>,
    pub peak_in_flight: Arc<AtomicUsize>,
    pub seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl UpstreamRecorder {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn last(&self) -> SeenRequest {
        self.seen.lock().unwrap().last().cloned().expect("no upstream request seen")
    }
}

/// Spawn a mock upstream. `respond` builds the reply; each call is held for
/// `delay` while counted as in flight.
pub async fn spawn_upstream<F>(delay: Duration, respond: F) -> (SocketAddr, UpstreamRecorder)
where
    F: Fn(&SeenRequest) -> Response + Clone + Send + Sync + 'static,
{
    let recorder = UpstreamRecorder::default();
    let handler_recorder = recorder.clone();

    let app = Router::new().fallback(move |request: Request| {
        let recorder = handler_recorder.clone();
        let respond = respond.clone();
        async move {
            let now = recorder.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            recorder.peak_in_flight.fetch_max(now, Ordering::SeqCst);
            recorder.hits.fetch_add(1, Ordering::SeqCst);

            let (parts, body) = request.into_parts();
            let body = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();
            let seen = SeenRequest {
                method: parts.method.to_string(),
                path: parts.uri.path().to_string(),
                query: parts.uri.query().map(str::to_string),
                headers: parts.headers,
                body,
            };
            recorder.seen.lock().unwrap().push(seen.clone());

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            recorder.in_flight.fetch_sub(1, Ordering::SeqCst);
            respond(&seen)
        }
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, recorder)
}

pub fn proxy_config(upstream: SocketAddr) -> ProxyConfig {
    ProxyConfig {
        upstream_url: format!("http://{}", upstream),
        ..ProxyConfig::default()
    }
}

pub fn proxy_app(config: &ProxyConfig) -> (Router, AppState) {
    let state = AppState::new(config).unwrap();
    (build_router(state.clone()), state)
}
