// Forward Handler
// Every inbound request lands here: classify, admit, authenticate, forward, relay
use axum::{
    body::{Body, HttpBody},
    extract::{Request, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::ProxyError;
use crate::proxy::rate_limit::{remaining_header, ResourceClass};
use crate::proxy::server::AppState;
use crate::proxy::upstream::client::OutboundRequest;

/// Headers passed through to the upstream; everything else is dropped.
const FORWARDED_HEADERS: [header::HeaderName; 4] = [
    header::USER_AGENT,
    header::ACCEPT,
    header::CONTENT_TYPE,
    header::AUTHORIZATION,
];

const BODY_CHANNEL_CAPACITY: usize = 8;

pub async fn handle_forward(State(state): State<AppState>, request: Request) -> Response {
    match forward(state, request).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn forward(state: AppState, request: Request) -> Result<Response, ProxyError> {
    let (parts, body) = request.into_parts();
    let path = parts.uri.path().to_string();

    // 1. Classify
    let resource = ResourceClass::classify(&path);

    // 2. Admission check: the upstream would refuse this call anyway
    let limit = state.rate_limits.get(resource).await;
    if limit.is_exhausted() {
        let reset_at = reset_instant(limit.reset);
        tracing::debug!("Rejecting {} {}: {} quota exhausted", parts.method, path, resource);
        return Err(ProxyError::AdmissionRejected { resource, reset_at });
    }

    // 3. Project the inbound request
    let mut headers = HeaderMap::new();
    for name in FORWARDED_HEADERS {
        if let Some(value) = parts.headers.get(&name) {
            headers.insert(name, value.clone());
        }
    }
    let body = match body.size_hint().exact() {
        Some(0) => None,
        Some(len) => {
            headers.insert(header::CONTENT_LENGTH, header::HeaderValue::from(len));
            Some(stream_body(body))
        }
        None => Some(stream_body(body)),
    };

    // 4. Authenticate: one snapshot per request
    let query = match state.credentials.current().await {
        Some(authenticator) => Some(authenticator.authenticate(parts.uri.query())),
        None => parts.uri.query().map(str::to_string),
    };

    let outbound = OutboundRequest {
        method: parts.method.clone(),
        path,
        query,
        headers,
        body,
    };

    // 5 + 6. Serialize and forward; the gate is released once headers arrive.
    // 7. Bookkeeping happens on the same task, so a caller hanging up aborts
    // neither the upstream call nor the rate-limit update it reports.
    let gate = state.gate.clone();
    let upstream = state.upstream.clone();
    let rate_limits = state.rate_limits.clone();
    let metrics = state.metrics.clone();
    let call = tokio::spawn(async move {
        let response = match gate.run(upstream.send(outbound)).await? {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("Upstream request failed: {}", e);
                return Err(ProxyError::Upstream(e));
            }
        };
        rate_limits.update(resource, response.headers()).await;
        if let Some(remaining) = remaining_header(response.headers()) {
            metrics.set_remaining(resource, remaining);
        }
        Ok(response)
    });
    // A panic on the upstream task surfaces as ProxyError::Task (500)
    let response = call.await??;

    // 8. Relay
    Ok(relay(response, state.log_requests).await)
}

/// Pipe the inbound body into a channel-backed stream the upstream client can send.
fn stream_body(body: Body) -> reqwest::Body {
    let (tx, rx) = mpsc::channel::<Result<Bytes, std::io::Error>>(BODY_CHANNEL_CAPACITY);
    tokio::spawn(async move {
        let mut stream = body.into_data_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(std::io::Error::other);
            let failed = chunk.is_err();
            if tx.send(chunk).await.is_err() || failed {
                break;
            }
        }
    });
    reqwest::Body::wrap_stream(ReceiverStream::new(rx))
}

async fn relay(upstream: reqwest::Response, log_requests: bool) -> Response {
    let status = upstream.status();
    let headers = upstream.headers().clone();

    let body = if status.as_u16() < 400 || !log_requests {
        Body::from_stream(upstream.bytes_stream())
    } else {
        let (bytes, body_err) = read_all(upstream).await;
        tracing::warn!(
            status = status.as_u16(),
            body = %String::from_utf8_lossy(&bytes),
            body_err = ?body_err,
            "proxy error"
        );
        Body::from(bytes)
    };

    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// Read the whole body, keeping whatever arrived before a read error.
async fn read_all(mut upstream: reqwest::Response) -> (Bytes, Option<reqwest::Error>) {
    let mut buffer = BytesMut::new();
    loop {
        match upstream.chunk().await {
            Ok(Some(chunk)) => buffer.extend_from_slice(&chunk),
            Ok(None) => return (buffer.freeze(), None),
            Err(e) => return (buffer.freeze(), Some(e)),
        }
    }
}

fn reset_instant(reset: Duration) -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now() + chrono::Duration::from_std(reset).unwrap_or_else(|_| chrono::Duration::zero())
}
