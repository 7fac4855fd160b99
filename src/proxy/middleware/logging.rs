// Request logging middleware
use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

/// Log one line per request once the response head is ready
pub async fn request_log_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let user_agent = request
        .headers()
        .get(axum::http::header::USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    tracing::info!(
        "Request: {} {} -> {} ({}ms, ua: {})",
        method,
        uri.path(),
        response.status().as_u16(),
        start.elapsed().as_millis(),
        user_agent
    );
    response
}
