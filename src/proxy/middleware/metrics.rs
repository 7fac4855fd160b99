// Request count / latency instrumentation
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;

use crate::proxy::metrics::MetricsExporter;

pub async fn metrics_middleware(
    State(metrics): State<Arc<MetricsExporter>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    metrics.observe_request(&method, response.status().as_u16(), start.elapsed());
    response
}
