// Middleware module - Axum middleware

pub mod logging;
pub mod metrics;

pub use logging::request_log_middleware;
pub use metrics::metrics_middleware;
