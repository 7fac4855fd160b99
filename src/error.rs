use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::proxy::rate_limit::ResourceClass;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to bind address {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

// Implement alias for Result to simplify usage
pub type AppResult<T> = Result<T, AppError>;

/// Errors surfaced to callers of the proxy while handling a single request.
#[derive(Error, Debug)]
pub enum ProxyError {
    /// Quota for the resource class is known to be exhausted; nothing was sent upstream.
    #[error("rate limit for \"{resource}\" exceeded, reset at {reset_at}")]
    AdmissionRejected {
        resource: ResourceClass,
        reset_at: DateTime<Utc>,
    },

    /// The upstream could not be reached (connect, DNS, TLS, ...).
    #[error("{0}")]
    Upstream(#[from] reqwest::Error),

    #[error("upstream gate closed")]
    GateClosed,

    /// The task running the gated upstream call panicked or was cancelled.
    #[error("upstream task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::AdmissionRejected { .. } => StatusCode::FORBIDDEN,
            ProxyError::Upstream(_) | ProxyError::GateClosed | ProxyError::Task(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (
            self.status(),
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            format!("{}\n", self),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_admission_message() {
        let err = ProxyError::AdmissionRejected {
            resource: ResourceClass::Search,
            reset_at: Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap(),
        };
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            err.to_string(),
            "rate limit for \"search\" exceeded, reset at 2026-10-19 12:00:00 UTC"
        );
    }

    #[test]
    fn test_gate_closed_is_server_error() {
        assert_eq!(
            ProxyError::GateClosed.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_panicked_task_is_server_error() {
        let join_err = tokio::spawn(async {
            if true {
                panic!("upstream task panicked");
            }
        })
        .await
        .unwrap_err();

        let err = ProxyError::from(join_err);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().starts_with("upstream task failed"));
    }
}
