// proxy module - GitHub API reverse proxy service

pub mod authenticator;
pub mod config;
pub mod metrics;
pub mod rate_limit;
pub mod server;

pub mod common; // Common tools
pub mod handlers; // Request handlers
pub mod middleware; // Axum middleware
pub mod upstream; // Upstream client

#[cfg(test)]
pub(crate) mod test_support;

pub use config::ProxyConfig;
pub use server::{AppState, AxumServer};
