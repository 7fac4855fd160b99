// Upstream module - outbound HTTP client

pub mod client;
