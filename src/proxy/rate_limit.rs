// Rate limit bookkeeping
// One quota tracker per resource class, fed from upstream response headers

use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::HeaderMap;
use std::fmt;
use std::time::Duration;
use tokio::sync::RwLock;

/// GitHub tracks quota independently per API surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceClass {
    Core,
    Search,
    Graphql,
}

impl ResourceClass {
    pub const ALL: [ResourceClass; 3] = [
        ResourceClass::Core,
        ResourceClass::Search,
        ResourceClass::Graphql,
    ];

    /// Classify an inbound request path. Total: anything unrecognised is `core`.
    pub fn classify(path: &str) -> Self {
        if path.starts_with("/search/") {
            ResourceClass::Search
        } else if path == "/graphql" {
            ResourceClass::Graphql
        } else {
            ResourceClass::Core
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            ResourceClass::Core => "core",
            ResourceClass::Search => "search",
            ResourceClass::Graphql => "graphql",
        }
    }

    const fn index(self) -> usize {
        match self {
            ResourceClass::Core => 0,
            ResourceClass::Search => 1,
            ResourceClass::Graphql => 2,
        }
    }
}

impl fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct RateLimitState {
    pub limit: Option<i64>,
    pub remaining: i64,
    pub reset_at: Option<DateTime<Utc>>,
    pub known: bool,
}

/// Point-in-time view of a class's quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSnapshot {
    pub remaining: i64,
    pub reset: Duration,
    pub known: bool,
}

impl RateLimitSnapshot {
    /// True when the upstream is known to refuse calls until the reset instant.
    pub fn is_exhausted(&self) -> bool {
        self.known && self.remaining < 1 && self.reset > Duration::ZERO
    }
}

const REMAINING_HEADER: &str = "RateLimit-Remaining";
const RESET_HEADER: &str = "RateLimit-Reset";
const LIMIT_HEADER: &str = "RateLimit-Limit";
const LEGACY_PREFIX: &str = "X-";

/// Look a rate limit header up by its canonical name, falling back to the `X-` variant.
fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .or_else(|| headers.get(format!("{}{}", LEGACY_PREFIX, name)))
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
}

fn parse_header(headers: &HeaderMap, name: &str) -> Option<i64> {
    header_value(headers, name)?.parse().ok()
}

/// Remaining quota advertised by a response, if any.
pub fn remaining_header(headers: &HeaderMap) -> Option<i64> {
    parse_header(headers, REMAINING_HEADER)
}

pub struct RateLimitRegistry {
    states: [RwLock<RateLimitState>; 3],
}

impl RateLimitRegistry {
    pub fn new() -> Self {
        Self {
            states: [
                RwLock::new(RateLimitState::default()),
                RwLock::new(RateLimitState::default()),
                RwLock::new(RateLimitState::default()),
            ],
        }
    }

    fn slot(&self, class: ResourceClass) -> &RwLock<RateLimitState> {
        &self.states[class.index()]
    }

    pub async fn get(&self, class: ResourceClass) -> RateLimitSnapshot {
        let state = self.slot(class).read().await;
        if !state.known {
            return RateLimitSnapshot {
                remaining: 0,
                reset: Duration::ZERO,
                known: false,
            };
        }
        let reset = state
            .reset_at
            .and_then(|at| (at - Utc::now()).to_std().ok())
            .unwrap_or(Duration::ZERO);
        RateLimitSnapshot {
            remaining: state.remaining,
            reset,
            known: true,
        }
    }

    /// Full state for a class, including the absolute reset instant.
    pub async fn state(&self, class: ResourceClass) -> RateLimitState {
        self.slot(class).read().await.clone()
    }

    /// Overwrite a class's state from upstream response headers.
    ///
    /// Remaining and reset must both be present and numeric, otherwise the
    /// class falls back to unknown.
    pub async fn update(&self, class: ResourceClass, headers: &HeaderMap) {
        let remaining = parse_header(headers, REMAINING_HEADER);
        let reset_at = parse_header(headers, RESET_HEADER)
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single());

        let mut state = self.slot(class).write().await;
        match (remaining, reset_at) {
            (Some(remaining), Some(reset_at)) => {
                *state = RateLimitState {
                    limit: parse_header(headers, LIMIT_HEADER),
                    remaining,
                    reset_at: Some(reset_at),
                    known: true,
                };
            }
            _ => {
                if state.known {
                    tracing::debug!("Rate limit headers missing for {}, state now unknown", class);
                }
                *state = RateLimitState::default();
            }
        }
    }
}

impl Default for RateLimitRegistry {
    fn default() -> Self {
        Self::new()
    }
}
