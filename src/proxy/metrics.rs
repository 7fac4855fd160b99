//! Prometheus metrics for the proxy.
//!
//! - `src_github_rate_limit_remaining{resource}`: last observed remaining quota
//!   per resource class, seeded with GitHub's documented defaults.
//! - `github_proxy_requests_total{method,code}` and
//!   `github_proxy_request_duration_seconds{method}`: generic handler instrumentation.

use prometheus_client::encoding::{text::encode, EncodeLabelSet};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;
use std::time::Duration;

use crate::proxy::rate_limit::ResourceClass;

pub const DEFAULT_CORE_REMAINING: i64 = 5000;
pub const DEFAULT_SEARCH_REMAINING: i64 = 30;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ResourceLabels {
    resource: String,
}

impl From<ResourceClass> for ResourceLabels {
    fn from(class: ResourceClass) -> Self {
        Self {
            resource: class.as_str().to_string(),
        }
    }
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct RequestLabels {
    method: String,
    code: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct MethodLabels {
    method: String,
}

type HistogramFamily = Family<MethodLabels, Histogram, fn() -> Histogram>;

fn latency_histogram() -> Histogram {
    // 5ms .. ~10s
    Histogram::new(exponential_buckets(0.005, 2.0, 12))
}

pub struct MetricsExporter {
    registry: Registry,
    rate_limit_remaining: Family<ResourceLabels, Gauge>,
    requests: Family<RequestLabels, Counter>,
    request_duration: HistogramFamily,
}

impl MetricsExporter {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let rate_limit_remaining = Family::<ResourceLabels, Gauge>::default();
        registry.register(
            "src_github_rate_limit_remaining",
            "Number of calls to GitHub's API remaining before hitting the rate limit.",
            rate_limit_remaining.clone(),
        );

        let requests = Family::<RequestLabels, Counter>::default();
        registry.register(
            "github_proxy_requests",
            "Number of HTTP requests handled by the proxy.",
            requests.clone(),
        );

        let request_duration: HistogramFamily = Family::new_with_constructor(latency_histogram);
        registry.register(
            "github_proxy_request_duration_seconds",
            "Latency of HTTP requests handled by the proxy.",
            request_duration.clone(),
        );

        let exporter = Self {
            registry,
            rate_limit_remaining,
            requests,
            request_duration,
        };
        exporter.set_remaining(ResourceClass::Core, DEFAULT_CORE_REMAINING);
        exporter.set_remaining(ResourceClass::Search, DEFAULT_SEARCH_REMAINING);
        exporter
    }

    pub fn set_remaining(&self, class: ResourceClass, remaining: i64) {
        self.rate_limit_remaining
            .get_or_create(&class.into())
            .set(remaining);
    }

    /// Current gauge value for a class (0 if never set).
    pub fn remaining(&self, class: ResourceClass) -> i64 {
        self.rate_limit_remaining.get_or_create(&class.into()).get()
    }

    pub fn observe_request(&self, method: &str, status: u16, elapsed: Duration) {
        self.requests
            .get_or_create(&RequestLabels {
                method: method.to_string(),
                code: status.to_string(),
            })
            .inc();
        self.request_duration
            .get_or_create(&MethodLabels {
                method: method.to_string(),
            })
            .observe(elapsed.as_secs_f64());
    }

    pub fn request_count(&self, method: &str, status: u16) -> u64 {
        self.requests
            .get_or_create(&RequestLabels {
                method: method.to_string(),
                code: status.to_string(),
            })
            .get()
    }

    /// Render all metrics in the OpenMetrics text format.
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut buffer = String::new();
        encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}

impl Default for MetricsExporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_defaults() {
        let metrics = MetricsExporter::new();
        assert_eq!(metrics.remaining(ResourceClass::Core), 5000);
        assert_eq!(metrics.remaining(ResourceClass::Search), 30);
    }

    #[test]
    fn test_set_remaining_overwrites() {
        let metrics = MetricsExporter::new();
        metrics.set_remaining(ResourceClass::Core, 42);
        assert_eq!(metrics.remaining(ResourceClass::Core), 42);
        assert_eq!(metrics.remaining(ResourceClass::Search), 30);
    }

    #[test]
    fn test_encode_contains_families() {
        let metrics = MetricsExporter::new();
        metrics.observe_request("GET", 200, Duration::from_millis(12));
        assert_eq!(metrics.request_count("GET", 200), 1);

        let text = metrics.encode().unwrap();
        assert!(text.contains("src_github_rate_limit_remaining{resource=\"core\"} 5000"));
        assert!(text.contains("src_github_rate_limit_remaining{resource=\"search\"} 30"));
        assert!(text.contains("github_proxy_requests_total{method=\"GET\",code=\"200\"} 1"));
        assert!(text.contains("github_proxy_request_duration_seconds"));
    }
}
