use std::time::Duration;

use hyper::Method;
use prometheus::proto::MetricFamily;
use prometheus::{
    exponential_buckets, CounterVec, HistogramVec, IntCounter, Opts, Registry,
};

/// Prometheus registry plus the handful of series the service exposes on
/// `/metrics`.
#[derive(Debug)]
pub struct Metrics {
    registry: Registry,
    req_duration: HistogramVec,
    orders_placed: IntCounter,
    orders_rejected: IntCounter,
    funding_resolved: CounterVec,
    chat_messages: IntCounter,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let req_duration = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request duration by method and path",
            )
            .buckets(exponential_buckets(0.0005, 2.0, 14).unwrap()),
            &["method", "path"],
        )
        .unwrap();
        let orders_placed =
            IntCounter::new("paper_orders_placed_total", "Accepted paper orders").unwrap();
        let orders_rejected =
            IntCounter::new("paper_orders_rejected_total", "Rejected paper orders").unwrap();
        let funding_resolved = CounterVec::new(
            Opts::new("funding_requests_resolved_total", "Funding queue decisions"),
            &["action"],
        )
        .unwrap();
        let chat_messages =
            IntCounter::new("support_messages_total", "Support chat messages sent").unwrap();

        registry.register(Box::new(req_duration.clone())).unwrap();
        registry.register(Box::new(orders_placed.clone())).unwrap();
        registry.register(Box::new(orders_rejected.clone())).unwrap();
        registry.register(Box::new(funding_resolved.clone())).unwrap();
        registry.register(Box::new(chat_messages.clone())).unwrap();

        Self {
            registry,
            req_duration,
            orders_placed,
            orders_rejected,
            funding_resolved,
            chat_messages,
        }
    }

    pub fn observe_req_duration(&self, method: &Method, path: &str, elapsed: Duration) {
        self.req_duration
            .with_label_values(&[method.as_str(), path])
            .observe(elapsed.as_secs_f64());
    }

    pub fn order_placed(&self) {
        self.orders_placed.inc();
    }

    pub fn order_rejected(&self) {
        self.orders_rejected.inc();
    }

    pub fn funding_resolved(&self, action: &str) {
        self.funding_resolved.with_label_values(&[action]).inc();
    }

    pub fn chat_message(&self) {
        self.chat_messages.inc();
    }

    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_gather_registered_series() {
        let metrics = Metrics::new();
        metrics.order_placed();
        metrics.funding_resolved("APPROVE");
        metrics.observe_req_duration(&Method::GET, "/api/wallet", Duration::from_millis(3));

        let families = metrics.gather();
        let names: Vec<&str> = families.iter().map(|f| f.get_name()).collect();
        assert!(names.contains(&"paper_orders_placed_total"));
        assert!(names.contains(&"http_request_duration_seconds"));
    }
}
