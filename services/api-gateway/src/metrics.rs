//! Prometheus counters for the pass-through routes.

use prometheus::{IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

pub struct GatewayMetrics {
    registry: Registry,
    requests: IntCounterVec,
    uploaded_bytes: IntCounter,
    mock_replies: IntCounter,
}

impl GatewayMetrics {
    pub fn new(namespace: &str) -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new("gateway_requests_total", "Backend-bound requests by route and outcome")
                .namespace(namespace),
            &["route", "outcome"],
        )?;
        let uploaded_bytes = IntCounter::with_opts(
            Opts::new("gateway_uploaded_bytes_total", "Bytes of PDF forwarded to the backend")
                .namespace(namespace),
        )?;
        let mock_replies = IntCounter::with_opts(
            Opts::new("gateway_mock_replies_total", "Chat replies answered by the mock fallback")
                .namespace(namespace),
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(uploaded_bytes.clone()))?;
        registry.register(Box::new(mock_replies.clone()))?;

        Ok(Self {
            registry,
            requests,
            uploaded_bytes,
            mock_replies,
        })
    }

    pub fn observe<T, E>(&self, route: &str, result: &Result<T, E>) {
        self.record(route, if result.is_ok() { "success" } else { "error" });
    }

    pub fn record(&self, route: &str, outcome: &str) {
        self.requests.with_label_values(&[route, outcome]).inc();
    }

    pub fn record_upload(&self, bytes: u64) {
        self.uploaded_bytes.inc_by(bytes);
    }

    pub fn record_mock_reply(&self) {
        self.mock_replies.inc();
    }

    pub fn render(&self) -> String {
        TextEncoder::new()
            .encode_to_string(&self.registry.gather())
            .unwrap_or_else(|_| "Error encoding metrics".to_string())
    }
}
