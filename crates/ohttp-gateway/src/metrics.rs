//! Gateway metrics: shared emitter plus per-request bags
//!
//! Privacy-safe labels only: events and coarse outcomes, never request
//! content or target hosts. Each request owns one bag, and every
//! (event, label) pair may fire at most once per bag; a second fire is a
//! programming error caught by `debug_assert` under test builds.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const EVENT_GATEWAY_REQUEST: &str = "gateway_request";
pub const EVENT_CONFIGS_REQUEST: &str = "configs_request";

pub const RESULT_CONFIGS_UNAVAILABLE: &str = "configs_unavailable";
pub const RESULT_INVALID_METHOD: &str = "invalid_method";
pub const RESULT_INVALID_CONTENT_TYPE: &str = "invalid_content_type";
pub const RESULT_INVALID_CONTENT: &str = "invalid_content";

pub const RESULT_CONFIG_MISMATCH: &str = "config_mismatch";
pub const RESULT_DECAPSULATION_FAILED: &str = "decapsulation_failed";
pub const RESULT_ENCAPSULATION_FAILED: &str = "encapsulation_failed";
pub const RESULT_CONTENT_DECODE_FAILED: &str = "content_decode_failed";
pub const RESULT_CONTENT_ENCODE_FAILED: &str = "content_encode_failed";
pub const RESULT_REQUEST_TRANSLATE_FAILED: &str = "request_translate_failed";
pub const RESULT_RESPONSE_TRANSLATE_FAILED: &str = "response_translate_failed";
pub const RESULT_TARGET_REQUEST_FORBIDDEN: &str = "request_forbidden";
pub const RESULT_TARGET_REQUEST_FAILED: &str = "request_failed";
pub const RESULT_SUCCESS: &str = "success";

/// Status prefix for inner (sealed) response statuses.
pub const PAYLOAD_STATUS_PREFIX: &str = "gateway_payload";

/// Creates one [`RequestMetrics`] bag per request.
#[derive(Debug, Clone, Default)]
pub struct MetricsFactory;

impl MetricsFactory {
    pub fn new() -> Self {
        Self
    }

    pub fn create(&self, event: &'static str) -> RequestMetrics {
        RequestMetrics {
            event,
            started: Instant::now(),
            fired: HashSet::new(),
        }
    }
}

/// Per-request bag of fired (event, label) pairs.
#[derive(Debug)]
pub struct RequestMetrics {
    event: &'static str,
    started: Instant,
    fired: HashSet<String>,
}

impl RequestMetrics {
    /// Fire an outcome label once.
    pub fn fire(&mut self, result: &str) {
        if !self.mark(result) {
            return;
        }
        counter!(
            "ohttp_gateway_events_total",
            "event" => self.event,
            "result" => result.to_string()
        )
        .increment(1);
    }

    /// Fire a response-status label once and record the request duration.
    pub fn response_status(&mut self, prefix: &str, status: u16) {
        let label = format!("{prefix}_response_status_{status}");
        if !self.mark(&label) {
            return;
        }
        counter!(
            "ohttp_gateway_responses_total",
            "event" => self.event,
            "status" => label
        )
        .increment(1);
        histogram!("ohttp_gateway_request_duration_seconds", "event" => self.event)
            .record(self.started.elapsed().as_secs_f64());
    }

    /// Whether a label has fired in this bag. Used by tests to assert the
    /// single outcome per code path.
    pub fn was_fired(&self, label: &str) -> bool {
        self.fired.contains(label)
    }

    fn mark(&mut self, label: &str) -> bool {
        if self.fired.insert(label.to_string()) {
            return true;
        }
        debug_assert!(false, "metric label {label} fired twice for event {}", self.event);
        tracing::error!(event = self.event, label, "metric label fired twice");
        false
    }
}

/// Install the Prometheus exporter on `addr` with a global service label.
pub fn install_exporter(addr: SocketAddr, service_name: &str) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .add_global_label("service", service_name)
        .install()
}
