use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};
use std::time::Duration;

pub const METER_NAME: &str = "detector-server";

/// Outcome label recorded on every request counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
        }
    }

    fn label(self) -> [KeyValue; 1] {
        [KeyValue::new("outcome", self.as_str())]
    }
}

/// Instruments for the detection service. Without a configured meter provider
/// the global no-op meter is used and recording is free.
#[derive(Clone)]
pub struct ServiceMetrics {
    detect_duration: Histogram<f64>,
    detect_requests: Counter<u64>,
    detections: Counter<u64>,
    uncertain_detections: Counter<u64>,
    model_reloads: Counter<u64>,
    param_updates: Counter<u64>,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        let meter = global::meter(METER_NAME);
        let latency_buckets = [
            0.005, 0.01, 0.02, 0.03, 0.05, 0.075, 0.1, 0.15, 0.2, 0.3, 0.5, 0.75, 1.0, 2.0, 5.0,
        ];

        Self {
            detect_duration: meter
                .f64_histogram("detect_duration_seconds")
                .with_description("Time to run one image through decode, inference, merge and scoring")
                .with_unit("s")
                .with_boundaries(latency_buckets.to_vec())
                .build(),
            detect_requests: meter
                .u64_counter("detect_requests_total")
                .with_description("Detect requests handled, by outcome")
                .build(),
            detections: meter
                .u64_counter("detections_total")
                .with_description("Detections returned after merging")
                .build(),
            uncertain_detections: meter
                .u64_counter("uncertain_detections_total")
                .with_description("Returned detections flagged for review")
                .build(),
            model_reloads: meter
                .u64_counter("model_reloads_total")
                .with_description("Model reload attempts, by outcome")
                .build(),
            param_updates: meter
                .u64_counter("param_updates_total")
                .with_description("Parameter update attempts, by outcome")
                .build(),
        }
    }

    pub fn record_detect(&self, elapsed: Duration, detections: u64, uncertain: u64) {
        self.detect_duration.record(elapsed.as_secs_f64(), &[]);
        self.detect_requests.add(1, &Outcome::Success.label());
        self.detections.add(detections, &[]);
        self.uncertain_detections.add(uncertain, &[]);
    }

    pub fn record_detect_failure(&self) {
        self.detect_requests.add(1, &Outcome::Failure.label());
    }

    pub fn record_reload(&self, outcome: Outcome) {
        self.model_reloads.add(1, &outcome.label());
    }

    pub fn record_param_update(&self, outcome: Outcome) {
        self.param_updates.add(1, &outcome.label());
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}
