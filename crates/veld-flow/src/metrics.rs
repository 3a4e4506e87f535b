//! Observability metrics for the pipeline.
//!
//! Exposed via the `metrics` crate facade; the worker binary installs a
//! Prometheus exporter when configured.
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `veld_flow_events_total` | Counter | `event_type`, `outcome` | Settled events by outcome |
//! | `veld_flow_task_duration_seconds` | Histogram | `event_type` | Handler run duration |
//! | `veld_flow_events_emitted_total` | Counter | `event_type` | Events emitted by handlers |

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    /// Counter: settled events by outcome (`passed`, `released`, `failed`,
    /// `poisoned`).
    pub const EVENTS_TOTAL: &str = "veld_flow_events_total";
    /// Histogram: handler run duration in seconds.
    pub const TASK_DURATION_SECONDS: &str = "veld_flow_task_duration_seconds";
    /// Counter: events emitted by handlers.
    pub const EVENTS_EMITTED_TOTAL: &str = "veld_flow_events_emitted_total";
}

/// Recorder handle for pipeline metrics.
#[derive(Debug, Clone, Default)]
pub struct FlowMetrics;

impl FlowMetrics {
    /// Creates the recorder.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Records one settled event.
    pub fn record_settlement(&self, event_type: &str, outcome: &'static str) {
        counter!(
            names::EVENTS_TOTAL,
            "event_type" => event_type.to_string(),
            "outcome" => outcome,
        )
        .increment(1);
    }

    /// Records a handler run duration.
    pub fn observe_task_duration(&self, event_type: &str, seconds: f64) {
        histogram!(
            names::TASK_DURATION_SECONDS,
            "event_type" => event_type.to_string(),
        )
        .record(seconds);
    }

    /// Records an event emitted by a handler.
    pub fn record_emitted(&self, event_type: &str) {
        counter!(
            names::EVENTS_EMITTED_TOTAL,
            "event_type" => event_type.to_string(),
        )
        .increment(1);
    }
}
