//! Metrics definitions for request dispatch.

use shared::metrics_defs::{MetricDef, MetricType};

pub const WORK_SUBMITTED: MetricDef = MetricDef {
    name: "dispatch.work_submitted",
    metric_type: MetricType::Counter,
    description: "Number of work descriptors handed to the worker pool",
};

pub const RELAY_WAIT_TIMEOUT: MetricDef = MetricDef {
    name: "dispatch.relay_wait_timeout",
    metric_type: MetricType::Counter,
    description: "Number of relayed requests that hit the handler deadline",
};

pub const ALL_METRICS: &[MetricDef] = &[WORK_SUBMITTED, RELAY_WAIT_TIMEOUT];
