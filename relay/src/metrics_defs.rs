//! Metrics definitions for the request relay.

use shared::metrics_defs::{MetricDef, MetricType};

pub const RELAY_REGISTERED: MetricDef = MetricDef {
    name: "relay.registered",
    metric_type: MetricType::Counter,
    description: "Number of inbound requests registered for relay",
};

pub const RELAY_COMPLETED: MetricDef = MetricDef {
    name: "relay.completed",
    metric_type: MetricType::Counter,
    description: "Number of relays resolved by a worker completion",
};

pub const RELAY_ABANDONED: MetricDef = MetricDef {
    name: "relay.abandoned",
    metric_type: MetricType::Counter,
    description: "Number of relays withdrawn before a worker completed them",
};

pub const RELAY_REJECTED: MetricDef = MetricDef {
    name: "relay.rejected",
    metric_type: MetricType::Counter,
    description: "Number of completion payloads rejected as malformed",
};

pub const ALL_METRICS: &[MetricDef] = &[
    RELAY_REGISTERED,
    RELAY_COMPLETED,
    RELAY_ABANDONED,
    RELAY_REJECTED,
];
