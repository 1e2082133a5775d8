//! Metrics definitions for the platform API layer.

use shared::metrics_defs::{MetricDef, MetricType};

pub const IDENTITY_CACHE_HIT: MetricDef = MetricDef {
    name: "identity_cache.hit",
    metric_type: MetricType::Counter,
    description: "Number of identity resolutions served from the cache",
};

pub const IDENTITY_CACHE_MISS: MetricDef = MetricDef {
    name: "identity_cache.miss",
    metric_type: MetricType::Counter,
    description: "Number of identity resolutions that went upstream",
};

pub const ALL_METRICS: &[MetricDef] = &[IDENTITY_CACHE_HIT, IDENTITY_CACHE_MISS];
