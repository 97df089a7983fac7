//! Metrics registry wrapper.

use prometheus::{proto::MetricFamily, Encoder, Registry, TextEncoder};

use crate::{
    metrics::register_core_metrics,
    types::{MetricError, MetricResult},
};

/// Registry holding the engine metrics
pub struct MetricsRegistry {
    registry: Registry,
}

impl MetricsRegistry {
    /// Create a registry with the engine metrics registered
    pub fn new() -> MetricResult<Self> {
        let registry = Registry::new();
        register_core_metrics(&registry)?;
        Ok(Self { registry })
    }

    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Encode metrics in Prometheus text format
    pub fn encode_to_string(&self) -> MetricResult<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.gather();

        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| MetricError::EncodingFailed(e.to_string()))?;

        String::from_utf8(buffer).map_err(|e| MetricError::EncodingFailed(e.to_string()))
    }
}
