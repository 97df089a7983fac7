//! Telemetry for the cosign multisig engine.
//!
//! Prometheus counters for the operation lifecycle, local broadcasts and
//! multisig discovery, collected in a global registry.

pub mod metrics;
pub mod registry;
pub mod types;

pub use metrics::{
    BROADCASTS, BROADCAST_TIME, DISCOVERY_OUTCOMES, EVENTS_APPLIED, OPERATIONS_OPENED,
    PERSISTENCE_FAILURES, STATUS_TRANSITIONS, SUBMISSIONS_IN_FLIGHT,
};
pub use registry::MetricsRegistry;
pub use types::{MetricError, MetricResult};

use lazy_static::lazy_static;

lazy_static! {
    /// Global metrics registry instance
    pub static ref METRICS_REGISTRY: MetricsRegistry =
        MetricsRegistry::new().expect("Failed to initialize metrics registry");
}

/// Initialize the telemetry subsystem
pub fn init() -> MetricResult<()> {
    let _ = &*METRICS_REGISTRY;

    tracing::info!("Telemetry subsystem initialized");
    Ok(())
}

/// Render the global registry in Prometheus text format
pub fn render() -> MetricResult<String> {
    METRICS_REGISTRY.encode_to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init() {
        assert!(init().is_ok());
    }

    #[test]
    fn test_render_contains_engine_metrics() {
        init().unwrap();
        SUBMISSIONS_IN_FLIGHT.set(0);
        let text = render().unwrap();
        assert!(text.contains("cosign_submissions_in_flight"));
    }
}
