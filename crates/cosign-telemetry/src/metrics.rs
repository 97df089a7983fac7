//! Engine metrics definitions.
//!
//! Counters for the operation lifecycle, broadcasts, and multisig discovery.

use lazy_static::lazy_static;
use prometheus::{HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry};

use crate::types::MetricResult;

lazy_static! {
    /// Operations opened in the store
    pub static ref OPERATIONS_OPENED: IntCounter = IntCounter::new(
        "cosign_operations_opened_total",
        "Total number of multisig operations opened"
    ).expect("Failed to create cosign_operations_opened_total metric");

    /// Approval events appended, by kind
    pub static ref EVENTS_APPLIED: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "cosign_approval_events_total",
            "Approval events appended to pending operations"
        ),
        &["kind"]
    ).expect("Failed to create cosign_approval_events_total metric");

    /// Terminal transitions, by resulting status
    pub static ref STATUS_TRANSITIONS: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "cosign_status_transitions_total",
            "Operations that reached a terminal status"
        ),
        &["status"]
    ).expect("Failed to create cosign_status_transitions_total metric");

    /// Mutations discarded because the persistence write failed
    pub static ref PERSISTENCE_FAILURES: IntCounter = IntCounter::new(
        "cosign_persistence_failures_total",
        "Store mutations rolled back after a failed write"
    ).expect("Failed to create cosign_persistence_failures_total metric");

    /// Local submissions currently awaiting broadcast
    pub static ref SUBMISSIONS_IN_FLIGHT: IntGauge = IntGauge::new(
        "cosign_submissions_in_flight",
        "Local submissions awaiting broadcast completion"
    ).expect("Failed to create cosign_submissions_in_flight metric");

    /// Broadcast outcomes, by action and result
    pub static ref BROADCASTS: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "cosign_broadcasts_total",
            "Broadcasts of wrapped calls"
        ),
        &["action", "outcome"]
    ).expect("Failed to create cosign_broadcasts_total metric");

    /// Broadcast latency histogram
    pub static ref BROADCAST_TIME: HistogramVec = HistogramVec::new(
        prometheus::HistogramOpts::new(
            "cosign_broadcast_duration_seconds",
            "Time from submission to inclusion or failure in seconds"
        ).buckets(vec![0.5, 1.0, 3.0, 6.0, 12.0, 30.0, 60.0]),
        &["action"]
    ).expect("Failed to create cosign_broadcast_duration_seconds metric");

    /// Discovery reconciliation outcomes
    pub static ref DISCOVERY_OUTCOMES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "cosign_discovery_outcomes_total",
            "Reconciliation results of discovered multisigs"
        ),
        &["outcome"]
    ).expect("Failed to create cosign_discovery_outcomes_total metric");
}

/// Register all engine metrics with the provided registry
pub fn register_core_metrics(registry: &Registry) -> MetricResult<()> {
    registry.register(Box::new(OPERATIONS_OPENED.clone()))?;
    registry.register(Box::new(EVENTS_APPLIED.clone()))?;
    registry.register(Box::new(STATUS_TRANSITIONS.clone()))?;
    registry.register(Box::new(PERSISTENCE_FAILURES.clone()))?;
    registry.register(Box::new(SUBMISSIONS_IN_FLIGHT.clone()))?;
    registry.register(Box::new(BROADCASTS.clone()))?;
    registry.register(Box::new(BROADCAST_TIME.clone()))?;
    registry.register(Box::new(DISCOVERY_OUTCOMES.clone()))?;
    Ok(())
}

pub fn record_event_applied(kind: &str) {
    EVENTS_APPLIED.with_label_values(&[kind]).inc();
}

pub fn record_transition(status: &str) {
    STATUS_TRANSITIONS.with_label_values(&[status]).inc();
}

/// Count a broadcast and observe its duration
pub fn record_broadcast(action: &str, outcome: &str, duration_secs: f64) {
    BROADCASTS.with_label_values(&[action, outcome]).inc();
    BROADCAST_TIME
        .with_label_values(&[action])
        .observe(duration_secs);
}

pub fn record_discovery(outcome: &str) {
    DISCOVERY_OUTCOMES.with_label_values(&[outcome]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_updates() {
        // Metrics are global; compare against the value before the update
        let opened = OPERATIONS_OPENED.get();
        OPERATIONS_OPENED.inc();
        assert!(OPERATIONS_OPENED.get() > opened);

        let signed = EVENTS_APPLIED.with_label_values(&["signed"]).get();
        record_event_applied("signed");
        assert!(EVENTS_APPLIED.with_label_values(&["signed"]).get() > signed);

        record_transition("executed");
        record_broadcast("approve", "included", 6.2);
        record_discovery("created");
        assert!(DISCOVERY_OUTCOMES.with_label_values(&["created"]).get() >= 1);
    }

    #[test]
    fn test_register_metrics() {
        let registry = Registry::new();
        assert!(register_core_metrics(&registry).is_ok());
        assert!(register_core_metrics(&registry).is_err());
    }
}
