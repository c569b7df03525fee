mod server;

use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry};

pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for order transitions
// ============================================================================
//
// - Transition outcomes (accepted, rejected locally, remote failures)
// - Backend call latency per transition
// - Backend circuit breaker state
//
// Scraped via /metrics when the metrics server is enabled.
// ============================================================================

pub struct DispatchMetrics {
    registry: Registry,

    pub transitions_total: IntCounterVec,
    pub remote_call_duration: HistogramVec,
    pub circuit_breaker_state: IntGauge,
}

impl DispatchMetrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let transitions_total = IntCounterVec::new(
            Opts::new("order_transitions_total", "Order transition requests by outcome"),
            &["transition", "outcome"],
        )?;
        registry.register(Box::new(transitions_total.clone()))?;

        let remote_call_duration = HistogramVec::new(
            HistogramOpts::new(
                "order_remote_call_duration_seconds",
                "Backend API call duration per transition",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["transition"],
        )?;
        registry.register(Box::new(remote_call_duration.clone()))?;

        let circuit_breaker_state = IntGauge::new(
            "backend_circuit_breaker_state",
            "Backend circuit breaker state (0=Closed, 1=Open, 2=HalfOpen)",
        )?;
        registry.register(Box::new(circuit_breaker_state.clone()))?;

        Ok(Self {
            registry,
            transitions_total,
            remote_call_duration,
            circuit_breaker_state,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_outcome(&self, transition: &str, outcome: &str) {
        self.transitions_total
            .with_label_values(&[transition, outcome])
            .inc();
    }

    pub fn observe_remote_call(&self, transition: &str, duration_secs: f64) {
        self.remote_call_duration
            .with_label_values(&[transition])
            .observe(duration_secs);
    }

    pub fn set_circuit_breaker_state(&self, gauge: i64) {
        self.circuit_breaker_state.set(gauge);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = DispatchMetrics::new().unwrap();
        metrics.record_outcome("confirm", "accepted");
        assert!(!metrics.registry().gather().is_empty());
    }

    #[test]
    fn test_record_outcome() {
        let metrics = DispatchMetrics::new().unwrap();
        metrics.record_outcome("confirm", "accepted");
        metrics.record_outcome("confirm", "accepted");
        metrics.record_outcome("cancel", "invalid_reason");

        let gathered = metrics.registry().gather();
        let transitions = gathered
            .iter()
            .find(|m| m.name() == "order_transitions_total")
            .unwrap();
        assert_eq!(transitions.metric.len(), 2);
        assert_eq!(
            metrics
                .transitions_total
                .with_label_values(&["confirm", "accepted"])
                .get(),
            2
        );
    }

    #[test]
    fn test_circuit_breaker_gauge() {
        let metrics = DispatchMetrics::new().unwrap();
        metrics.set_circuit_breaker_state(1);
        assert_eq!(metrics.circuit_breaker_state.get(), 1);
    }
}
