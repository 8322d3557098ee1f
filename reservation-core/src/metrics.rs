//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `reservations_created_total` - Reservations placed
//! - `reservations_ordered_total` - Reservations paid
//! - `reservations_expired_total` - Reservations released by timeout
//! - `reservation_payment_attempts_total` - Accepted payment starts
//! - `reservation_payment_failures_total` - Failed or abandoned attempts
//! - `reservation_persistence_failures_total` - Terminal writes that gave up
//! - `reservations_active` - Supervisors currently running

use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

/// Metrics collector
///
/// Owns a private registry so several services can coexist in one process.
#[derive(Clone)]
pub struct ReservationMetrics {
    pub created: IntCounter,
    pub ordered: IntCounter,
    pub expired: IntCounter,
    pub payment_attempts: IntCounter,
    pub payment_failures: IntCounter,
    pub persistence_failures: IntCounter,
    pub active: IntGauge,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl ReservationMetrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let counter = |name: &str, help: &str| -> prometheus::Result<IntCounter> {
            let counter = IntCounter::new(name, help)?;
            registry.register(Box::new(counter.clone()))?;
            Ok(counter)
        };

        let created = counter("reservations_created_total", "Reservations placed")?;
        let ordered = counter("reservations_ordered_total", "Reservations paid")?;
        let expired = counter(
            "reservations_expired_total",
            "Reservations released by timeout",
        )?;
        let payment_attempts = counter(
            "reservation_payment_attempts_total",
            "Accepted payment starts",
        )?;
        let payment_failures = counter(
            "reservation_payment_failures_total",
            "Failed or abandoned payment attempts",
        )?;
        let persistence_failures = counter(
            "reservation_persistence_failures_total",
            "Terminal status writes that exhausted retries",
        )?;

        let active = IntGauge::new("reservations_active", "Supervisors currently running")?;
        registry.register(Box::new(active.clone()))?;

        Ok(Self {
            created,
            ordered,
            expired,
            payment_attempts,
            payment_failures,
            persistence_failures,
            active,
            registry,
        })
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render in the Prometheus text exposition format
    pub fn gather_text(&self) -> String {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::warn!(error = %e, "Failed to encode metrics");
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = ReservationMetrics::new().unwrap();
        assert_eq!(metrics.created.get(), 0);
        assert_eq!(metrics.active.get(), 0);
    }

    #[test]
    fn test_independent_registries() {
        let a = ReservationMetrics::new().unwrap();
        let b = ReservationMetrics::new().unwrap();
        a.created.inc();
        assert_eq!(a.created.get(), 1);
        assert_eq!(b.created.get(), 0);
    }

    #[test]
    fn test_gather_text() {
        let metrics = ReservationMetrics::new().unwrap();
        metrics.expired.inc();
        let text = metrics.gather_text();
        assert!(text.contains("reservations_expired_total 1"));
    }
}
