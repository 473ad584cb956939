//! Prometheus collectors for delivery outcomes.
//!
//! The collectors live in a registry owned by [`DeliveryMetrics`] rather
//! than the process-global default registry, so every instance (and every
//! test) scrapes only its own samples.

use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};

/// Metric namespace; the exported names are
/// `mailgun_delivery_time_seconds` and `mailgun_delivery_error`.
const NAMESPACE: &str = "mailgun";

/// Histogram bucket boundaries, sub-second through hour-scale.
const LATENCY_BUCKETS: &[f64] = &[
    0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 40.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0,
];

/// Errors raised while building the collectors.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// Write-only sink for delivery latency samples and delivery error counts.
#[derive(Clone)]
pub struct DeliveryMetrics {
    registry: Registry,
    delivery_time: HistogramVec,
    delivery_error: IntCounterVec,
}

impl DeliveryMetrics {
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let delivery_time = HistogramVec::new(
            HistogramOpts::new(
                "delivery_time_seconds",
                "Seconds between a message being accepted and it reaching the recipient",
            )
            .namespace(NAMESPACE)
            .buckets(LATENCY_BUCKETS.to_vec()),
            &["domain"],
        )?;
        registry.register(Box::new(delivery_time.clone()))?;

        let delivery_error = IntCounterVec::new(
            Opts::new(
                "delivery_error",
                "Delivery failures by reason, severity and SMTP status code",
            )
            .namespace(NAMESPACE),
            &["domain", "reason", "severity", "code"],
        )?;
        registry.register(Box::new(delivery_error.clone()))?;

        Ok(Self {
            registry,
            delivery_time,
            delivery_error,
        })
    }

    /// Record one accepted→delivered latency sample for `domain`.
    pub fn observe_delivery_time(&self, domain: &str, seconds: f64) {
        self.delivery_time
            .with_label_values(&[domain])
            .observe(seconds);
    }

    /// Count one delivery failure for the full dimension tuple.
    pub fn inc_delivery_error(&self, domain: &str, reason: &str, severity: &str, code: u16) {
        self.delivery_error
            .with_label_values(&[domain, reason, severity, &code.to_string()])
            .inc();
    }

    /// The registry holding both collectors, for scraping.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Gather the current metric families.
    pub fn gather(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }

    /// Sample count and sum for `domain`, for test assertions.
    #[cfg(test)]
    pub(crate) fn delivery_time_snapshot(&self, domain: &str) -> (u64, f64) {
        let histogram = self.delivery_time.with_label_values(&[domain]);
        (histogram.get_sample_count(), histogram.get_sample_sum())
    }

    /// Counter value for one dimension tuple, for test assertions.
    #[cfg(test)]
    pub(crate) fn delivery_error_count(
        &self,
        domain: &str,
        reason: &str,
        severity: &str,
        code: u16,
    ) -> u64 {
        self.delivery_error
            .with_label_values(&[domain, reason, severity, &code.to_string()])
            .get()
    }
}
