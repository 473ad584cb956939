//! Correlation engine.
//!
//! The Correlator is responsible for:
//! - Inserting accepted events into the pending store
//! - Matching delivered events against pending entries and emitting
//!   latency samples
//! - Clearing pending state on permanent failures and counting every
//!   failure
//!
//! Latency samples are dimensioned by the sending domain, not the
//! individual message, to keep metric cardinality bounded.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::correlation::{CorrelationKey, PendingStore};
use crate::events::{AcceptedEvent, DeliveredEvent, EventBatch, FailedEvent, FailureSeverity};
use crate::metrics::DeliveryMetrics;

/// Joins lifecycle events that share a `(message id, recipient)` key and
/// turns the joins into metrics.
pub struct Correlator {
    store: Arc<PendingStore>,
    metrics: Arc<DeliveryMetrics>,
    /// Sending domain, the metric dimension for every sample.
    domain: String,
    /// Retention for pending entries created by accepted events.
    retention: Duration,
}

impl Correlator {
    pub fn new(
        store: Arc<PendingStore>,
        metrics: Arc<DeliveryMetrics>,
        domain: impl Into<String>,
        retention: Duration,
    ) -> Self {
        Self {
            store,
            metrics,
            domain: domain.into(),
            retention,
        }
    }

    /// Apply one cycle's batches.
    ///
    /// Accepted events go first so an accept-and-deliver pair observed
    /// within a single poll window still correlates; failed events go
    /// last.
    pub fn apply_batch(&self, batch: &EventBatch) {
        self.record_accepted(&batch.accepted);
        self.record_delivered(&batch.delivered);
        self.record_failed(&batch.failed);
    }

    fn record_accepted(&self, events: &[AcceptedEvent]) {
        for event in events {
            let key = CorrelationKey::new(&event.message_id, &event.recipient);
            self.store.put(key, event.timestamp, self.retention);
        }
    }

    fn record_delivered(&self, events: &[DeliveredEvent]) {
        for event in events {
            let key = CorrelationKey::new(&event.message_id, &event.recipient);

            // Absent means never seen, already expired, or consumed by a
            // duplicate notification. Expected steady state, not an error.
            let Some(accepted_at) = self.store.take(&key) else {
                debug!(key = %key, "No pending entry for delivered event");
                continue;
            };

            let delta = event.timestamp - accepted_at;
            if delta < 0.0 {
                warn!(
                    key = %key,
                    accepted_at,
                    delivered_at = event.timestamp,
                    "Delivery time is negative, dropping sample"
                );
                continue;
            }

            debug!(
                key = %key,
                accepted_at,
                delivered_at = event.timestamp,
                delivery_secs = delta,
                "Delivery correlated"
            );
            self.metrics.observe_delivery_time(&self.domain, delta);
        }
    }

    fn record_failed(&self, events: &[FailedEvent]) {
        for event in events {
            if event.severity == FailureSeverity::Permanent {
                // A permanently failed recipient can never deliver; the
                // pending entry must not linger to be spuriously matched.
                let key = CorrelationKey::new(&event.message_id, &event.recipient);
                self.store.remove(&key);
            }

            debug!(
                message_id = %event.message_id,
                recipient = %event.recipient,
                reason = %event.reason,
                severity = %event.severity,
                code = event.status_code,
                "Delivery failed"
            );
            self.metrics.inc_delivery_error(
                &self.domain,
                &event.reason,
                event.severity.as_str(),
                event.status_code,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    const DOMAIN: &str = "mail.example.test";
    const RETENTION: Duration = Duration::from_secs(10 * 60 * 60);

    struct Fixture {
        store: Arc<PendingStore>,
        metrics: Arc<DeliveryMetrics>,
        correlator: Correlator,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(PendingStore::new());
        let metrics = Arc::new(DeliveryMetrics::new().unwrap());
        let correlator = Correlator::new(store.clone(), metrics.clone(), DOMAIN, RETENTION);
        Fixture {
            store,
            metrics,
            correlator,
        }
    }

    fn accepted(id: &str, recipient: &str, timestamp: f64) -> AcceptedEvent {
        AcceptedEvent {
            message_id: id.into(),
            recipient: recipient.into(),
            timestamp,
        }
    }

    fn delivered(id: &str, recipient: &str, timestamp: f64) -> DeliveredEvent {
        DeliveredEvent {
            message_id: id.into(),
            recipient: recipient.into(),
            timestamp,
        }
    }

    fn failed(
        id: &str,
        recipient: &str,
        severity: FailureSeverity,
        reason: &str,
        status_code: u16,
    ) -> FailedEvent {
        FailedEvent {
            message_id: id.into(),
            recipient: recipient.into(),
            timestamp: 0.0,
            severity,
            reason: reason.into(),
            status_code,
        }
    }

    fn accepted_batch(events: Vec<AcceptedEvent>) -> EventBatch {
        EventBatch {
            accepted: events,
            ..Default::default()
        }
    }

    fn delivered_batch(events: Vec<DeliveredEvent>) -> EventBatch {
        EventBatch {
            delivered: events,
            ..Default::default()
        }
    }

    fn failed_batch(events: Vec<FailedEvent>) -> EventBatch {
        EventBatch {
            failed: events,
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn delivered_joins_with_accepted_from_an_earlier_cycle() {
        let f = fixture();
        f.correlator
            .apply_batch(&accepted_batch(vec![accepted("m1", "a@x.test", 1000.0)]));
        f.correlator
            .apply_batch(&delivered_batch(vec![delivered("m1", "a@x.test", 1010.0)]));

        assert_eq!(f.metrics.delivery_time_snapshot(DOMAIN), (1, 10.0));
        assert!(f.store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn accept_and_deliver_in_the_same_cycle_correlate() {
        let f = fixture();
        f.correlator.apply_batch(&EventBatch {
            accepted: vec![accepted("m1", "a@x.test", 1000.0)],
            delivered: vec![delivered("m1", "a@x.test", 1002.5)],
            failed: vec![],
        });

        assert_eq!(f.metrics.delivery_time_snapshot(DOMAIN), (1, 2.5));
        assert!(f.store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unmatched_delivered_produces_no_sample() {
        let f = fixture();
        f.correlator
            .apply_batch(&accepted_batch(vec![accepted("m1", "a@x.test", 1000.0)]));
        f.correlator
            .apply_batch(&delivered_batch(vec![delivered("m2", "a@x.test", 1010.0)]));

        assert_eq!(f.metrics.delivery_time_snapshot(DOMAIN), (0, 0.0));
        assert_eq!(f.store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_delivered_is_dropped_silently() {
        let f = fixture();
        f.correlator
            .apply_batch(&accepted_batch(vec![accepted("m1", "a@x.test", 1000.0)]));
        f.correlator.apply_batch(&delivered_batch(vec![
            delivered("m1", "a@x.test", 1010.0),
            delivered("m1", "a@x.test", 1011.0),
        ]));

        assert_eq!(f.metrics.delivery_time_snapshot(DOMAIN), (1, 10.0));
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_failure_clears_pending_state() {
        let f = fixture();
        f.correlator
            .apply_batch(&accepted_batch(vec![accepted("m1", "a@x.test", 1000.0)]));
        f.correlator.apply_batch(&failed_batch(vec![failed(
            "m1",
            "a@x.test",
            FailureSeverity::Permanent,
            "bounce",
            550,
        )]));
        f.correlator
            .apply_batch(&delivered_batch(vec![delivered("m1", "a@x.test", 1010.0)]));

        assert_eq!(f.metrics.delivery_time_snapshot(DOMAIN), (0, 0.0));
        assert_eq!(
            f.metrics
                .delivery_error_count(DOMAIN, "bounce", "permanent", 550),
            1
        );
        assert!(f.store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_preserves_pending_state() {
        let f = fixture();
        f.correlator
            .apply_batch(&accepted_batch(vec![accepted("m1", "a@x.test", 1000.0)]));
        f.correlator.apply_batch(&failed_batch(vec![failed(
            "m1",
            "a@x.test",
            FailureSeverity::Transient,
            "generic",
            451,
        )]));
        f.correlator
            .apply_batch(&delivered_batch(vec![delivered("m1", "a@x.test", 1060.0)]));

        assert_eq!(f.metrics.delivery_time_snapshot(DOMAIN), (1, 60.0));
        assert_eq!(
            f.metrics
                .delivery_error_count(DOMAIN, "generic", "transient", 451),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn negative_delta_is_dropped() {
        let f = fixture();
        f.correlator
            .apply_batch(&accepted_batch(vec![accepted("m1", "a@x.test", 1000.0)]));
        f.correlator
            .apply_batch(&delivered_batch(vec![delivered("m1", "a@x.test", 990.0)]));

        assert_eq!(f.metrics.delivery_time_snapshot(DOMAIN), (0, 0.0));
    }

    #[tokio::test(start_paused = true)]
    async fn reinsertion_wins_over_the_first_accepted_timestamp() {
        let f = fixture();
        f.correlator.apply_batch(&accepted_batch(vec![
            accepted("m1", "a@x.test", 1000.0),
            accepted("m1", "a@x.test", 1005.0),
        ]));
        f.correlator
            .apply_batch(&delivered_batch(vec![delivered("m1", "a@x.test", 1010.0)]));

        assert_eq!(f.metrics.delivery_time_snapshot(DOMAIN), (1, 5.0));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_no_longer_correlates() {
        let store = Arc::new(PendingStore::new());
        let metrics = Arc::new(DeliveryMetrics::new().unwrap());
        let correlator = Correlator::new(
            store.clone(),
            metrics.clone(),
            DOMAIN,
            Duration::from_secs(60),
        );

        correlator.apply_batch(&accepted_batch(vec![accepted("m1", "a@x.test", 1000.0)]));
        tokio::time::advance(Duration::from_secs(61)).await;
        correlator.apply_batch(&delivered_batch(vec![delivered("m1", "a@x.test", 1010.0)]));

        assert_eq!(metrics.delivery_time_snapshot(DOMAIN), (0, 0.0));
    }

    #[tokio::test(start_paused = true)]
    async fn two_cycle_scenario_emits_one_sample_and_one_error() {
        let f = fixture();

        f.correlator
            .apply_batch(&accepted_batch(vec![accepted("M1", "r1", 1000.0)]));
        f.correlator.apply_batch(&EventBatch {
            accepted: vec![],
            delivered: vec![delivered("M1", "r1", 1010.0)],
            failed: vec![failed("M2", "r2", FailureSeverity::Permanent, "bounce", 550)],
        });

        assert_eq!(f.metrics.delivery_time_snapshot(DOMAIN), (1, 10.0));
        assert_eq!(
            f.metrics
                .delivery_error_count(DOMAIN, "bounce", "permanent", 550),
            1
        );
        assert!(f.store.is_empty());
    }
}
