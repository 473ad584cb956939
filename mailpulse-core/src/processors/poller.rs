//! Fixed-cadence poll loop.
//!
//! One cycle = fetch the latest event window, then apply it to the
//! correlator. Cycles never overlap: the ticker is polled again only
//! after the previous cycle fully completes, so a cycle that outlives
//! the interval delays the next tick instead of running concurrently
//! with it.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use super::Correlator;
use crate::source::EventSource;

/// Default poll cadence.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Drives fetch+correlate cycles until shutdown is signaled.
pub struct Poller<S: EventSource> {
    source: S,
    correlator: Correlator,
    interval: Duration,
    shutdown_rx: watch::Receiver<bool>,
}

impl<S: EventSource> Poller<S> {
    pub fn new(
        source: S,
        correlator: Correlator,
        interval: Duration,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            source,
            correlator,
            interval,
            shutdown_rx,
        }
    }

    /// Run the poll loop.
    ///
    /// The first cycle starts immediately rather than one interval in;
    /// afterwards cycles run once per interval for the process lifetime.
    pub async fn run(mut self) {
        info!(interval_secs = self.interval.as_secs(), "Poller started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        info!("Poller received shutdown signal");
                        break;
                    }
                }

                _ = ticker.tick() => {
                    self.run_cycle().await;
                }
            }
        }

        info!("Poller shutdown complete");
    }

    /// One fetch+correlate cycle.
    ///
    /// A failed fetch ends the cycle with no correlation processing; the
    /// store is untouched and the next tick proceeds normally.
    async fn run_cycle(&self) {
        let batch = match self.source.fetch_events().await {
            Ok(batch) => batch,
            Err(e) => {
                error!(error = %e, "Event fetch failed, skipping cycle");
                return;
            }
        };

        debug!(
            accepted = batch.accepted.len(),
            delivered = batch.delivered.len(),
            failed = batch.failed.len(),
            "Applying event batch"
        );
        self.correlator.apply_batch(&batch);
    }
}
