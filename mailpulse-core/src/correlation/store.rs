//! Bounded, time-evicting store of accepted-but-unmatched deliveries.
//!
//! The store outlives any single poll cycle: an accepted event and its
//! delivered or failed counterpart routinely land in different polls, so
//! entries stay here until matched or until the retention window lapses.
//! Every entry carries its own deadline, set at insertion and never
//! refreshed by reads. An expired entry behaves as absent for every
//! operation; [`PendingStore::take`] reclaims it lazily and
//! [`run_sweeper`] reclaims the rest eagerly.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info};

/// How long an unmatched entry is kept before it is treated as abandoned.
///
/// Exceeds the provider's worst observed accepted→delivered lag while
/// keeping memory bounded to recent traffic.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(10 * 60 * 60);

/// Cadence of the eager expiry sweep.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Identifies one delivery attempt: a message sent to one recipient.
///
/// Two lifecycle events belong to the same attempt iff their keys are
/// equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationKey {
    message_id: String,
    recipient: String,
}

impl CorrelationKey {
    pub fn new(message_id: impl Into<String>, recipient: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            recipient: recipient.into(),
        }
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }
}

impl std::fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.message_id, self.recipient)
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingEntry {
    accepted_at: f64,
    expires_at: Instant,
}

impl PendingEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Map from [`CorrelationKey`] to the pending accepted-event timestamp,
/// with per-entry expiration.
///
/// Every operation holds the map lock for its whole duration, so a given
/// live entry is observed by at most one `take` caller.
#[derive(Debug, Default)]
pub struct PendingStore {
    inner: Mutex<HashMap<CorrelationKey, PendingEntry>>,
}

impl PendingStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> MutexGuard<'_, HashMap<CorrelationKey, PendingEntry>> {
        // The map stays structurally sound across a panicked holder;
        // recover instead of propagating poison.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace the entry for `key`.
    ///
    /// A second accepted event for the same key overwrites the stored
    /// timestamp and resets the deadline to `now + ttl` (last-write-wins).
    pub fn put(&self, key: CorrelationKey, accepted_at: f64, ttl: Duration) {
        let entry = PendingEntry {
            accepted_at,
            expires_at: Instant::now() + ttl,
        };
        self.map().insert(key, entry);
    }

    /// Remove and return the pending timestamp for `key`, if a live entry
    /// exists. An expired entry is reclaimed and reported as absent.
    pub fn take(&self, key: &CorrelationKey) -> Option<f64> {
        let now = Instant::now();
        let entry = self.map().remove(key)?;
        if entry.is_expired(now) {
            return None;
        }
        Some(entry.accepted_at)
    }

    /// Remove the entry for `key` if present; no-op when absent.
    pub fn remove(&self, key: &CorrelationKey) {
        self.map().remove(key);
    }

    /// Drop every expired entry, returning how many were reclaimed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut map = self.map();
        let before = map.len();
        map.retain(|_, entry| !entry.is_expired(now));
        before - map.len()
    }

    /// Number of entries currently held. Expired entries count until a
    /// sweep or `take` reclaims them.
    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map().is_empty()
    }
}

/// Periodically reclaim expired entries until shutdown is signaled.
///
/// Correctness never depends on this task running: `take` already treats
/// expired entries as absent. The sweep only bounds the memory held by
/// entries whose delivered/failed event never arrives.
pub async fn run_sweeper(
    store: Arc<PendingStore>,
    every: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    info!(
        interval_secs = every.as_secs(),
        "Pending-store sweeper started"
    );

    loop {
        tokio::select! {
            biased;

            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    info!("Pending-store sweeper received shutdown signal");
                    break;
                }
            }

            _ = tokio::time::sleep(every) => {
                let reclaimed = store.purge_expired();
                if reclaimed > 0 {
                    debug!(
                        reclaimed,
                        remaining = store.len(),
                        "Reclaimed expired pending entries"
                    );
                }
            }
        }
    }

    info!("Pending-store sweeper shutdown complete");
}
