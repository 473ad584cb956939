//! Domain event types for the delivery lifecycle.
//!
//! These are provider-independent: the source adapter maps wire records
//! into these structs, and nothing downstream ever sees provider JSON.

/// A message was accepted for delivery to one recipient.
#[derive(Debug, Clone)]
pub struct AcceptedEvent {
    pub message_id: String,
    pub recipient: String,
    /// Provider timestamp, epoch seconds with fraction.
    pub timestamp: f64,
}

/// A previously accepted message reached its recipient.
#[derive(Debug, Clone)]
pub struct DeliveredEvent {
    pub message_id: String,
    pub recipient: String,
    /// Provider timestamp, epoch seconds with fraction.
    pub timestamp: f64,
}

/// Delivery to one recipient failed.
#[derive(Debug, Clone)]
pub struct FailedEvent {
    pub message_id: String,
    pub recipient: String,
    /// Provider timestamp, epoch seconds with fraction.
    pub timestamp: f64,
    pub severity: FailureSeverity,
    /// Provider failure classification ("bounce", "generic", ...).
    pub reason: String,
    /// SMTP status code, 0 when the provider omitted one.
    pub status_code: u16,
}

/// Whether the provider will keep retrying a failed delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureSeverity {
    /// No further attempts will occur.
    Permanent,
    /// Retries may still be in flight; the message can still deliver.
    Transient,
}

impl FailureSeverity {
    /// Parse a provider severity string. Anything that is not exactly
    /// "permanent" counts as transient, so a severity the provider adds
    /// later can never clear pending correlation state.
    pub fn from_provider(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("permanent") {
            FailureSeverity::Permanent
        } else {
            FailureSeverity::Transient
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureSeverity::Permanent => "permanent",
            FailureSeverity::Transient => "transient",
        }
    }
}

impl std::fmt::Display for FailureSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One poll cycle's worth of categorized events.
#[derive(Debug, Clone, Default)]
pub struct EventBatch {
    pub accepted: Vec<AcceptedEvent>,
    pub delivered: Vec<DeliveredEvent>,
    pub failed: Vec<FailedEvent>,
}

impl EventBatch {
    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty() && self.delivered.is_empty() && self.failed.is_empty()
    }

    /// Total number of events across all three categories.
    pub fn len(&self) -> usize {
        self.accepted.len() + self.delivered.len() + self.failed.len()
    }
}
