//! Mailgun-backed [`EventSource`].
//!
//! Queries a trailing window strictly in the past — the provider is still
//! indexing recent events, so polling up to `now` would return partial
//! windows. Window placement comes from configuration, never from what a
//! previous poll saw.

use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use tracing::debug;

use mailpulse_sdk::client::EventsClient;
use mailpulse_sdk::objects::events::EventRecord;

use super::{EventSource, FetchError};
use crate::events::{AcceptedEvent, DeliveredEvent, EventBatch, FailedEvent, FailureSeverity};

/// Distance between now and the window's newest edge.
pub const DEFAULT_WINDOW_OFFSET: Duration = Duration::from_secs(120);

/// Window width; the oldest edge sits at `now - offset - width`.
pub const DEFAULT_WINDOW_WIDTH: Duration = Duration::from_secs(60);

/// Deadline covering every page of one fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Records per page.
const PAGE_LIMIT: u32 = 100;

const KIND_ACCEPTED: &str = "accepted";
const KIND_DELIVERED: &str = "delivered";
const KIND_FAILED: &str = "failed";

/// Window and timeout settings for the Mailgun source.
#[derive(Debug, Clone)]
pub struct FetchWindow {
    pub offset: Duration,
    pub width: Duration,
    pub timeout: Duration,
}

impl Default for FetchWindow {
    fn default() -> Self {
        Self {
            offset: DEFAULT_WINDOW_OFFSET,
            width: DEFAULT_WINDOW_WIDTH,
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

/// [`EventSource`] backed by the Mailgun Events API.
pub struct MailgunEventSource {
    client: EventsClient,
    window: FetchWindow,
}

impl MailgunEventSource {
    pub fn new(client: EventsClient, window: FetchWindow) -> Self {
        Self { client, window }
    }
}

#[async_trait]
impl EventSource for MailgunEventSource {
    async fn fetch_events(&self) -> Result<EventBatch, FetchError> {
        let (begin, end) = window_bounds(&self.window, OffsetDateTime::now_utc());

        let fetch = self.client.list_events(begin, end, PAGE_LIMIT);
        let records = tokio::time::timeout(self.window.timeout, fetch)
            .await
            .map_err(|_| FetchError::Timeout {
                secs: self.window.timeout.as_secs(),
            })??;

        let batch = categorize(records);
        debug!(
            accepted = batch.accepted.len(),
            delivered = batch.delivered.len(),
            failed = batch.failed.len(),
            begin,
            end,
            "Fetched event window"
        );
        Ok(batch)
    }
}

/// Epoch-second bounds of the trailing window ending at `now - offset`.
fn window_bounds(window: &FetchWindow, now: OffsetDateTime) -> (i64, i64) {
    let end = now - window.offset;
    let begin = end - window.width;
    (begin.unix_timestamp(), end.unix_timestamp())
}

/// Bucket wire records by kind, skipping anything unusable.
fn categorize(records: Vec<EventRecord>) -> EventBatch {
    let mut batch = EventBatch::default();

    for record in records {
        let kind = record.event.clone();

        let Some(message_id) = record.message_id().map(str::to_owned) else {
            debug!(kind = %kind, "Skipping event without a message id");
            continue;
        };
        if record.recipient.is_empty() {
            debug!(kind = %kind, "Skipping event without a recipient");
            continue;
        }

        match kind.as_str() {
            KIND_ACCEPTED => batch.accepted.push(AcceptedEvent {
                message_id,
                recipient: record.recipient,
                timestamp: record.timestamp,
            }),
            KIND_DELIVERED => batch.delivered.push(DeliveredEvent {
                message_id,
                recipient: record.recipient,
                timestamp: record.timestamp,
            }),
            KIND_FAILED => {
                let severity = record
                    .severity
                    .as_deref()
                    .map(FailureSeverity::from_provider)
                    .unwrap_or(FailureSeverity::Transient);
                let status_code = record
                    .status_code()
                    .and_then(|code| u16::try_from(code).ok())
                    .unwrap_or(0);
                let reason = record.reason.clone().unwrap_or_default();

                batch.failed.push(FailedEvent {
                    message_id,
                    recipient: record.recipient,
                    timestamp: record.timestamp,
                    severity,
                    reason,
                    status_code,
                });
            }
            other => debug!(kind = %other, "Ignoring unrecognized event kind"),
        }
    }

    batch
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> EventRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn window_sits_strictly_in_the_past() {
        let window = FetchWindow::default();
        let now = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();

        let (begin, end) = window_bounds(&window, now);
        assert_eq!(end, 1_700_000_000 - 120);
        assert_eq!(begin, end - 60);
    }

    #[test]
    fn buckets_records_by_kind() {
        let records = vec![
            record(json!({
                "event": "accepted",
                "timestamp": 1000.25,
                "recipient": "a@x.test",
                "message": {"headers": {"message-id": "m1"}}
            })),
            record(json!({
                "event": "delivered",
                "timestamp": 1010.5,
                "recipient": "a@x.test",
                "message": {"headers": {"message-id": "m1"}}
            })),
            record(json!({
                "event": "failed",
                "timestamp": 1011.0,
                "recipient": "b@x.test",
                "severity": "permanent",
                "reason": "bounce",
                "message": {"headers": {"message-id": "m2"}},
                "delivery-status": {"code": 550, "message": "mailbox unavailable"}
            })),
            record(json!({
                "event": "opened",
                "timestamp": 1012.0,
                "recipient": "a@x.test",
                "message": {"headers": {"message-id": "m1"}}
            })),
        ];

        let batch = categorize(records);
        assert_eq!(batch.accepted.len(), 1);
        assert_eq!(batch.delivered.len(), 1);
        assert_eq!(batch.failed.len(), 1);
        assert_eq!(batch.len(), 3);

        let failed = &batch.failed[0];
        assert_eq!(failed.severity, FailureSeverity::Permanent);
        assert_eq!(failed.reason, "bounce");
        assert_eq!(failed.status_code, 550);
    }

    #[test]
    fn unknown_severity_counts_as_transient() {
        let batch = categorize(vec![record(json!({
            "event": "failed",
            "timestamp": 1.0,
            "recipient": "a@x.test",
            "severity": "catastrophic",
            "message": {"headers": {"message-id": "m1"}}
        }))]);

        assert_eq!(batch.failed[0].severity, FailureSeverity::Transient);
        assert_eq!(batch.failed[0].status_code, 0);
        assert_eq!(batch.failed[0].reason, "");
    }

    #[test]
    fn records_missing_identifiers_are_skipped() {
        let batch = categorize(vec![
            record(json!({
                "event": "accepted",
                "timestamp": 1.0,
                "recipient": "a@x.test"
            })),
            record(json!({
                "event": "delivered",
                "timestamp": 2.0,
                "message": {"headers": {"message-id": "m1"}}
            })),
        ]);

        assert!(batch.is_empty());
    }
}
