//! Event wire types for `GET /v3/{domain}/events`.
//!
//! Only the fields this SDK's consumers read are modeled; everything else
//! in the provider JSON is ignored during deserialization.

use serde::Deserialize;

/// One page of the events listing.
#[derive(Debug, Clone, Deserialize)]
pub struct EventsPage {
    #[serde(default)]
    pub items: Vec<EventRecord>,
    #[serde(default)]
    pub paging: Paging,
}

/// Pagination cursors returned with every page.
///
/// The URLs are opaque. Mailgun supplies a `next` URL on every page,
/// including the last one; an empty page is the only end-of-listing
/// signal.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Paging {
    pub next: Option<String>,
    pub previous: Option<String>,
}

/// A single event record.
#[derive(Debug, Clone, Deserialize)]
pub struct EventRecord {
    /// Event kind as reported by the provider ("accepted", "delivered",
    /// "failed", "opened", ...).
    pub event: String,
    /// Provider timestamp, epoch seconds with microsecond fraction.
    pub timestamp: f64,
    #[serde(default)]
    pub recipient: String,
    #[serde(default, rename = "recipient-domain")]
    pub recipient_domain: String,
    /// Failure severity, present on failed events only.
    #[serde(default)]
    pub severity: Option<String>,
    /// Failure classification ("bounce", "generic", ...), failed events only.
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: MessageInfo,
    #[serde(default, rename = "delivery-status")]
    pub delivery_status: Option<DeliveryStatus>,
}

/// Nested message metadata.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageInfo {
    #[serde(default)]
    pub headers: MessageHeaders,
}

/// Subset of the message headers Mailgun echoes back on each event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageHeaders {
    #[serde(default, rename = "message-id")]
    pub message_id: String,
}

/// SMTP delivery status attached to delivered and failed events.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeliveryStatus {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

impl EventRecord {
    /// The `Message-Id` header, if the provider included one.
    pub fn message_id(&self) -> Option<&str> {
        let id = self.message.headers.message_id.as_str();
        (!id.is_empty()).then_some(id)
    }

    /// SMTP status code from `delivery-status`, if present.
    pub fn status_code(&self) -> Option<i64> {
        self.delivery_status.as_ref().and_then(|status| status.code)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn deserializes_a_realistic_page() {
        let json = r#"{
            "items": [
                {
                    "event": "accepted",
                    "timestamp": 1521243339.873125,
                    "recipient": "alice@example.com",
                    "recipient-domain": "example.com",
                    "message": {
                        "headers": {
                            "message-id": "20180316224155.1.2A2AA41F34EC5A2C@mail.example.com"
                        }
                    }
                },
                {
                    "event": "failed",
                    "timestamp": 1521243402.1182,
                    "recipient": "bob@example.com",
                    "severity": "permanent",
                    "reason": "bounce",
                    "message": {
                        "headers": {
                            "message-id": "20180316224155.1.2A2AA41F34EC5A2C@mail.example.com"
                        }
                    },
                    "delivery-status": {
                        "code": 550,
                        "message": "5.1.1 The email account does not exist."
                    }
                },
                {
                    "event": "complained",
                    "timestamp": 1521243410.0,
                    "recipient": "carol@example.com"
                }
            ],
            "paging": {
                "next": "https://api.mailgun.net/v3/mail.example.com/events/W3siYiI6...",
                "previous": "https://api.mailgun.net/v3/mail.example.com/events/W3siYSI6..."
            }
        }"#;

        let page: EventsPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.items.len(), 3);
        assert!(page.paging.next.is_some());

        let accepted = &page.items[0];
        assert_eq!(accepted.event, "accepted");
        assert_eq!(
            accepted.message_id(),
            Some("20180316224155.1.2A2AA41F34EC5A2C@mail.example.com")
        );
        assert!(accepted.status_code().is_none());

        let failed = &page.items[1];
        assert_eq!(failed.severity.as_deref(), Some("permanent"));
        assert_eq!(failed.reason.as_deref(), Some("bounce"));
        assert_eq!(failed.status_code(), Some(550));

        // Unrecognized kinds still parse; consumers decide what to skip.
        let complained = &page.items[2];
        assert_eq!(complained.event, "complained");
        assert_eq!(complained.message_id(), None);
    }

    #[test]
    fn empty_page_parses_with_defaults() {
        let page: EventsPage = serde_json::from_str(r#"{"items": []}"#).unwrap();
        assert!(page.items.is_empty());
        assert!(page.paging.next.is_none());
    }
}
