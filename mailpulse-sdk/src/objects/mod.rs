//! Wire objects returned by the Mailgun APIs.

pub mod events;

pub use events::{DeliveryStatus, EventRecord, EventsPage, Paging};
