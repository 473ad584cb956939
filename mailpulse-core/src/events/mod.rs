//! Categorized delivery lifecycle events.

pub mod types;

pub use types::{AcceptedEvent, DeliveredEvent, EventBatch, FailedEvent, FailureSeverity};
