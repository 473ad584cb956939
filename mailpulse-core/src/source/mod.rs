//! Event source capability and the Mailgun-backed implementation.
//!
//! The poll loop depends only on [`EventSource`]; the network-backed
//! adapter lives in [`mailgun`], and tests substitute scripted batches.

pub mod mailgun;

use async_trait::async_trait;

use crate::events::EventBatch;
use mailpulse_sdk::client::ClientError;

/// Errors that end a fetch cycle.
///
/// Both variants are recoverable: the caller skips the cycle and waits
/// for the next tick.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Transport, pagination or API failure from the provider client.
    #[error("event fetch failed: {0}")]
    Client(#[from] ClientError),

    /// The whole paged fetch exceeded its deadline.
    #[error("event fetch timed out after {secs}s")]
    Timeout { secs: u64 },
}

/// A source of categorized event batches, one batch per poll cycle.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn fetch_events(&self) -> Result<EventBatch, FetchError>;
}
