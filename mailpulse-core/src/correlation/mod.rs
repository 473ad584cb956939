//! Cross-cycle correlation of accepted events with their outcomes.

pub mod store;

pub use store::{
    CorrelationKey, DEFAULT_RETENTION, DEFAULT_SWEEP_INTERVAL, PendingStore, run_sweeper,
};
