//! Poll-cycle processors.
//!
//! - `Correlator`: joins one cycle's accepted/delivered/failed batches
//!   against the pending store and emits metrics.
//! - `Poller`: drives fetch+correlate cycles at a fixed cadence.

pub mod correlator;
pub mod poller;

pub use correlator::Correlator;
pub use poller::Poller;
