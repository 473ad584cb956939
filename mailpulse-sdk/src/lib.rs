#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

//! Shared surface for the Mailgun Events API: wire types and the
//! paginating HTTP client.
//!
//! The client is gated behind the `client` cargo feature so downstream
//! crates that only need the event types do not pull in `reqwest`.

pub mod objects;

#[cfg(feature = "client")]
pub mod client;
