//! Relay engine for kafka-relay.
//!
//! [`Relay`] moves records from a [`Consumer`](relay_types::Consumer) to a
//! [`Producer`](relay_types::Producer), committing each source offset only
//! after the record was durably written downstream.
//!
//! The engine has no broker dependency. Concrete clients live in
//! `kafka-client`; in-memory doubles for tests live in [`testing`].

pub mod engine;
pub mod sink;
pub mod testing;

pub use engine::Relay;
pub use sink::{DiagnosticSink, RelayEvent, TracingSink};
