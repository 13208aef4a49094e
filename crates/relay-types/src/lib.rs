//! Shared types for kafka-relay.
//!
//! This crate defines the broker-agnostic [`Message`] and the [`Consumer`] /
//! [`Producer`] capability traits that the relay engine is written against.
//!
//! # Dependency Direction
//!
//! Concrete broker clients (`kafka-client`) and the engine (`relay-engine`)
//! both depend on this crate. It depends on neither, and has no broker client
//! dependency of its own.

pub mod error;
pub mod message;
pub mod traits;

pub use error::{Error, Result};
pub use message::{CommitFn, Message, Origin};
pub use traits::{Consumer, Producer};

// Re-exported so implementors name the same token type as the engine.
pub use tokio_util::sync::CancellationToken;
