//! Consumer and Producer capability traits.
//!
//! The relay engine only ever talks to these traits, so any broker client
//! (or an in-memory double) can be plugged in.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::message::Message;

/// Source side of a relay.
#[async_trait]
pub trait Consumer: Send {
    /// Wait for the next message.
    ///
    /// Must return [`Error::Cancelled`](crate::Error::Cancelled) promptly once
    /// `cancel` is raised, so callers can tell shutdown from broker trouble.
    async fn fetch(&mut self, cancel: &CancellationToken) -> Result<Message>;

    /// Release the underlying connection.
    ///
    /// Any later call, including a second `close`, returns
    /// [`Error::Closed`](crate::Error::Closed).
    async fn close(&mut self) -> Result<()>;
}

/// Destination side of a relay.
#[async_trait]
pub trait Producer: Send {
    /// Durably write `messages`, in order.
    ///
    /// Returns only after the broker acknowledged every message, or on the
    /// first failure. Commit actions attached to the messages are never
    /// invoked here.
    async fn write(&mut self, cancel: &CancellationToken, messages: &[Message]) -> Result<()>;

    /// Flush outstanding writes and release the underlying connection.
    ///
    /// Any later call returns [`Error::Closed`](crate::Error::Closed).
    async fn close(&mut self) -> Result<()>;
}
