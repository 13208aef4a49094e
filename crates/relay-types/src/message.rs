//! Broker-agnostic message type.
//!
//! A [`Message`] is what a consumer hands to the relay engine and what the
//! engine hands to a producer. It carries the record itself plus a commit
//! action bound to the exact offset it was read from, so acknowledging a
//! message never depends on where the consumer's cursor currently is.

use std::fmt;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;

use crate::error::Result;

/// Deferred acknowledgement of one consumed record.
///
/// `FnOnce` makes double acknowledgement of the same offset unrepresentable.
pub type CommitFn = Box<dyn FnOnce() -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Where a message was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    /// Source topic name
    pub topic: String,
    /// Source partition number
    pub partition: i32,
    /// Offset within the partition
    pub offset: i64,
}

/// A relayed record.
pub struct Message {
    /// Message key (may be empty)
    pub key: Vec<u8>,
    /// Opaque payload, `None` for a tombstone (null value)
    pub value: Option<Vec<u8>>,
    /// Source-assigned timestamp, `None` if the broker reported none
    pub timestamp: Option<DateTime<Utc>>,
    /// Source position, for diagnostics only
    pub origin: Option<Origin>,
    commit: Option<CommitFn>,
}

impl Message {
    /// Create a message without a commit action.
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
            timestamp: None,
            origin: None,
            commit: None,
        }
    }

    /// Create a message with a null value, marking `key` as deleted on
    /// compacted topics.
    pub fn tombstone(key: impl Into<Vec<u8>>) -> Self {
        Self {
            value: None,
            ..Self::new(key, Vec::<u8>::new())
        }
    }

    pub fn is_tombstone(&self) -> bool {
        self.value.is_none()
    }

    /// Payload length, zero for a tombstone.
    pub fn value_len(&self) -> usize {
        self.value.as_ref().map_or(0, Vec::len)
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Attach the commit action for this message's offset.
    pub fn with_commit<F>(mut self, commit: F) -> Self
    where
        F: FnOnce() -> BoxFuture<'static, Result<()>> + Send + Sync + 'static,
    {
        self.commit = Some(Box::new(commit));
        self
    }

    /// Whether a commit action is attached.
    pub fn has_commit(&self) -> bool {
        self.commit.is_some()
    }

    /// Acknowledge consumption of this message.
    ///
    /// Consumes the message. Without an attached action this is a no-op.
    pub async fn commit(self) -> Result<()> {
        match self.commit {
            Some(commit) => commit().await,
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("key", &String::from_utf8_lossy(&self.key))
            .field("value_len", &self.value_len())
            .field("tombstone", &self.is_tombstone())
            .field("timestamp", &self.timestamp)
            .field("origin", &self.origin)
            .field("has_commit", &self.commit.is_some())
            .finish()
    }
}
