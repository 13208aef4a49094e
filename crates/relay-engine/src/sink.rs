//! Diagnostic sink for relay loop events.
//!
//! Every fetch, forward, commit and loop exit is reported here. Nothing in
//! the relay's correctness depends on the sink; it exists so operators (and
//! tests) can observe the loop.

use relay_types::{Error, Message, Origin};
use tracing::{debug, error, info, warn};

/// One observable step of the relay loop.
#[derive(Debug)]
pub enum RelayEvent<'a> {
    MessageReceived {
        message: &'a Message,
    },
    MessageForwarded {
        message: &'a Message,
    },
    OffsetCommitted {
        origin: Option<&'a Origin>,
    },
    FetchFailed {
        error: &'a Error,
    },
    WriteFailed {
        message: &'a Message,
        error: &'a Error,
    },
    CommitFailed {
        origin: Option<&'a Origin>,
        error: &'a Error,
    },
    LoopStopped,
}

impl RelayEvent<'_> {
    /// Stable event key.
    pub fn name(&self) -> &'static str {
        match self {
            RelayEvent::MessageReceived { .. } => "message received",
            RelayEvent::MessageForwarded { .. } => "message forwarded",
            RelayEvent::OffsetCommitted { .. } => "offset committed",
            RelayEvent::FetchFailed { .. } => "fetch failed",
            RelayEvent::WriteFailed { .. } => "write failed",
            RelayEvent::CommitFailed { .. } => "commit failed",
            RelayEvent::LoopStopped => "loop stopped",
        }
    }

    /// The underlying error, for failure events.
    pub fn error(&self) -> Option<&Error> {
        match self {
            RelayEvent::FetchFailed { error }
            | RelayEvent::WriteFailed { error, .. }
            | RelayEvent::CommitFailed { error, .. } => Some(*error),
            _ => None,
        }
    }
}

/// Receiver of relay loop events.
pub trait DiagnosticSink: Send + Sync {
    fn record(&self, event: &RelayEvent<'_>);
}

/// Default sink: emits `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn record(&self, event: &RelayEvent<'_>) {
        match event {
            RelayEvent::MessageReceived { message } => {
                let (topic, partition, offset) = origin_fields(message.origin.as_ref());
                info!(
                    key = %String::from_utf8_lossy(&message.key),
                    value_len = message.value_len(),
                    tombstone = message.is_tombstone(),
                    topic,
                    partition,
                    offset,
                    "Received message"
                );
            }
            RelayEvent::MessageForwarded { message } => {
                debug!(
                    key = %String::from_utf8_lossy(&message.key),
                    value_len = message.value_len(),
                    "Forwarded message"
                );
            }
            RelayEvent::OffsetCommitted { origin } => {
                let (topic, partition, offset) = origin_fields(*origin);
                debug!(topic, partition, offset, "Committed offset");
            }
            RelayEvent::FetchFailed { error } => {
                error!(error = %error, "Failed to fetch message");
            }
            RelayEvent::WriteFailed { message, error } => {
                let (topic, partition, offset) = origin_fields(message.origin.as_ref());
                error!(
                    error = %error,
                    key = %String::from_utf8_lossy(&message.key),
                    topic,
                    partition,
                    offset,
                    "Failed to write message"
                );
            }
            RelayEvent::CommitFailed { origin, error } => {
                let (topic, partition, offset) = origin_fields(*origin);
                warn!(error = %error, topic, partition, offset, "Failed to commit offset");
            }
            RelayEvent::LoopStopped => {
                info!("Consumer loop stopped");
            }
        }
    }
}

fn origin_fields(origin: Option<&Origin>) -> (&str, i32, i64) {
    match origin {
        Some(origin) => (origin.topic.as_str(), origin.partition, origin.offset),
        None => ("", -1, -1),
    }
}
