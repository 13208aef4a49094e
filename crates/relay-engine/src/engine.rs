//! The relay loop.
//!
//! Reads one message from the consumer, writes it to the producer, and only
//! then commits its offset at the source. One message is in flight at a time,
//! so messages are forwarded in the order they were fetched.
//!
//! Failures inside the loop never stop it:
//!
//! - fetch failure: reported, next fetch (the broker client owns reconnects)
//! - write failure: reported, commit skipped, so the record stays
//!   unacknowledged and is redelivered after a consumer restart
//! - commit failure: reported, loop continues (a duplicate on restart is
//!   acceptable under at-least-once delivery)
//!
//! The loop only exits once the cancellation token is raised.

use std::sync::Arc;

use relay_types::{Consumer, Producer, Result};
use tokio_util::sync::CancellationToken;

use crate::sink::{DiagnosticSink, RelayEvent, TracingSink};

/// Relays messages from a [`Consumer`] to a [`Producer`].
///
/// The relay never closes the consumer or producer. Whoever built them gets
/// them back through [`Relay::into_parts`] and closes them.
pub struct Relay<C, P> {
    consumer: C,
    producer: P,
    sink: Arc<dyn DiagnosticSink>,
}

impl<C, P> Relay<C, P>
where
    C: Consumer,
    P: Producer,
{
    /// Create a relay. Without a sink, events go to [`TracingSink`].
    pub fn new(consumer: C, producer: P, sink: Option<Arc<dyn DiagnosticSink>>) -> Self {
        Self {
            consumer,
            producer,
            sink: sink.unwrap_or_else(|| Arc::new(TracingSink)),
        }
    }

    /// Run until `cancel` is raised.
    ///
    /// Returns `Ok(())` on cancellation. No per-message failure is returned.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<()> {
        loop {
            if cancel.is_cancelled() {
                self.sink.record(&RelayEvent::LoopStopped);
                return Ok(());
            }

            let message = match self.consumer.fetch(cancel).await {
                Ok(message) => message,
                Err(e) if e.is_cancelled() || cancel.is_cancelled() => {
                    self.sink.record(&RelayEvent::LoopStopped);
                    return Ok(());
                }
                Err(e) => {
                    self.sink.record(&RelayEvent::FetchFailed { error: &e });
                    continue;
                }
            };
            self.sink.record(&RelayEvent::MessageReceived { message: &message });

            if let Err(e) = self
                .producer
                .write(cancel, std::slice::from_ref(&message))
                .await
            {
                self.sink.record(&RelayEvent::WriteFailed {
                    message: &message,
                    error: &e,
                });
                continue;
            }
            self.sink
                .record(&RelayEvent::MessageForwarded { message: &message });

            let origin = message.origin.clone();
            match message.commit().await {
                Ok(()) => self.sink.record(&RelayEvent::OffsetCommitted {
                    origin: origin.as_ref(),
                }),
                Err(e) => self.sink.record(&RelayEvent::CommitFailed {
                    origin: origin.as_ref(),
                    error: &e,
                }),
            }
        }
    }

    pub fn consumer(&self) -> &C {
        &self.consumer
    }

    pub fn producer(&self) -> &P {
        &self.producer
    }

    /// Give the consumer and producer back for closing.
    pub fn into_parts(self) -> (C, P) {
        (self.consumer, self.producer)
    }
}
