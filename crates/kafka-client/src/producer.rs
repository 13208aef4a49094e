//! Destination-side client: an idempotent producer waiting for full acks.

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer as RdkafkaProducer};
use rdkafka::util::Timeout;
use relay_types::{CancellationToken, Error, Message, Producer, Result};
use tls_transport::SecureTransport;
use tracing::{debug, info, warn};

use crate::config::producer_config;
use crate::settings::ClientSettings;

/// Writes records to the destination topic.
pub struct KafkaProducer {
    producer: Option<FutureProducer>,
    topic: String,
    flush_timeout: Duration,
}

impl KafkaProducer {
    pub fn new(settings: &ClientSettings, transport: &SecureTransport) -> Result<Self> {
        let producer: FutureProducer = producer_config(settings, transport)
            .create()
            .map_err(|e| Error::Producer(format!("Failed to create producer: {e}")))?;

        info!(
            topic = %settings.destination_topic,
            partitioner = %settings.partitioner,
            "Producer ready"
        );

        Ok(Self {
            producer: Some(producer),
            topic: settings.destination_topic.clone(),
            flush_timeout: settings.connect_timeout,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn is_closed(&self) -> bool {
        self.producer.is_none()
    }
}

#[async_trait]
impl Producer for KafkaProducer {
    /// Deliver `messages` one after another, each awaited until acknowledged.
    ///
    /// Stops at the first failed delivery; records after it are not sent.
    async fn write(&mut self, cancel: &CancellationToken, messages: &[Message]) -> Result<()> {
        let producer = self.producer.as_ref().ok_or(Error::Closed)?;

        for message in messages {
            let delivery = producer.send(record_for(&self.topic, message), Timeout::Never);

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                result = delivery => {
                    result.map_err(|(e, _)| {
                        Error::Producer(format!("Failed to deliver message: {e}"))
                    })?;
                }
            }
        }

        debug!(topic = %self.topic, count = messages.len(), "Delivered messages");
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let producer = self.producer.take().ok_or(Error::Closed)?;
        let timeout = self.flush_timeout;

        let flushed = tokio::task::spawn_blocking(move || producer.flush(timeout))
            .await
            .map_err(|e| Error::Producer(format!("Failed to close producer: {e}")))?;

        if let Err(e) = flushed {
            warn!(topic = %self.topic, "Producer flush incomplete: {e}");
            return Err(Error::Producer(format!("Failed to flush producer: {e}")));
        }

        info!(topic = %self.topic, "Producer closed");
        Ok(())
    }
}

/// Build the outgoing record.
///
/// A tombstone is sent with a null payload. An empty key is sent as a null
/// key: Kafka distinguishes the two, but a null key is what lets the
/// partitioner spread keyless records, and the consumer side already maps a
/// null source key to an empty one.
pub(crate) fn record_for<'a>(topic: &'a str, message: &'a Message) -> FutureRecord<'a, [u8], [u8]> {
    let mut record = FutureRecord::<[u8], [u8]>::to(topic);

    if let Some(value) = &message.value {
        record = record.payload(value.as_slice());
    }
    if !message.key.is_empty() {
        record = record.key(message.key.as_slice());
    }
    if let Some(timestamp) = message.timestamp {
        record = record.timestamp(timestamp.timestamp_millis());
    }
    record
}
