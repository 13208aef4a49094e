//! Source-side client: a group consumer with per-record manual commits.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use futures::FutureExt;
use rdkafka::consumer::{CommitMode, Consumer as RdkafkaConsumer, StreamConsumer};
use rdkafka::message::Message as RdkafkaMessage;
use rdkafka::{Offset, TopicPartitionList};
use relay_types::{CancellationToken, Consumer, Error, Message, Origin, Result};
use tls_transport::SecureTransport;
use tracing::{debug, info};

use crate::config::consumer_config;
use crate::settings::ClientSettings;

/// Reads records from the source topic as a member of a consumer group.
///
/// Every fetched [`Message`] carries a commit action for its own offset, so
/// acknowledging it is independent of whatever the consumer fetched since.
pub struct KafkaConsumer {
    consumer: Option<Arc<StreamConsumer>>,
    topic: String,
}

impl KafkaConsumer {
    /// Create the consumer and subscribe to the source topic.
    ///
    /// No broker round trip happens here; connection problems surface as
    /// fetch failures.
    pub fn new(settings: &ClientSettings, transport: &SecureTransport) -> Result<Self> {
        let consumer: StreamConsumer = consumer_config(settings, transport)
            .create()
            .map_err(|e| Error::Consumer(format!("Failed to create consumer: {e}")))?;

        consumer
            .subscribe(&[&settings.source_topic])
            .map_err(|e| Error::Consumer(format!("Failed to subscribe to topic: {e}")))?;

        info!(
            topic = %settings.source_topic,
            group_id = %settings.group_id,
            "Subscribed to source topic"
        );

        Ok(Self {
            consumer: Some(Arc::new(consumer)),
            topic: settings.source_topic.clone(),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn is_closed(&self) -> bool {
        self.consumer.is_none()
    }
}

#[async_trait]
impl Consumer for KafkaConsumer {
    async fn fetch(&mut self, cancel: &CancellationToken) -> Result<Message> {
        let consumer = self.consumer.as_ref().ok_or(Error::Closed)?;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            received = consumer.recv() => match received {
                Ok(record) => {
                    let message = relay_message(&record);
                    let commit = commit_action(Arc::clone(consumer), message.origin.clone());
                    Ok(message.with_commit(commit))
                }
                Err(e) => Err(Error::Consumer(format!("Error receiving message: {e}"))),
            },
        }
    }

    async fn close(&mut self) -> Result<()> {
        let consumer = self.consumer.take().ok_or(Error::Closed)?;
        consumer.unsubscribe();

        // Leaving the group blocks inside librdkafka. Messages still holding a
        // commit action keep the client alive until they are dropped.
        tokio::task::spawn_blocking(move || drop(consumer))
            .await
            .map_err(|e| Error::Consumer(format!("Failed to close consumer: {e}")))?;

        info!(topic = %self.topic, "Consumer closed");
        Ok(())
    }
}

/// Copy a consumed record into a relay [`Message`] without a commit action.
///
/// A missing key becomes an empty key. A missing payload stays null, so
/// tombstones remain tombstones downstream. A timestamp the broker did not
/// report stays `None`.
pub(crate) fn relay_message<M: RdkafkaMessage>(record: &M) -> Message {
    let key = record.key().unwrap_or_default();
    let message = match record.payload() {
        Some(payload) => Message::new(key, payload),
        None => Message::tombstone(key),
    };

    let mut message = message.with_origin(Origin {
        topic: record.topic().to_string(),
        partition: record.partition(),
        offset: record.offset(),
    });

    if let Some(timestamp) = record
        .timestamp()
        .to_millis()
        .and_then(DateTime::from_timestamp_millis)
    {
        message = message.with_timestamp(timestamp);
    }
    message
}

/// Offset list committing the position right after `origin`.
pub(crate) fn next_offset(origin: &Origin) -> Result<TopicPartitionList> {
    let mut tpl = TopicPartitionList::new();
    tpl.add_partition_offset(
        &origin.topic,
        origin.partition,
        Offset::Offset(origin.offset + 1),
    )
    .map_err(|e| Error::Commit(format!("Failed to add partition offset: {e}")))?;
    Ok(tpl)
}

fn commit_action(
    consumer: Arc<StreamConsumer>,
    origin: Option<Origin>,
) -> impl FnOnce() -> futures::future::BoxFuture<'static, Result<()>> + Send + Sync + 'static {
    move || {
        async move {
            let Some(origin) = origin else {
                return Ok(());
            };
            let tpl = next_offset(&origin)?;

            tokio::task::spawn_blocking(move || consumer.commit(&tpl, CommitMode::Sync))
                .await
                .map_err(|e| Error::Commit(format!("Commit task failed: {e}")))?
                .map_err(|e| Error::Commit(format!("Failed to commit offset: {e}")))?;

            debug!(
                topic = %origin.topic,
                partition = origin.partition,
                offset = origin.offset,
                "Committed offset"
            );
            Ok(())
        }
        .boxed()
    }
}
