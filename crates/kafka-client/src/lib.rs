//! Kafka clients for kafka-relay.
//!
//! [`KafkaConsumer`] and [`KafkaProducer`] implement the relay's
//! [`Consumer`](relay_types::Consumer) and [`Producer`](relay_types::Producer)
//! traits on top of `rdkafka`, both speaking mutual TLS to the brokers.
//!
//! # Delivery guarantee
//!
//! The producer waits for acknowledgement from all in-sync replicas, and the
//! consumer commits a record's offset only when the relay asks it to, after
//! that acknowledgement. A crash between the two redelivers the record on
//! restart: delivery is at-least-once.

mod config;
pub mod consumer;
pub mod producer;
pub mod settings;

pub use consumer::KafkaConsumer;
pub use producer::KafkaProducer;
pub use settings::ClientSettings;

use relay_types::Result;
use tls_transport::SecureTransport;
use tracing::info;

/// Build the consumer/producer pair for one relay.
///
/// Fails on invalid settings or when librdkafka rejects the configuration.
/// Brokers are not contacted yet.
pub fn connect(
    settings: &ClientSettings,
    transport: &SecureTransport,
) -> Result<(KafkaConsumer, KafkaProducer)> {
    settings.validate()?;

    info!(
        brokers = %settings.bootstrap_servers(),
        source = %settings.source_topic,
        destination = %settings.destination_topic,
        "Connecting Kafka clients"
    );

    let consumer = KafkaConsumer::new(settings, transport)?;
    let producer = KafkaProducer::new(settings, transport)?;
    Ok((consumer, producer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::relay_message;
    use crate::producer::record_for;
    use rdkafka::message::{OwnedMessage, Timestamp};
    use relay_types::Error;
    use tls_transport::testing::TestMaterial;

    fn consumed(key: Option<&[u8]>, payload: Option<&[u8]>) -> OwnedMessage {
        OwnedMessage::new(
            payload.map(<[u8]>::to_vec),
            key.map(<[u8]>::to_vec),
            "source-topic".to_string(),
            Timestamp::CreateTime(1_700_000_000_000),
            0,
            7,
            None,
        )
    }

    #[test]
    fn test_tombstone_round_trip_stays_null() {
        let message = relay_message(&consumed(Some(&b"user-1"[..]), None));
        let record = record_for("destination-topic", &message);

        assert_eq!(record.key, Some(&b"user-1"[..]));
        assert_eq!(record.payload, None);
        assert_eq!(record.timestamp, Some(1_700_000_000_000));
    }

    #[test]
    fn test_payload_round_trip_is_unchanged() {
        let message = relay_message(&consumed(
            Some(&b"user-1"[..]),
            Some(&b"\x00\x01payload"[..]),
        ));
        let record = record_for("destination-topic", &message);

        assert_eq!(record.payload, Some(&b"\x00\x01payload"[..]));

        let message = relay_message(&consumed(Some(&b"user-1"[..]), Some(&b""[..])));
        let record = record_for("destination-topic", &message);
        assert_eq!(record.payload, Some(&b""[..]));
    }

    #[test]
    fn test_connect_rejects_invalid_settings() {
        let material = TestMaterial::generate();
        let transport = SecureTransport::from_pem(
            material.ca_pem,
            material.certificate_pem,
            material.key_pem,
            false,
        )
        .unwrap();
        let settings = ClientSettings {
            destination_topic: "source-topic".to_string(),
            ..Default::default()
        };

        let err = connect(&settings, &transport).err().unwrap();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }
}
