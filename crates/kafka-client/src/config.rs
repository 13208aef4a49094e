//! librdkafka property sets for the relay's consumer and producer.
//!
//! Offsets are committed by hand, one record at a time, after the record was
//! acknowledged by the destination. Auto commit and the automatic offset
//! store are both off so librdkafka never moves the group cursor on its own.

use rdkafka::config::ClientConfig;
use tls_transport::SecureTransport;

use crate::settings::ClientSettings;

const FETCH_MIN_BYTES: &str = "1";
const FETCH_MAX_BYTES: &str = "10000000";

/// Properties shared by both clients: brokers, timeouts and mutual TLS.
fn base_config(settings: &ClientSettings, transport: &SecureTransport) -> ClientConfig {
    let mut config = ClientConfig::new();
    config
        .set("bootstrap.servers", settings.bootstrap_servers())
        .set(
            "socket.connection.setup.timeout.ms",
            settings.connect_timeout.as_millis().to_string(),
        )
        .set("security.protocol", "ssl")
        .set("ssl.ca.pem", transport.ca_pem())
        .set("ssl.certificate.pem", transport.certificate_pem())
        .set("ssl.key.pem", transport.key_pem());

    if transport.insecure_skip_verify() {
        config
            .set("enable.ssl.certificate.verification", "false")
            .set("ssl.endpoint.identification.algorithm", "none");
    }
    config
}

pub(crate) fn consumer_config(
    settings: &ClientSettings,
    transport: &SecureTransport,
) -> ClientConfig {
    let mut config = base_config(settings, transport);
    config
        .set("group.id", &settings.group_id)
        .set("enable.auto.commit", "false")
        .set("enable.auto.offset.store", "false")
        .set("auto.offset.reset", "earliest")
        .set("enable.partition.eof", "false")
        .set("fetch.min.bytes", FETCH_MIN_BYTES)
        .set("fetch.max.bytes", FETCH_MAX_BYTES)
        .set("session.timeout.ms", settings.session_timeout_ms.to_string())
        .set(
            "heartbeat.interval.ms",
            settings.heartbeat_interval_ms.to_string(),
        );
    config
}

pub(crate) fn producer_config(
    settings: &ClientSettings,
    transport: &SecureTransport,
) -> ClientConfig {
    let mut config = base_config(settings, transport);
    config
        .set("acks", "all")
        .set("enable.idempotence", "true")
        .set("partitioner", &settings.partitioner);
    config
}
