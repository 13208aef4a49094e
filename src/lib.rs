//! kafka-relay library
//!
//! Consumes records from a source Kafka topic and writes each one to a
//! destination topic over mutual TLS, committing the source offset only after
//! the destination acknowledged the write (at-least-once delivery).
//!
//! # Crates
//!
//! - `relay-types` - Message and Consumer/Producer traits
//! - `relay-engine` - the fetch, forward, commit loop
//! - `kafka-client` - rdkafka-backed Consumer and Producer
//! - `tls-transport` - client certificate loading and validation
//!
//! # CLI Usage
//!
//! ```bash
//! # Relay until SIGINT/SIGTERM
//! kafka-relay run --brokers broker-1:9093,broker-2:9093 \
//!   --source-topic orders --destination-topic orders-mirror \
//!   --tls-ca-file certs/ca.crt --tls-cert-file certs/client.crt --tls-key-file certs/client.key
//!
//! # Validate certificates only
//! kafka-relay check-tls --tls-ca-file certs/ca.crt
//! ```

use anyhow::Context;
use relay_engine::Relay;
use relay_types::{CancellationToken, Consumer, Producer};
use tls_transport::SecureTransport;
use tracing::{error, info};

pub mod config;
pub mod shutdown;

pub use config::{Cli, Command, RelayArgs, TlsArgs};
pub use shutdown::install_shutdown_handler;

/// Run `kafka-relay run` to completion.
///
/// Startup failures (configuration, TLS material, client creation) are
/// returned. Once the relay runs, only a cancellation stops it.
pub async fn run(args: &RelayArgs) -> anyhow::Result<()> {
    let settings = args
        .client_settings()
        .context("Invalid relay configuration")?;
    let transport = args.tls.load().context("Failed to load TLS material")?;

    // Before the clients exist: a failed install leaves nothing to close.
    let cancel = CancellationToken::new();
    let watcher = install_shutdown_handler(cancel.clone())?;

    let (consumer, producer) = match kafka_client::connect(&settings, &transport) {
        Ok(clients) => clients,
        Err(e) => {
            cancel.cancel();
            let _ = watcher.await;
            return Err(e).context("Failed to create Kafka clients");
        }
    };

    info!(
        source = %settings.source_topic,
        destination = %settings.destination_topic,
        group_id = %settings.group_id,
        "Relay started"
    );
    relay_until_cancelled(consumer, producer, &cancel).await?;

    info!("Shutdown complete");
    Ok(())
}

/// Relay until `cancel` is raised, then close the consumer and the producer.
///
/// Close failures are logged, not returned. The closed clients are handed
/// back to the caller.
pub async fn relay_until_cancelled<C, P>(
    consumer: C,
    producer: P,
    cancel: &CancellationToken,
) -> anyhow::Result<(C, P)>
where
    C: Consumer,
    P: Producer,
{
    let mut relay = Relay::new(consumer, producer, None);
    let result = relay.run(cancel).await;

    let (mut consumer, mut producer) = relay.into_parts();
    if let Err(e) = consumer.close().await {
        error!("Failed to close consumer: {e}");
    }
    if let Err(e) = producer.close().await {
        error!("Failed to close producer: {e}");
    }

    result.context("Relay stopped with an error")?;
    Ok((consumer, producer))
}

/// Run `kafka-relay check-tls`.
pub fn check_tls(args: &TlsArgs) -> anyhow::Result<SecureTransport> {
    let transport = args.load().context("Failed to load TLS material")?;
    info!(
        ca_certificates = transport.ca_count(),
        chain_len = transport.chain_len(),
        insecure_skip_verify = transport.insecure_skip_verify(),
        "TLS material is valid"
    );
    Ok(transport)
}
