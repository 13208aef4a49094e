//! Command-line and environment configuration.

mod duration;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use kafka_client::ClientSettings;
use tls_transport::SecureTransport;

pub use duration::parse_duration;

/// Partitioners understood by librdkafka.
pub const PARTITIONERS: [&str; 7] = [
    "random",
    "consistent",
    "consistent_random",
    "murmur2",
    "murmur2_random",
    "fnv1a",
    "fnv1a_random",
];

#[derive(Parser, Debug)]
#[command(name = "kafka-relay")]
#[command(about = "Relay records from one Kafka topic to another over mutual TLS")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Relay records from the source topic to the destination topic until interrupted
    Run(RelayArgs),

    /// Load and validate the TLS material, then exit
    CheckTls(TlsArgs),
}

/// Client certificate material for the broker connections.
#[derive(Args, Debug, Clone)]
pub struct TlsArgs {
    /// CA certificate bundle (PEM) used to verify the brokers
    #[arg(long, env = "TLS_CA_FILE", default_value = "certs/ca.crt")]
    pub tls_ca_file: PathBuf,

    /// Client certificate chain (PEM)
    #[arg(long, env = "TLS_CERT_FILE", default_value = "certs/client.crt")]
    pub tls_cert_file: PathBuf,

    /// Client private key (PEM)
    #[arg(long, env = "TLS_KEY_FILE", default_value = "certs/client.key")]
    pub tls_key_file: PathBuf,

    /// Skip broker certificate and hostname verification
    #[arg(
        long,
        env = "TLS_INSECURE_SKIP_VERIFY",
        default_value_t = true,
        action = clap::ArgAction::Set,
        value_parser = clap::builder::BoolishValueParser::new(),
    )]
    pub tls_insecure_skip_verify: bool,
}

impl TlsArgs {
    /// Read and validate the configured PEM files.
    pub fn load(&self) -> tls_transport::Result<SecureTransport> {
        SecureTransport::from_files(
            &self.tls_ca_file,
            &self.tls_cert_file,
            &self.tls_key_file,
            self.tls_insecure_skip_verify,
        )
    }
}

/// Options of `kafka-relay run`.
#[derive(Args, Debug, Clone)]
pub struct RelayArgs {
    /// Kafka brokers (comma-separated or multiple --brokers)
    #[arg(
        long,
        env = "KAFKA_BROKERS",
        value_delimiter = ',',
        default_value = "localhost:9093"
    )]
    pub brokers: Vec<String>,

    /// Topic to consume from
    #[arg(long, env = "SOURCE_TOPIC", default_value = "source-topic")]
    pub source_topic: String,

    /// Topic to write every consumed record to
    #[arg(long, env = "DESTINATION_TOPIC", default_value = "destination-topic")]
    pub destination_topic: String,

    /// Consumer group ID (committed offsets are kept per group)
    #[arg(long, env = "GROUP_ID", default_value = "exporter-group")]
    pub group_id: String,

    /// Broker connection setup timeout (e.g. "10s", "1m")
    #[arg(
        long,
        env = "KAFKA_CONNECT_TIMEOUT",
        default_value = "10s",
        value_parser = parse_duration
    )]
    pub connect_timeout: Duration,

    /// Consumer group session timeout in milliseconds
    #[arg(long, env = "KAFKA_SESSION_TIMEOUT_MS", default_value_t = 30_000)]
    pub session_timeout_ms: u32,

    /// Consumer group heartbeat interval in milliseconds
    #[arg(long, env = "KAFKA_HEARTBEAT_INTERVAL_MS", default_value_t = 3_000)]
    pub heartbeat_interval_ms: u32,

    /// Producer partitioner
    #[arg(
        long,
        env = "KAFKA_PARTITIONER",
        default_value = "fnv1a_random",
        value_parser = clap::builder::PossibleValuesParser::new(PARTITIONERS)
    )]
    pub partitioner: String,

    #[command(flatten)]
    pub tls: TlsArgs,
}

impl RelayArgs {
    /// Validated client settings for these arguments.
    pub fn client_settings(&self) -> relay_types::Result<ClientSettings> {
        let settings = ClientSettings {
            brokers: self
                .brokers
                .iter()
                .map(|b| b.trim().to_string())
                .filter(|b| !b.is_empty())
                .collect(),
            source_topic: self.source_topic.trim().to_string(),
            destination_topic: self.destination_topic.trim().to_string(),
            group_id: self.group_id.trim().to_string(),
            connect_timeout: self.connect_timeout,
            session_timeout_ms: self.session_timeout_ms,
            heartbeat_interval_ms: self.heartbeat_interval_ms,
            partitioner: self.partitioner.clone(),
        };
        settings.validate()?;
        Ok(settings)
    }
}
