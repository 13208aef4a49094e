//! Command-line interface for kafka-relay
//!
//! # Usage Examples
//!
//! ```bash
//! # Relay with settings from the environment
//! KAFKA_BROKERS=broker:9093 SOURCE_TOPIC=orders DESTINATION_TOPIC=orders-mirror \
//!   kafka-relay run
//!
//! # Verify certificates before deploying
//! kafka-relay check-tls \
//!   --tls-ca-file certs/ca.crt \
//!   --tls-cert-file certs/client.crt \
//!   --tls-key-file certs/client.key
//! ```

use clap::Parser;
use kafka_relay::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => kafka_relay::run(&args).await,
        Command::CheckTls(args) => kafka_relay::check_tls(&args).map(|_| ()),
    }
}
