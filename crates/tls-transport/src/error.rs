//! Error types for TLS material loading.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TlsError {
    #[error("Failed to read {what} from {path:?}: {source}")]
    Read {
        what: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid PEM in {what}: {message}")]
    Pem { what: &'static str, message: String },

    #[error("No certificates found in {what}")]
    NoCertificates { what: &'static str },

    #[error("No private key found in client key")]
    NoPrivateKey,

    #[error("Failed to append CA certificate: {0}")]
    InvalidRoot(#[source] rustls::Error),

    #[error("Invalid client TLS configuration: {0}")]
    Config(#[from] rustls::Error),
}

pub type Result<T> = std::result::Result<T, TlsError>;
