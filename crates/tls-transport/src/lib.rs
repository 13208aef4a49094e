//! Mutual-TLS transport material for kafka-relay.
//!
//! [`SecureTransport`] loads a CA bundle, a client certificate chain and a
//! client private key, and proves they form a usable client identity by
//! building a `rustls` client configuration from them. Broker clients then
//! take the validated PEM texts; a broken certificate setup therefore fails
//! at startup rather than on the first broker connection.

mod error;

#[cfg(any(test, feature = "testing"))]
pub mod testing;


use std::fmt;
use std::path::Path;
use std::sync::Arc;

use rustls::pki_types::pem::{self, PemObject};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ClientConfig, RootCertStore};
use tracing::{info, warn};

pub use error::{Result, TlsError};

const CA_CERTIFICATE: &str = "CA certificate";
const CLIENT_CERTIFICATE: &str = "client certificate";
const CLIENT_KEY: &str = "client key";

/// Validated mutual-TLS material.
#[derive(Clone)]
pub struct SecureTransport {
    ca_pem: String,
    certificate_pem: String,
    key_pem: String,
    insecure_skip_verify: bool,
    ca_count: usize,
    chain_len: usize,
    client_config: Arc<ClientConfig>,
}

impl SecureTransport {
    /// Load and validate PEM files.
    ///
    /// `insecure_skip_verify` turns off broker certificate verification in the
    /// clients built from this transport. The client still presents its
    /// certificate.
    pub fn from_files(
        ca_file: impl AsRef<Path>,
        cert_file: impl AsRef<Path>,
        key_file: impl AsRef<Path>,
        insecure_skip_verify: bool,
    ) -> Result<Self> {
        let ca_pem = read_pem(CA_CERTIFICATE, ca_file.as_ref())?;
        let certificate_pem = read_pem(CLIENT_CERTIFICATE, cert_file.as_ref())?;
        let key_pem = read_pem(CLIENT_KEY, key_file.as_ref())?;

        Self::from_pem(ca_pem, certificate_pem, key_pem, insecure_skip_verify)
    }

    /// Validate PEM texts already in memory.
    pub fn from_pem(
        ca_pem: String,
        certificate_pem: String,
        key_pem: String,
        insecure_skip_verify: bool,
    ) -> Result<Self> {
        let roots = parse_certificates(CA_CERTIFICATE, &ca_pem)?;
        let chain = parse_certificates(CLIENT_CERTIFICATE, &certificate_pem)?;
        let key = parse_private_key(&key_pem)?;

        let ca_count = roots.len();
        let chain_len = chain.len();

        let mut root_store = RootCertStore::empty();
        for root in roots {
            root_store.add(root).map_err(TlsError::InvalidRoot)?;
        }

        let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
        let client_config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()?
            .with_root_certificates(root_store)
            .with_client_auth_cert(chain, key)?;

        if insecure_skip_verify {
            warn!("Broker certificate verification is disabled");
        }
        info!(ca_count, chain_len, "Loaded client TLS material");

        Ok(Self {
            ca_pem,
            certificate_pem,
            key_pem,
            insecure_skip_verify,
            ca_count,
            chain_len,
            client_config: Arc::new(client_config),
        })
    }

    pub fn ca_pem(&self) -> &str {
        &self.ca_pem
    }

    pub fn certificate_pem(&self) -> &str {
        &self.certificate_pem
    }

    pub fn key_pem(&self) -> &str {
        &self.key_pem
    }

    pub fn insecure_skip_verify(&self) -> bool {
        self.insecure_skip_verify
    }

    /// Number of trusted CA certificates.
    pub fn ca_count(&self) -> usize {
        self.ca_count
    }

    /// Length of the client certificate chain.
    pub fn chain_len(&self) -> usize {
        self.chain_len
    }

    /// The `rustls` configuration built from this material.
    ///
    /// Always verifies the server; `insecure_skip_verify` only applies to
    /// broker clients configured from the PEM texts.
    pub fn client_config(&self) -> Arc<ClientConfig> {
        Arc::clone(&self.client_config)
    }
}

impl fmt::Debug for SecureTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureTransport")
            .field("ca_count", &self.ca_count)
            .field("chain_len", &self.chain_len)
            .field("insecure_skip_verify", &self.insecure_skip_verify)
            .field("key_pem", &"<redacted>")
            .finish()
    }
}

fn read_pem(what: &'static str, path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| TlsError::Read {
        what,
        path: path.to_path_buf(),
        source,
    })
}

fn parse_certificates(what: &'static str, pem_text: &str) -> Result<Vec<CertificateDer<'static>>> {
    let certificates = CertificateDer::pem_slice_iter(pem_text.as_bytes())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| TlsError::Pem {
            what,
            message: format!("{e:?}"),
        })?;

    if certificates.is_empty() {
        return Err(TlsError::NoCertificates { what });
    }
    Ok(certificates)
}

fn parse_private_key(pem_text: &str) -> Result<PrivateKeyDer<'static>> {
    PrivateKeyDer::from_pem_slice(pem_text.as_bytes()).map_err(|e| match e {
        pem::Error::NoItemsFound => TlsError::NoPrivateKey,
        other => TlsError::Pem {
            what: CLIENT_KEY,
            message: format!("{other:?}"),
        },
    })
}
