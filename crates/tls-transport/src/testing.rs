//! Throwaway certificates for tests.
//!
//! Generates a self-signed CA and a client certificate/key signed by it.
//! Panics on failure; only meant for test code.

use std::path::{Path, PathBuf};

use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, KeyPair, KeyUsagePurpose};

/// PEM texts of a generated CA and client identity.
pub struct TestMaterial {
    pub ca_pem: String,
    pub certificate_pem: String,
    pub key_pem: String,
}

/// Paths of [`TestMaterial`] written to disk.
pub struct TestPaths {
    pub ca: PathBuf,
    pub cert: PathBuf,
    pub key: PathBuf,
}

impl TestMaterial {
    pub fn generate() -> Self {
        let ca_key = KeyPair::generate().expect("generate CA key");
        let mut ca_params =
            CertificateParams::new(Vec::<String>::new()).expect("CA certificate params");
        ca_params
            .distinguished_name
            .push(DnType::CommonName, "Test CA");
        ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        ca_params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
        let ca_cert = ca_params.self_signed(&ca_key).expect("self-sign CA");

        let client_key = KeyPair::generate().expect("generate client key");
        let mut client_params = CertificateParams::new(vec!["localhost".to_string()])
            .expect("client certificate params");
        client_params
            .distinguished_name
            .push(DnType::CommonName, "Test Client");
        let client_cert = client_params
            .signed_by(&client_key, &ca_cert, &ca_key)
            .expect("sign client certificate");

        Self {
            ca_pem: ca_cert.pem(),
            certificate_pem: client_cert.pem(),
            key_pem: client_key.serialize_pem(),
        }
    }

    /// Write `ca.crt`, `client.crt` and `client.key` into `dir`.
    pub fn write_to(&self, dir: &Path) -> TestPaths {
        let paths = TestPaths {
            ca: dir.join("ca.crt"),
            cert: dir.join("client.crt"),
            key: dir.join("client.key"),
        };
        std::fs::write(&paths.ca, &self.ca_pem).expect("write CA certificate");
        std::fs::write(&paths.cert, &self.certificate_pem).expect("write client certificate");
        std::fs::write(&paths.key, &self.key_pem).expect("write client key");
        paths
    }
}
