//! Loading client certificates/keys and CA trust material from disk.
//!
//! Parsing is delegated straight to OpenSSL's own PEM/PKCS12 loaders; this module only
//! wraps the result in a couple of clearly-named types and maps load failures onto
//! [`CertConfigError`].

use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::x509::X509;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CertConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse certificate/key material: {0}")]
    Parse(#[source] openssl::error::ErrorStack),
}

/// The client's own certificate and private key, presented during mutual authentication.
pub struct ClientIdentity {
    pub(crate) cert: X509,
    pub(crate) key: PKey<Private>,
}

impl ClientIdentity {
    /// Loads a PEM-encoded certificate and an unencrypted PEM-encoded private key.
    pub fn from_pem_files(cert_path: &Path, key_path: &Path) -> Result<Self, CertConfigError> {
        let cert_bytes = read_file(cert_path)?;
        let key_bytes = read_file(key_path)?;
        let cert = X509::from_pem(&cert_bytes).map_err(CertConfigError::Parse)?;
        let key = PKey::private_key_from_pem(&key_bytes).map_err(CertConfigError::Parse)?;
        Ok(Self { cert, key })
    }

    /// Loads a PKCS#12 bundle (certificate + key + optional chain) protected by `passphrase`.
    pub fn from_pkcs12_file(path: &Path, passphrase: &str) -> Result<Self, CertConfigError> {
        let bytes = read_file(path)?;
        let pkcs12 = Pkcs12::from_der(&bytes).map_err(CertConfigError::Parse)?;
        let parsed = pkcs12.parse2(passphrase).map_err(CertConfigError::Parse)?;
        let cert = parsed
            .cert
            .ok_or_else(|| CertConfigError::Parse(openssl::error::ErrorStack::get()))?;
        let key = parsed
            .pkey
            .ok_or_else(|| CertConfigError::Parse(openssl::error::ErrorStack::get()))?;
        Ok(Self { cert, key })
    }
}

/// How the peer's certificate is trusted.
pub enum CaSource {
    /// Shared-CA mode: validate the peer's chain against an explicit CA certificate file.
    SharedCa(PathBuf),
    /// Self-signed mode, pinned: accept the peer's leaf certificate only if its SHA-256
    /// fingerprint matches one recorded at route-registration time.
    PinnedFingerprint([u8; 32]),
    /// Self-signed mode, trust-on-first-use: accept any certificate the peer presents and
    /// report its fingerprint back to the caller for out-of-band pinning.
    TrustOnFirstUse,
}

fn read_file(path: &Path) -> Result<Vec<u8>, CertConfigError> {
    fs::read(path).map_err(|source| CertConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}
