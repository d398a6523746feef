//! Derivation of the 32-byte PSK secret from a human-chosen identity/password pair, per
//! the TwinCAT convention: `SHA-256(uppercase(identity) || password)`.

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Length, in bytes, of the pre-shared key used by the TLS-PSK engine.
pub const PSK_LENGTH: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PskKeyError {
    #[error("PSK key must be exactly {expected} bytes, got {found}")]
    WrongLength { expected: usize, found: usize },

    #[error("PSK hex string must decode to exactly {expected} bytes")]
    InvalidHex(#[source] hex::FromHexError),
}

/// A 32-byte TLS-PSK pre-shared secret.
///
/// `Debug` intentionally does not print the key bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct PskKey([u8; PSK_LENGTH]);

impl PskKey {
    /// Derives the key from an identity and password, following the default TwinCAT
    /// convention: `SHA-256(uppercase(identity_utf8) || password_utf8)`.
    ///
    /// Only the case of `identity` used for derivation is normalized; the identity sent
    /// on the wire during the handshake retains the caller's original casing.
    pub fn derive(identity: &str, password: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(identity.to_uppercase().as_bytes());
        hasher.update(password.as_bytes());
        let digest = hasher.finalize();
        Self(digest.into())
    }

    /// Accepts a raw 32-byte key as-is.
    pub fn from_bytes(bytes: [u8; PSK_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Parses a 64-character hex string into a 32-byte key.
    pub fn from_hex(hex_str: &str) -> Result<Self, PskKeyError> {
        let bytes = hex::decode(hex_str).map_err(PskKeyError::InvalidHex)?;
        Self::try_from(bytes.as_slice())
    }

    pub fn as_bytes(&self) -> &[u8; PSK_LENGTH] {
        &self.0
    }
}

impl TryFrom<&[u8]> for PskKey {
    type Error = PskKeyError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.len() != PSK_LENGTH {
            return Err(PskKeyError::WrongLength {
                expected: PSK_LENGTH,
                found: bytes.len(),
            });
        }
        let mut buf = [0u8; PSK_LENGTH];
        buf.copy_from_slice(bytes);
        Ok(Self(buf))
    }
}

impl std::fmt::Debug for PskKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PskKey").field(&"<redacted>").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_matches_twincat_convention() {
        let mut expected_hasher = Sha256::new();
        expected_hasher.update(b"MY-CLIENT");
        expected_hasher.update(b"secret");
        let expected: [u8; 32] = expected_hasher.finalize().into();

        let key = PskKey::derive("my-client", "secret");
        assert_eq!(key.as_bytes(), &expected);
    }

    #[test]
    fn identity_case_does_not_change_derived_key() {
        let lower = PskKey::derive("my-client", "secret");
        let upper = PskKey::derive("MY-CLIENT", "secret");
        let mixed = PskKey::derive("My-Client", "secret");
        assert_eq!(lower.as_bytes(), upper.as_bytes());
        assert_eq!(lower.as_bytes(), mixed.as_bytes());
    }

    #[test]
    fn password_case_does_change_derived_key() {
        let a = PskKey::derive("identity", "secret");
        let b = PskKey::derive("identity", "Secret");
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn from_hex_roundtrip() {
        let raw = [0xABu8; 32];
        let hex_str = hex::encode(raw);
        let key = PskKey::from_hex(&hex_str).unwrap();
        assert_eq!(key.as_bytes(), &raw);
    }

    #[test]
    fn from_hex_rejects_wrong_length() {
        let err = PskKey::from_hex("abcd").unwrap_err();
        assert!(matches!(err, PskKeyError::WrongLength { .. }));
    }

    #[test]
    fn from_bytes_rejects_wrong_length() {
        let err = PskKey::try_from(&[0u8; 10][..]).unwrap_err();
        assert!(matches!(err, PskKeyError::WrongLength { .. }));
    }
}
