use std::fmt;

/// The `error` byte of a [`TlsConnectInfo`](crate::connect_info::TlsConnectInfo) message.
///
/// Distinct from [`AdsReturnCode`](tcads_core::AdsReturnCode): this is the result of the
/// application-layer handshake that runs immediately after the TLS handshake completes,
/// not of an ADS command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TlsConnectError {
    NoError,
    Version,
    CnMismatch,
    UnknownCert,
    UnknownUser,
    Unknown(u8),
}

impl TlsConnectError {
    pub const LENGTH: usize = 1;

    pub fn is_error(self) -> bool {
        !matches!(self, TlsConnectError::NoError)
    }
}

impl From<u8> for TlsConnectError {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::NoError,
            1 => Self::Version,
            2 => Self::CnMismatch,
            3 => Self::UnknownCert,
            4 => Self::UnknownUser,
            n => Self::Unknown(n),
        }
    }
}

impl From<TlsConnectError> for u8 {
    fn from(value: TlsConnectError) -> Self {
        match value {
            TlsConnectError::NoError => 0,
            TlsConnectError::Version => 1,
            TlsConnectError::CnMismatch => 2,
            TlsConnectError::UnknownCert => 3,
            TlsConnectError::UnknownUser => 4,
            TlsConnectError::Unknown(n) => n,
        }
    }
}

impl fmt::Display for TlsConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NoError => "NoError",
            Self::Version => "Version",
            Self::CnMismatch => "CnMismatch",
            Self::UnknownCert => "UnknownCert",
            Self::UnknownUser => "UnknownUser",
            Self::Unknown(_) => "Unknown",
        };
        write!(f, "{name}")
    }
}

/// Errors raised while encoding or decoding a [`TlsConnectInfo`](crate::connect_info::TlsConnectInfo).
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ConnectInfoCodecError {
    #[error("declared length {length} out of range [{min}, {max}]")]
    LengthOutOfRange { length: usize, min: usize, max: usize },

    #[error("buffer too small: expected at least {expected} bytes, found {found}")]
    BufferTooSmall { expected: usize, found: usize },

    #[error("credentials invariant violated: user_len={user_len} password_len={password_len}")]
    InconsistentCredentials { user_len: usize, password_len: usize },

    #[error("username/password exceed 255 bytes in Windows-1252")]
    CredentialTooLong,

    #[error("hostname contains a character with no Windows-1252 encoding")]
    HostnameTooLong,
}

/// The taxonomy of failures the PSK TLS engine can surface, per the Secure ADS PSK
/// handshake contract. Never includes the raw PSK bytes or identity.
#[derive(Debug, thiserror::Error)]
pub enum TlsPskError {
    #[error("no compatible cipher suite (handshake_failure)")]
    NoCompatibleSuite,

    #[error("authentication failed (decrypt_error)")]
    AuthenticationFailed,

    #[error("protocol error: {0}")]
    ProtocolError(String),

    #[error("internal TLS engine error: {0}")]
    Internal(String),

    #[error("connection closed (close_notify)")]
    ConnectionClosed,

    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("handshake timed out")]
    HandshakeTimeout,

    #[error("unknown TLS engine error")]
    Unknown,
}

impl TlsPskError {
    /// Classifies a raw OpenSSL error code/alert description into the engine's taxonomy.
    /// `detail` is expected to already have had secrets (PSK, identity) scrubbed.
    pub(crate) fn classify(detail: &str) -> Self {
        let lower = detail.to_ascii_lowercase();
        if lower.contains("handshake failure") {
            Self::NoCompatibleSuite
        } else if lower.contains("decrypt error") || lower.contains("bad record mac") {
            Self::AuthenticationFailed
        } else if lower.contains("illegal parameter")
            || lower.contains("protocol version")
            || lower.contains("unexpected message")
        {
            Self::ProtocolError(detail.to_string())
        } else if lower.contains("close notify") || lower.contains("close_notify") {
            Self::ConnectionClosed
        } else {
            Self::Unknown
        }
    }
}
