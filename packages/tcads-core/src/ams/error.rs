/// Errors when parsing AmsAddr
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum AddrError {
    /// Invalid NetId part
    #[error("Invalid NetId: {0}")]
    InvalidNetId(#[from] NetIdError),

    /// Invalid port number
    #[error("Invalid port: '{0}'")]
    InvalidPort(String),

    /// Missing separator between NetId and port
    #[error("Missing ':' separator between NetId and port")]
    MissingSeparator,

    /// Buffer too small for address (needs 8 bytes: 6 for NetId + 2 for port)
    #[error("Buffer too small: expected {} bytes, found {}", expected, found)]
    BufferTooSmall { expected: usize, found: usize },

    /// Invalid format
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Errors when parsing AmsNetId
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum NetIdError {
    /// Wrong number of octets (expected 6)
    #[error("Expected {} octets, found {}", expected, found)]
    WrongOctetCount { expected: usize, found: usize },

    /// Invalid octet value (not a valid u8)
    #[error("Invalid octet at position {}: '{}'", position, value)]
    InvalidOctet { position: usize, value: String },

    /// Buffer too small for NetId
    #[error("Buffer too small: expected {} bytes, found {}", expected, found)]
    BufferTooSmall { expected: usize, found: usize },

    /// Invalid format (e.g. missing dots)
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}
