//! The `TlsConnectInfo` application-layer handshake message.
//!
//! Exchanged exactly once, immediately after the TLS handshake completes on a Secure ADS
//! (port 8016) connection. The client sends a request describing its authentication mode;
//! the peer answers with its own [`AmsNetId`] and an [`TlsConnectError`] gate.

use crate::error::{ConnectInfoCodecError, TlsConnectError};
use encoding_rs::WINDOWS_1252;
use tcads_core::AmsNetId;

/// Minimum encoded size: the fixed fields with no username/password.
pub const BASE_SIZE: usize = 64;
/// Maximum encoded size: [`BASE_SIZE`] plus a 255-byte username and 255-byte password.
pub const MAX_SIZE: usize = 512;
/// Fixed width of the hostname field, Windows-1252 encoded and null-padded.
pub const HOSTNAME_LEN: usize = 32;

const VERSION: u8 = 1;

/// Bit flags carried in the `flags` field of a [`TlsConnectInfo`] request or response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectInfoFlags(pub u16);

impl ConnectInfoFlags {
    pub const RESPONSE: u16 = 0x0001;
    pub const AMS_ALLOWED: u16 = 0x0002;
    pub const SERVER_INFO: u16 = 0x0004;
    pub const OWN_FILE: u16 = 0x0008;
    pub const SELF_SIGNED: u16 = 0x0010;
    pub const IP_ADDR: u16 = 0x0020;
    pub const IGNORE_CN: u16 = 0x0040;
    pub const ADD_REMOTE: u16 = 0x0080;

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn contains(self, mask: u16) -> bool {
        self.0 & mask == mask
    }

    pub const fn with(self, mask: u16) -> Self {
        Self(self.0 | mask)
    }

    pub fn is_response(self) -> bool {
        self.contains(Self::RESPONSE)
    }
}

/// Username/password credentials carried by a route-registration request. Both fields
/// are present together or not at all (enforced on construction and decode).
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, ConnectInfoCodecError> {
        let creds = Self {
            username: username.into(),
            password: password.into(),
        };
        creds.encoded_username()?;
        creds.encoded_password()?;
        Ok(creds)
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    fn encoded_username(&self) -> Result<Vec<u8>, ConnectInfoCodecError> {
        encode_cp1252_len_prefixed(&self.username)
    }

    fn encoded_password(&self) -> Result<Vec<u8>, ConnectInfoCodecError> {
        encode_cp1252_len_prefixed(&self.password)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn encode_cp1252_len_prefixed(s: &str) -> Result<Vec<u8>, ConnectInfoCodecError> {
    let (encoded, _, had_errors) = WINDOWS_1252.encode(s);
    if had_errors || encoded.len() > 255 {
        return Err(ConnectInfoCodecError::CredentialTooLong);
    }
    Ok(encoded.into_owned())
}

/// The `TlsConnectInfo` handshake message (request or response).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConnectInfo {
    flags: ConnectInfoFlags,
    error: TlsConnectError,
    ams_net_id: AmsNetId,
    hostname: String,
    credentials: Option<(String, String)>,
}

impl TlsConnectInfo {
    /// Builds a request message. `hostname` is truncated/padded to 32 bytes on the wire;
    /// pass `None` to send an all-zero hostname field.
    pub fn request(
        flags: ConnectInfoFlags,
        ams_net_id: AmsNetId,
        hostname: impl Into<String>,
        credentials: Option<Credentials>,
    ) -> Result<Self, ConnectInfoCodecError> {
        let hostname = hostname.into();
        encode_hostname(&hostname)?;

        let credentials = credentials.map(|c| (c.username, c.password));
        // Enforce the present-iff-both invariant even when called directly (not just on decode).
        match &credentials {
            Some((u, p)) if u.is_empty() || p.is_empty() => {
                return Err(ConnectInfoCodecError::InconsistentCredentials {
                    user_len: u.len(),
                    password_len: p.len(),
                });
            }
            _ => {}
        }

        Ok(Self {
            flags,
            error: TlsConnectError::NoError,
            ams_net_id,
            hostname,
            credentials,
        })
    }

    /// Builds the 64-byte server response (never carries credentials).
    pub fn response(flags: ConnectInfoFlags, error: TlsConnectError, ams_net_id: AmsNetId) -> Self {
        Self {
            flags: ConnectInfoFlags(flags.0 | ConnectInfoFlags::RESPONSE),
            error,
            ams_net_id,
            hostname: String::new(),
            credentials: None,
        }
    }

    pub fn flags(&self) -> ConnectInfoFlags {
        self.flags
    }

    pub fn error(&self) -> TlsConnectError {
        self.error
    }

    pub fn ams_net_id(&self) -> AmsNetId {
        self.ams_net_id
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn credentials(&self) -> Option<(&str, &str)> {
        self.credentials
            .as_ref()
            .map(|(u, p)| (u.as_str(), p.as_str()))
    }

    fn credential_lengths(&self) -> Result<(usize, usize), ConnectInfoCodecError> {
        match &self.credentials {
            None => Ok((0, 0)),
            Some((u, p)) => {
                let u = encode_cp1252_len_prefixed(u)?;
                let p = encode_cp1252_len_prefixed(p)?;
                Ok((u.len(), p.len()))
            }
        }
    }

    /// Total encoded length of this message: `64 + user_len + password_len`.
    pub fn encoded_len(&self) -> Result<usize, ConnectInfoCodecError> {
        let (user_len, password_len) = self.credential_lengths()?;
        Ok(BASE_SIZE + user_len + password_len)
    }

    /// Serializes this message to its wire representation.
    pub fn encode(&self) -> Result<Vec<u8>, ConnectInfoCodecError> {
        let (user_bytes, password_bytes) = match &self.credentials {
            None => (Vec::new(), Vec::new()),
            Some((u, p)) => (encode_cp1252_len_prefixed(u)?, encode_cp1252_len_prefixed(p)?),
        };

        let length = BASE_SIZE + user_bytes.len() + password_bytes.len();
        if !(BASE_SIZE..=MAX_SIZE).contains(&length) {
            return Err(ConnectInfoCodecError::LengthOutOfRange {
                length,
                min: BASE_SIZE,
                max: MAX_SIZE,
            });
        }

        let mut buf = vec![0u8; length];
        buf[0..2].copy_from_slice(&(length as u16).to_le_bytes());
        buf[2..4].copy_from_slice(&self.flags.0.to_le_bytes());
        buf[4] = VERSION;
        buf[5] = self.error.into();
        buf[6..12].copy_from_slice(&self.ams_net_id.to_bytes());
        buf[12] = user_bytes.len() as u8;
        buf[13] = password_bytes.len() as u8;
        // buf[14..32] reserved, already zero.
        buf[32..64].copy_from_slice(&encode_hostname(&self.hostname)?);

        let mut offset = BASE_SIZE;
        buf[offset..offset + user_bytes.len()].copy_from_slice(&user_bytes);
        offset += user_bytes.len();
        buf[offset..offset + password_bytes.len()].copy_from_slice(&password_bytes);

        Ok(buf)
    }

    /// Decodes a message from a byte slice. `bytes` may be longer than the message (the
    /// declared `length` determines how much is consumed); the caller is responsible for
    /// having gathered at least `length` bytes first (see the streaming contract used by
    /// the handshake handler).
    pub fn decode(bytes: &[u8]) -> Result<Self, ConnectInfoCodecError> {
        if bytes.len() < BASE_SIZE {
            return Err(ConnectInfoCodecError::BufferTooSmall {
                expected: BASE_SIZE,
                found: bytes.len(),
            });
        }

        let length = u16::from_le_bytes(bytes[0..2].try_into().unwrap()) as usize;
        if !(BASE_SIZE..=MAX_SIZE).contains(&length) {
            return Err(ConnectInfoCodecError::LengthOutOfRange {
                length,
                min: BASE_SIZE,
                max: MAX_SIZE,
            });
        }
        if bytes.len() < length {
            return Err(ConnectInfoCodecError::BufferTooSmall {
                expected: length,
                found: bytes.len(),
            });
        }

        let flags = ConnectInfoFlags(u16::from_le_bytes(bytes[2..4].try_into().unwrap()));
        // bytes[4] is the protocol version; the client tolerates any value the peer sends.
        let error = TlsConnectError::from(bytes[5]);
        let ams_net_id = AmsNetId::from_bytes(bytes[6..12].try_into().unwrap());
        let user_len = bytes[12] as usize;
        let password_len = bytes[13] as usize;

        if (user_len > 0) != (password_len > 0) {
            return Err(ConnectInfoCodecError::InconsistentCredentials {
                user_len,
                password_len,
            });
        }

        let hostname_bytes = &bytes[32..64];
        let nul = hostname_bytes.iter().position(|&b| b == 0).unwrap_or(HOSTNAME_LEN);
        let (hostname, _, _) = WINDOWS_1252.decode(&hostname_bytes[..nul]);

        if BASE_SIZE + user_len + password_len > length {
            return Err(ConnectInfoCodecError::LengthOutOfRange {
                length,
                min: BASE_SIZE,
                max: MAX_SIZE,
            });
        }

        let credentials = if user_len > 0 {
            let user_start = BASE_SIZE;
            let password_start = user_start + user_len;
            let (username, _, _) = WINDOWS_1252.decode(&bytes[user_start..user_start + user_len]);
            let (password, _, _) =
                WINDOWS_1252.decode(&bytes[password_start..password_start + password_len]);
            Some((username.into_owned(), password.into_owned()))
        } else {
            None
        };

        Ok(Self {
            flags,
            error,
            ams_net_id,
            hostname: hostname.into_owned(),
            credentials,
        })
    }
}

/// Encodes `hostname` into the fixed 32-byte wire field, truncating to fit (never
/// erroring on length) and null-padding the remainder. Only an unrepresentable
/// character — one with no Windows-1252 codepoint — is a hard error.
fn encode_hostname(hostname: &str) -> Result<[u8; HOSTNAME_LEN], ConnectInfoCodecError> {
    let (encoded, _, had_errors) = WINDOWS_1252.encode(hostname);
    if had_errors {
        return Err(ConnectInfoCodecError::HostnameTooLong);
    }
    let mut buf = [0u8; HOSTNAME_LEN];
    let len = encoded.len().min(HOSTNAME_LEN);
    buf[..len].copy_from_slice(&encoded[..len]);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn netid() -> AmsNetId {
        AmsNetId::new(10, 20, 30, 40, 1, 1)
    }

    #[test]
    fn encode_self_signed_route_add_matches_literal_bytes() {
        let flags = ConnectInfoFlags::empty()
            .with(ConnectInfoFlags::ADD_REMOTE)
            .with(ConnectInfoFlags::SELF_SIGNED)
            .with(ConnectInfoFlags::IP_ADDR)
            .with(ConnectInfoFlags::IGNORE_CN);
        assert_eq!(flags.0, 0xF0);

        let creds = Credentials::new("Administrator", "1").unwrap();
        let msg = TlsConnectInfo::request(flags, netid(), "PC-01", Some(creds)).unwrap();

        let bytes = msg.encode().unwrap();
        assert_eq!(bytes.len(), 78);
        assert_eq!(&bytes[0..2], &[0x4E, 0x00]);
        assert_eq!(&bytes[2..4], &[0xF0, 0x00]);
        assert_eq!(bytes[4], 0x01);
        assert_eq!(bytes[5], 0x00);
        assert_eq!(&bytes[6..12], &[0x0A, 0x14, 0x1E, 0x28, 0x01, 0x01]);
        assert_eq!(bytes[12], 13);
        assert_eq!(bytes[13], 1);
        assert!(bytes[14..32].iter().all(|&b| b == 0));
        assert_eq!(&bytes[32..37], b"PC-01");
        assert!(bytes[37..64].iter().all(|&b| b == 0));
        assert_eq!(&bytes[64..77], b"Administrator");
        assert_eq!(bytes[77], b'1');
    }

    #[test]
    fn decode_success_response_has_no_credentials() {
        let mut bytes = vec![0u8; 64];
        bytes[0..2].copy_from_slice(&64u16.to_le_bytes());
        bytes[2..4].copy_from_slice(
            &(ConnectInfoFlags::RESPONSE | ConnectInfoFlags::AMS_ALLOWED).to_le_bytes(),
        );
        bytes[4] = 1;
        bytes[5] = 0;
        bytes[6..12].copy_from_slice(&[0xC0, 0xA8, 0x01, 0x64, 0x01, 0x01]);
        bytes[32..38].copy_from_slice(b"PLC-01");

        let decoded = TlsConnectInfo::decode(&bytes).unwrap();
        assert_eq!(decoded.error(), TlsConnectError::NoError);
        assert_eq!(decoded.hostname(), "PLC-01");
        assert!(decoded.credentials().is_none());
        assert_eq!(decoded.ams_net_id().to_string(), "192.168.1.100.1.1");
    }

    #[test]
    fn decode_rejects_length_out_of_range() {
        let mut bytes = vec![0u8; 64];
        bytes[0..2].copy_from_slice(&2u16.to_le_bytes());
        let err = TlsConnectInfo::decode(&bytes).unwrap_err();
        assert!(matches!(err, ConnectInfoCodecError::LengthOutOfRange { .. }));
    }

    #[test]
    fn decode_rejects_insufficient_bytes() {
        let bytes = vec![0u8; 10];
        let err = TlsConnectInfo::decode(&bytes).unwrap_err();
        assert!(matches!(err, ConnectInfoCodecError::BufferTooSmall { .. }));
    }

    #[test]
    fn decode_rejects_inconsistent_credential_lengths() {
        let mut bytes = vec![0u8; 64];
        bytes[0..2].copy_from_slice(&64u16.to_le_bytes());
        bytes[12] = 5;
        bytes[13] = 0;
        let err = TlsConnectInfo::decode(&bytes).unwrap_err();
        assert!(matches!(err, ConnectInfoCodecError::InconsistentCredentials { .. }));
    }

    #[test]
    fn roundtrip_preserves_all_fields() {
        let creds = Credentials::new("user", "pw").unwrap();
        let msg = TlsConnectInfo::request(
            ConnectInfoFlags::empty().with(ConnectInfoFlags::SELF_SIGNED),
            netid(),
            "host",
            Some(creds),
        )
        .unwrap();
        let len = msg.encoded_len().unwrap();
        let bytes = msg.encode().unwrap();
        assert_eq!(bytes.len(), len);

        let decoded = TlsConnectInfo::decode(&bytes).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn credentials_must_be_both_present_or_both_absent() {
        let creds = Credentials::new("user", "").unwrap();
        assert!(matches!(
            TlsConnectInfo::request(ConnectInfoFlags::empty(), netid(), "host", Some(creds)),
            Err(ConnectInfoCodecError::InconsistentCredentials { .. })
        ));
    }
}
