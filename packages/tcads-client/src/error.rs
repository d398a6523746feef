use std::time::Duration;
use tcads_core::{AdsReturnCode, ads::AdsCommandError};
use tcads_tls::{ConnectInfoCodecError, TlsConnectError, TlsPskError};
use thiserror::Error;

use crate::config::ConfigError;
use tcads_core::io::FrameCodecError;

/// The single error type returned at the public surface of [`crate::AdsClient`].
///
/// Narrower `thiserror` types defined lower in the stack (frame codec, `TlsConnectInfo`
/// codec, TLS/PSK engine, configuration) are folded in with `#[from]` so callers only
/// ever match on this one enum.
#[derive(Debug, Error)]
pub enum AdsClientError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("TLS/PSK handshake failed: {0}")]
    Tls(#[from] TlsPskError),

    #[error("TlsConnectInfo handshake rejected by peer: {0}")]
    Handshake(TlsConnectError),

    #[error("malformed wire message: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("device returned an error: {0}")]
    Application(AdsReturnCode),

    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("request timed out after {0:?}")]
    RequestTimeout(Duration),

    #[error("not connected")]
    NotConnected,

    #[error("connection is disconnecting")]
    Disconnecting,

    #[error("channel became inactive while the call was outstanding")]
    ChannelInactive,
}

/// Malformed-message failures: frame reassembly, the `TlsConnectInfo` codec, or an
/// unexpected/unknown ADS command id in a response header.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error(transparent)]
    Frame(#[from] FrameCodecError),

    #[error(transparent)]
    ConnectInfo(#[from] ConnectInfoCodecError),

    #[error(transparent)]
    Command(#[from] AdsCommandError),

    #[error("response payload too short: expected at least {expected} bytes, got {got}")]
    PayloadTooShort { expected: usize, got: usize },
}

pub type Result<T> = std::result::Result<T, AdsClientError>;
