//! Secure ADS transport building blocks: the `TlsConnectInfo` application handshake
//! message and the TLS engines that carry it.
//!
//! Secure ADS tunnels the AMS/ADS wire protocol (see [`tcads_core`]) through TLS 1.2 on
//! port 8016 instead of the plain-TCP framing used on port 48898. Immediately after the
//! TLS handshake completes, client and server exchange exactly one [`TlsConnectInfo`]
//! message before any ADS traffic flows. This crate implements that message and the two
//! authentication modes TwinCAT supports: a pre-shared key ([`psk`]) and certificate-based
//! authentication (self-signed or shared-CA, built on the same OpenSSL context machinery).

pub mod cert;
pub mod connect_info;
pub mod error;
pub mod psk;

pub use cert::{CaSource, CertEngineOutput, CertTlsEngine, ClientIdentity};
pub use cert::keystore::CertConfigError;
pub use connect_info::{ConnectInfoFlags, Credentials, TlsConnectInfo, BASE_SIZE, HOSTNAME_LEN, MAX_SIZE};
pub use error::{ConnectInfoCodecError, TlsConnectError, TlsPskError};
pub use psk::{EngineState, PskEngineOutput, PskKey, PskKeyError, PskTlsEngine};
