//! High-level client session for TwinCAT ADS and Secure ADS devices.
//!
//! [`AdsClient`] owns a single connection: it assembles the pipeline implied by
//! [`config::SecureAdsConfig`] (plain ADS, or Secure ADS over TLS-PSK/certificate
//! authentication), runs the `TlsConnectInfo` handshake where one applies, and exposes
//! [`AdsCommand`](tcads_core::ads::AdsCommand) request/response pairs correlated by
//! `invokeId`. See [`tcads_core`] for the wire-level primitives this builds on and
//! [`tcads_tls`] for the handshake/TLS-PSK machinery underneath Secure ADS.

pub mod client;
pub mod commands;
pub mod config;
pub mod connection;
pub mod error;
pub mod pipeline;
pub mod runtime;

pub use client::AdsClient;
pub use commands::{DeviceInfo, ReadStateResult};
pub use config::{
    AdsClientConfig, AdsClientConfigBuilder, ConfigError, PskConfig, RouteRegistration,
    SecureAdsConfig, SelfSignedConfig, SelfSignedTrust, SharedCaConfig,
};
pub use error::{AdsClientError, ProtocolError, Result};
pub use runtime::release_shared_resources;

pub use tcads_core::{
    ads::{AdsReturnCode, IndexGroup, IndexOffset},
    ams::{AmsAddr, AmsNetId, AmsPort},
};
