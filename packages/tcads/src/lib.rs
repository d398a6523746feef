//! # TwinCAT ADS for Rust
//!
//! A rust-native implementation of the TwinCAT ADS protocol, including Beckhoff's
//! Secure ADS transport (AMS/ADS tunneled over TLS 1.2 on TCP port 8016).
//!
//! This crate aims to provide a robust way to communicate with TwinCAT devices (PLCs, NC, etc.),
//! without relying on the official Beckhoff `TcAdsDll.dll` or requiring a local TwinCAT
//! installation on the client machine.
//!
//! This crate is composed of the following sub-crates:
//!
//! - [`core`] - Protocol primitives, serialization, and frame I/O
//! - [`tls`] - `TlsConnectInfo` handshake codec and the PSK/certificate TLS 1.2 engines
//! - [`client`] - High-level connection and request management for ADS devices.

pub use tcads_client as client;
pub use tcads_core as core;
pub use tcads_tls as tls;
