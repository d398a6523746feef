//! Certificate-based authentication: self-signed and shared-CA TLS 1.2 modes.
//!
//! Structurally this mirrors [`crate::psk::engine`] — the same non-blocking
//! [`crate::psk::stream::MemoryStream`]-backed state machine driving an OpenSSL
//! `SslContext` — but offers the DHE-RSA suite set TwinCAT's cert-based listener
//! expects, disables hostname verification (device certificate CNs are often bare IPs
//! or otherwise mismatched by design), and requires a client certificate for mutual
//! authentication.

pub mod engine;
pub mod keystore;

pub use engine::{CertEngineOutput, CertTlsEngine};
pub use keystore::{CaSource, ClientIdentity};
