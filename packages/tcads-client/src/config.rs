//! Assembling an [`AdsClientConfig`] from a builder call chain or the process environment.
//!
//! This module never touches the network: it validates shapes (net-id strings, PSK
//! hex/length, socket host/port) synchronously and returns a [`ConfigError`] on the first
//! violation. Certificate/CA material is passed through as [`PathBuf`]s; loading the PEM
//! or PKCS#12 bytes from disk is left to [`tcads_tls::cert`] at pipeline-construction time.

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tcads_core::ams::{AddrError, NetIdError};
use tcads_core::{AmsAddr, AmsNetId, AmsPort};
use tcads_tls::{PskKey, PskKeyError};
use thiserror::Error;

const DEFAULT_PLAIN_PORT: u16 = 48898;
const DEFAULT_SECURE_PORT: u16 = 8016;
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration field: {0}")]
    MissingField(&'static str),

    #[error("invalid value for {var}: {source}")]
    InvalidNetId { var: &'static str, source: NetIdError },

    #[error("invalid value for {var}: {source}")]
    InvalidAddr { var: &'static str, source: AddrError },

    #[error("invalid value for {var}: not a valid port number")]
    InvalidPort { var: &'static str },

    #[error("invalid value for {var}: {source}")]
    InvalidPsk { var: &'static str, source: PskKeyError },

    #[error("{0} and {1} were both set; only one PSK source may be configured")]
    ConflictingPskSource(&'static str, &'static str),

    #[error("PSK identity must not be blank")]
    BlankPskIdentity,
}

/// How (if at all) the connection to the target is secured.
#[derive(Debug, Clone)]
pub enum SecureAdsConfig {
    SelfSigned(SelfSignedConfig),
    SharedCa(SharedCaConfig),
    Psk(PskConfig),
}

/// Trust policy for a self-signed peer certificate.
#[derive(Debug, Clone)]
pub enum SelfSignedTrust {
    Pinned([u8; 32]),
    TrustOnFirstUse,
}

/// Username/password credentials sent with a route-registration request, plus the
/// environment-dependent flag bits that accompany them.
#[derive(Debug, Clone)]
pub struct RouteRegistration {
    pub username: String,
    pub password: String,
    pub ip_addr: bool,
    pub ignore_cn: bool,
}

#[derive(Debug, Clone)]
pub struct SelfSignedConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub trust: SelfSignedTrust,
    pub route_registration: Option<RouteRegistration>,
    /// Hostname sent in the `TlsConnectInfo` request. Falls back to [`system_hostname`]
    /// when `None`.
    pub hostname: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SharedCaConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub ca_cert_path: PathBuf,
    pub hostname: Option<String>,
}

#[derive(Clone)]
pub struct PskConfig {
    pub identity: String,
    pub key: PskKey,
    pub hostname: Option<String>,
}

impl std::fmt::Debug for PskConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PskConfig")
            .field("identity", &self.identity)
            .field("key", &"<redacted>")
            .field("hostname", &self.hostname)
            .finish()
    }
}

impl SecureAdsConfig {
    /// The hostname configured for this auth mode, if any.
    pub fn hostname(&self) -> Option<&str> {
        match self {
            SecureAdsConfig::SelfSigned(cfg) => cfg.hostname.as_deref(),
            SecureAdsConfig::SharedCa(cfg) => cfg.hostname.as_deref(),
            SecureAdsConfig::Psk(cfg) => cfg.hostname.as_deref(),
        }
    }
}

/// Best-effort system hostname, read from the platform's conventional environment
/// variable (`COMPUTERNAME` on Windows, `HOSTNAME` on Unix-likes). Falls back to an
/// empty string — an all-zero `TlsConnectInfo` hostname field is a valid encoding, not
/// a configuration error, since the peer never rejects a connection over it.
pub fn system_hostname() -> String {
    env::var("COMPUTERNAME")
        .or_else(|_| env::var("HOSTNAME"))
        .unwrap_or_default()
}

/// A fully-validated set of parameters for [`crate::AdsClient::connect`].
#[derive(Debug, Clone)]
pub struct AdsClientConfig {
    pub host: String,
    pub port: u16,
    pub source: AmsAddr,
    pub target: AmsAddr,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub secure: Option<SecureAdsConfig>,
}

/// Fluent builder mirroring [`AdsClientConfig`]'s field set.
#[derive(Debug, Default)]
pub struct AdsClientConfigBuilder {
    host: Option<String>,
    port: Option<u16>,
    source: Option<AmsAddr>,
    target: Option<AmsAddr>,
    connect_timeout: Option<Duration>,
    request_timeout: Option<Duration>,
    secure: Option<SecureAdsConfig>,
}

impl AdsClientConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn source(mut self, source: AmsAddr) -> Self {
        self.source = Some(source);
        self
    }

    pub fn target(mut self, target: AmsAddr) -> Self {
        self.target = Some(target);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn secure(mut self, secure: SecureAdsConfig) -> Self {
        self.secure = Some(secure);
        self
    }

    pub fn build(self) -> Result<AdsClientConfig, ConfigError> {
        let host = self.host.ok_or(ConfigError::MissingField("host"))?;
        let target = self.target.ok_or(ConfigError::MissingField("target"))?;
        let source = self.source.ok_or(ConfigError::MissingField("source"))?;
        if let Some(SecureAdsConfig::Psk(psk)) = &self.secure {
            validate_psk_identity(&psk.identity)?;
        }
        let port = self
            .port
            .unwrap_or(if self.secure.is_some() { DEFAULT_SECURE_PORT } else { DEFAULT_PLAIN_PORT });

        Ok(AdsClientConfig {
            host,
            port,
            source,
            target,
            connect_timeout: self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            request_timeout: self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            secure: self.secure,
        })
    }
}

impl AdsClientConfig {
    pub fn builder() -> AdsClientConfigBuilder {
        AdsClientConfigBuilder::new()
    }

    /// Reads `TARGET_HOST`, `TARGET_PORT`, `SOURCE_AMS_NET_ID`, `SOURCE_AMS_PORT`,
    /// `TARGET_AMS_NET_ID`, `TARGET_AMS_PORT`, one of the PSK/cert variable groups, and
    /// an optional `TLS_HOSTNAME` (falls back to [`system_hostname`] when absent).
    /// `TARGET_PORT` defaults to `8016` when a secure-mode variable is present, `48898`
    /// otherwise.
    pub fn from_env() -> Result<AdsClientConfig, ConfigError> {
        let host = env_var("TARGET_HOST")?;

        let source_net_id = env_net_id("SOURCE_AMS_NET_ID")?;
        let source_port = env_port("SOURCE_AMS_PORT")?;
        let target_net_id = env_net_id("TARGET_AMS_NET_ID")?;
        let target_port = env_port("TARGET_AMS_PORT")?;

        let secure = secure_config_from_env()?;
        let port = env::var("TARGET_PORT")
            .ok()
            .map(|v| parse_port(&v, "TARGET_PORT"))
            .transpose()?
            .unwrap_or(if secure.is_some() { DEFAULT_SECURE_PORT } else { DEFAULT_PLAIN_PORT });

        Ok(AdsClientConfig {
            host,
            port,
            source: AmsAddr::new(source_net_id, source_port),
            target: AmsAddr::new(target_net_id, target_port),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            secure,
        })
    }
}

fn secure_config_from_env() -> Result<Option<SecureAdsConfig>, ConfigError> {
    let psk_identity = env::var("PSK_IDENTITY").ok();
    let psk_password = env::var("PSK_PASSWORD").ok();
    let psk_key_hex = env::var("PSK_KEY").ok();
    let keystore_path = env::var("TLS_KEYSTORE_PATH").ok();
    let ca_path = env::var("TLS_CA_CERT_PATH").ok();
    let hostname = env::var("TLS_HOSTNAME").ok();

    if let Some(hex) = psk_key_hex {
        if psk_identity.is_some() && psk_password.is_some() {
            return Err(ConfigError::ConflictingPskSource("PSK_KEY", "PSK_IDENTITY/PSK_PASSWORD"));
        }
        let identity = psk_identity.unwrap_or_default();
        validate_psk_identity(&identity)?;
        let key = PskKey::from_hex(&hex).map_err(|source| ConfigError::InvalidPsk { var: "PSK_KEY", source })?;
        return Ok(Some(SecureAdsConfig::Psk(PskConfig { identity, key, hostname })));
    }

    if let (Some(identity), Some(password)) = (psk_identity, psk_password) {
        validate_psk_identity(&identity)?;
        let key = PskKey::derive(&identity, &password);
        return Ok(Some(SecureAdsConfig::Psk(PskConfig { identity, key, hostname })));
    }

    if let (Some(keystore), Some(ca)) = (keystore_path.clone(), ca_path) {
        return Ok(Some(SecureAdsConfig::SharedCa(SharedCaConfig {
            cert_path: PathBuf::from(&keystore),
            key_path: PathBuf::from(&keystore),
            ca_cert_path: PathBuf::from(ca),
            hostname,
        })));
    }

    if let Some(keystore) = keystore_path {
        return Ok(Some(SecureAdsConfig::SelfSigned(SelfSignedConfig {
            cert_path: PathBuf::from(&keystore),
            key_path: PathBuf::from(keystore),
            trust: SelfSignedTrust::TrustOnFirstUse,
            route_registration: None,
            hostname,
        })));
    }

    Ok(None)
}

/// The identity is sent on the wire and used to select the PSK during the TLS-PSK
/// handshake; §3 calls it a "non-blank string", so this is rejected here rather than
/// surfacing as a handshake-time [`tcads_tls::TlsPskError`] once the socket is already open.
fn validate_psk_identity(identity: &str) -> Result<(), ConfigError> {
    if identity.is_empty() {
        return Err(ConfigError::BlankPskIdentity);
    }
    Ok(())
}

fn env_var(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingField(name))
}

fn env_net_id(name: &'static str) -> Result<AmsNetId, ConfigError> {
    env_var(name)?
        .parse()
        .map_err(|source| ConfigError::InvalidNetId { var: name, source })
}

fn env_port(name: &'static str) -> Result<AmsPort, ConfigError> {
    parse_port(&env_var(name)?, name)
}

fn parse_port(value: &str, var: &'static str) -> Result<u16, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidPort { var })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for var in [
            "TARGET_HOST",
            "TARGET_PORT",
            "SOURCE_AMS_NET_ID",
            "SOURCE_AMS_PORT",
            "TARGET_AMS_NET_ID",
            "TARGET_AMS_PORT",
            "PSK_IDENTITY",
            "PSK_PASSWORD",
            "PSK_KEY",
            "TLS_KEYSTORE_PATH",
            "TLS_CA_CERT_PATH",
            "TLS_HOSTNAME",
        ] {
            unsafe { env::remove_var(var) };
        }
    }

    #[test]
    fn from_env_with_no_secure_variables_defaults_to_plain_port() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        unsafe {
            env::set_var("TARGET_HOST", "10.0.0.5");
            env::set_var("SOURCE_AMS_NET_ID", "192.168.1.1.1.1");
            env::set_var("SOURCE_AMS_PORT", "32818");
            env::set_var("TARGET_AMS_NET_ID", "192.168.1.2.1.1");
            env::set_var("TARGET_AMS_PORT", "851");
        }

        let config = AdsClientConfig::from_env().unwrap();
        assert!(config.secure.is_none());
        assert_eq!(config.port, DEFAULT_PLAIN_PORT);
        clear_env();
    }

    #[test]
    fn from_env_rejects_malformed_net_id_without_panicking() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        unsafe {
            env::set_var("TARGET_HOST", "10.0.0.5");
            env::set_var("SOURCE_AMS_NET_ID", "not-a-netid");
            env::set_var("SOURCE_AMS_PORT", "32818");
            env::set_var("TARGET_AMS_NET_ID", "192.168.1.2.1.1");
            env::set_var("TARGET_AMS_PORT", "851");
        }

        let err = AdsClientConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNetId { var: "SOURCE_AMS_NET_ID", .. }));
        clear_env();
    }

    #[test]
    fn builder_requires_host_and_addresses() {
        let err = AdsClientConfigBuilder::new().build().unwrap_err();
        assert!(matches!(err, ConfigError::MissingField("host")));
    }

    #[test]
    fn builder_defaults_secure_port_when_secure_config_present() {
        let config = AdsClientConfigBuilder::new()
            .host("10.0.0.5")
            .source(AmsAddr::new(AmsNetId::new(192, 168, 1, 1, 1, 1), 32818))
            .target(AmsAddr::new(AmsNetId::new(192, 168, 1, 2, 1, 1), 851))
            .secure(SecureAdsConfig::Psk(PskConfig {
                identity: "my-client".to_string(),
                key: PskKey::derive("my-client", "secret"),
                hostname: None,
            }))
            .build()
            .unwrap();
        assert_eq!(config.port, DEFAULT_SECURE_PORT);
    }

    #[test]
    fn builder_rejects_blank_psk_identity() {
        let err = AdsClientConfigBuilder::new()
            .host("10.0.0.5")
            .source(AmsAddr::new(AmsNetId::new(192, 168, 1, 1, 1, 1), 32818))
            .target(AmsAddr::new(AmsNetId::new(192, 168, 1, 2, 1, 1), 851))
            .secure(SecureAdsConfig::Psk(PskConfig {
                identity: String::new(),
                key: PskKey::derive("", "secret"),
                hostname: None,
            }))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::BlankPskIdentity));
    }

    #[test]
    fn from_env_rejects_blank_psk_identity_from_psk_key_alone() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        unsafe {
            env::set_var("TARGET_HOST", "10.0.0.5");
            env::set_var("SOURCE_AMS_NET_ID", "192.168.1.1.1.1");
            env::set_var("SOURCE_AMS_PORT", "32818");
            env::set_var("TARGET_AMS_NET_ID", "192.168.1.2.1.1");
            env::set_var("TARGET_AMS_PORT", "851");
            env::set_var("PSK_KEY", "ab".repeat(32));
        }

        let err = AdsClientConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::BlankPskIdentity));
        clear_env();
    }
}
