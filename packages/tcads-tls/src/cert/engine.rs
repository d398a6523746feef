//! Non-blocking TLS 1.2 engine for the certificate-based authentication modes
//! (self-signed, shared-CA). See [`crate::psk::engine`] for the PSK counterpart this
//! mirrors; the two differ only in how the `SslContext` is built and in hostname/chain
//! verification policy.

use crate::cert::keystore::{CaSource, ClientIdentity};
use crate::error::TlsPskError;
use crate::psk::stream::MemoryStream;
use openssl::sha::sha256;
use openssl::ssl::{
    HandshakeError, MidHandshakeSslStream, Ssl, SslContext, SslMethod, SslStream, SslVerifyMode,
    SslVersion,
};
use std::collections::VecDeque;
use std::io::{Read, Write};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// The four DHE-RSA AES CBC/GCM suites TwinCAT's certificate-based listener offers.
const CIPHER_LIST: &str = "DHE-RSA-AES128-SHA256:DHE-RSA-AES256-SHA256:DHE-RSA-AES128-GCM-SHA256:DHE-RSA-AES256-GCM-SHA384";

pub const MAX_PENDING_WRITE_BYTES: usize = 256 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Initial,
    Handshaking,
    Established,
    Closed,
    Failed,
}

#[derive(Debug, Default)]
pub struct CertEngineOutput {
    pub outbound: Vec<u8>,
    pub plaintext: Vec<u8>,
    pub handshake_complete: Option<Result<(), TlsPskError>>,
}

impl CertEngineOutput {
    fn outbound_only(outbound: Vec<u8>) -> Self {
        Self {
            outbound,
            ..Default::default()
        }
    }
}

enum Inner {
    Handshaking(MidHandshakeSslStream<MemoryStream>),
    Established(SslStream<MemoryStream>),
    Done,
}

/// Certificate's SHA-256 fingerprint observed during the handshake, shared with the
/// caller so trust-on-first-use pinning decisions can be made after the fact.
type ObservedFingerprint = Arc<Mutex<Option<[u8; 32]>>>;

pub struct CertTlsEngine {
    state: EngineState,
    inner: Inner,
    pending_ssl: Option<Ssl>,
    pending_writes: VecDeque<Vec<u8>>,
    pending_len: usize,
    observed_fingerprint: ObservedFingerprint,
}

impl CertTlsEngine {
    pub fn new(identity: ClientIdentity, ca: CaSource) -> Result<Self, TlsPskError> {
        let observed_fingerprint = Arc::new(Mutex::new(None));
        let ctx = build_context(identity, ca, observed_fingerprint.clone())?;
        let ssl = Ssl::new(&ctx).map_err(|e| TlsPskError::Internal(e.to_string()))?;

        Ok(Self {
            state: EngineState::Initial,
            inner: Inner::Done,
            pending_ssl: Some(ssl),
            pending_writes: VecDeque::new(),
            pending_len: 0,
            observed_fingerprint,
        })
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_established(&self) -> bool {
        matches!(self.state, EngineState::Established)
    }

    /// The peer certificate's SHA-256 fingerprint, once the handshake has progressed far
    /// enough to present it. Populated regardless of the configured trust mode.
    pub fn peer_fingerprint(&self) -> Option<[u8; 32]> {
        *self.observed_fingerprint.lock().unwrap()
    }

    pub fn on_transport_active(&mut self) -> Result<CertEngineOutput, TlsPskError> {
        let ssl = self
            .pending_ssl
            .take()
            .ok_or_else(|| TlsPskError::Internal("engine already started".into()))?;
        self.state = EngineState::Handshaking;
        self.drive_handshake(ssl.connect(MemoryStream::new()))
    }

    pub fn on_inbound(&mut self, bytes: &[u8]) -> Result<CertEngineOutput, TlsPskError> {
        match std::mem::replace(&mut self.inner, Inner::Done) {
            Inner::Handshaking(mut mid) => {
                mid.get_mut().feed_inbound(bytes);
                self.drive_handshake(mid.handshake())
            }
            Inner::Established(mut stream) => {
                stream.get_mut().feed_inbound(bytes);
                let mut plaintext = Vec::new();
                let mut buf = [0u8; 16 * 1024];
                loop {
                    match stream.read(&mut buf) {
                        Ok(0) => break,
                        Ok(n) => plaintext.extend_from_slice(&buf[..n]),
                        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                        Err(e) => {
                            self.state = EngineState::Failed;
                            self.inner = Inner::Done;
                            return Err(TlsPskError::Transport(e));
                        }
                    }
                }
                let outbound = stream.get_mut().take_outbound();
                self.inner = Inner::Established(stream);
                Ok(CertEngineOutput {
                    outbound,
                    plaintext,
                    handshake_complete: None,
                })
            }
            Inner::Done => {
                self.inner = Inner::Done;
                Ok(CertEngineOutput::default())
            }
        }
    }

    pub fn submit_write(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, TlsPskError> {
        match &mut self.inner {
            Inner::Established(stream) => {
                stream.write_all(plaintext).map_err(TlsPskError::Transport)?;
                Ok(stream.get_mut().take_outbound())
            }
            _ => {
                if self.pending_len + plaintext.len() > MAX_PENDING_WRITE_BYTES {
                    return Err(TlsPskError::Internal(format!(
                        "pending write buffer would exceed {MAX_PENDING_WRITE_BYTES} bytes"
                    )));
                }
                self.pending_len += plaintext.len();
                self.pending_writes.push_back(plaintext.to_vec());
                Ok(Vec::new())
            }
        }
    }

    fn drive_handshake(
        &mut self,
        result: Result<SslStream<MemoryStream>, HandshakeError<MemoryStream>>,
    ) -> Result<CertEngineOutput, TlsPskError> {
        match result {
            Ok(mut stream) => {
                let outbound = stream.get_mut().take_outbound();
                self.state = EngineState::Established;
                let mut outbound = outbound;
                match self.drain_pending(&mut stream) {
                    Ok(more) => outbound.extend(more),
                    Err(e) => {
                        self.inner = Inner::Established(stream);
                        return Err(e);
                    }
                }
                self.inner = Inner::Established(stream);
                debug!("certificate handshake established");
                Ok(CertEngineOutput {
                    outbound,
                    plaintext: Vec::new(),
                    handshake_complete: Some(Ok(())),
                })
            }
            Err(HandshakeError::WouldBlock(mut mid)) => {
                let outbound = mid.get_mut().take_outbound();
                self.inner = Inner::Handshaking(mid);
                Ok(CertEngineOutput::outbound_only(outbound))
            }
            Err(HandshakeError::Failure(mut mid)) => {
                let detail = mid.error().to_string();
                mid.get_mut().take_outbound();
                self.state = EngineState::Failed;
                self.inner = Inner::Done;
                let classified = TlsPskError::classify(&detail);
                warn!(error = %classified, "certificate handshake failed");
                Ok(CertEngineOutput {
                    outbound: Vec::new(),
                    plaintext: Vec::new(),
                    handshake_complete: Some(Err(classified)),
                })
            }
            Err(HandshakeError::SetupFailure(e)) => {
                self.state = EngineState::Failed;
                self.inner = Inner::Done;
                warn!(error = %e, "certificate handshake setup failed");
                Err(TlsPskError::Internal(e.to_string()))
            }
        }
    }

    fn drain_pending(&mut self, stream: &mut SslStream<MemoryStream>) -> Result<Vec<u8>, TlsPskError> {
        let mut outbound = Vec::new();
        while let Some(write) = self.pending_writes.pop_front() {
            self.pending_len -= write.len();
            stream.write_all(&write).map_err(TlsPskError::Transport)?;
            outbound.extend(stream.get_mut().take_outbound());
        }
        Ok(outbound)
    }

    pub fn on_transport_inactive(&mut self) -> Option<CertEngineOutput> {
        if self.state == EngineState::Established || self.state == EngineState::Closed {
            self.state = EngineState::Closed;
            return None;
        }
        self.state = EngineState::Failed;
        self.inner = Inner::Done;
        warn!("transport closed during certificate handshake");
        Some(CertEngineOutput {
            outbound: Vec::new(),
            plaintext: Vec::new(),
            handshake_complete: Some(Err(TlsPskError::Internal(
                "transport closed during handshake".to_string(),
            ))),
        })
    }
}

fn build_context(
    identity: ClientIdentity,
    ca: CaSource,
    observed_fingerprint: ObservedFingerprint,
) -> Result<SslContext, TlsPskError> {
    let mut builder =
        SslContext::builder(SslMethod::tls_client()).map_err(|e| TlsPskError::Internal(e.to_string()))?;

    builder
        .set_min_proto_version(Some(SslVersion::TLS1_2))
        .map_err(|e| TlsPskError::Internal(e.to_string()))?;
    builder
        .set_max_proto_version(Some(SslVersion::TLS1_2))
        .map_err(|e| TlsPskError::Internal(e.to_string()))?;
    builder
        .set_cipher_list(CIPHER_LIST)
        .map_err(|e| TlsPskError::Internal(e.to_string()))?;

    builder
        .set_certificate(&identity.cert)
        .map_err(|e| TlsPskError::Internal(e.to_string()))?;
    builder
        .set_private_key(&identity.key)
        .map_err(|e| TlsPskError::Internal(e.to_string()))?;
    builder
        .check_private_key()
        .map_err(|e| TlsPskError::Internal(e.to_string()))?;

    // Hostname verification is never configured here (no X509VerifyParam host is set),
    // matching the requirement that device CNs not be checked against the socket's host.
    match ca {
        CaSource::SharedCa(ca_path) => {
            builder
                .set_ca_file(&ca_path)
                .map_err(|e| TlsPskError::Internal(e.to_string()))?;
            builder.set_verify(SslVerifyMode::PEER);
            builder.set_verify_callback(SslVerifyMode::PEER, move |preverify_ok, ctx| {
                if let Some(cert) = ctx.current_cert() {
                    if let Ok(der) = cert.to_der() {
                        *observed_fingerprint.lock().unwrap() = Some(sha256(&der));
                    }
                }
                preverify_ok
            });
        }
        CaSource::PinnedFingerprint(expected) => {
            builder.set_verify(SslVerifyMode::PEER);
            builder.set_verify_callback(SslVerifyMode::PEER, move |_preverify_ok, ctx| {
                let Some(cert) = ctx.current_cert() else {
                    return false;
                };
                let Ok(der) = cert.to_der() else {
                    return false;
                };
                let fingerprint = sha256(&der);
                *observed_fingerprint.lock().unwrap() = Some(fingerprint);
                fingerprint == expected
            });
        }
        CaSource::TrustOnFirstUse => {
            builder.set_verify(SslVerifyMode::PEER);
            builder.set_verify_callback(SslVerifyMode::PEER, move |_preverify_ok, ctx| {
                if let Some(cert) = ctx.current_cert() {
                    if let Ok(der) = cert.to_der() {
                        *observed_fingerprint.lock().unwrap() = Some(sha256(&der));
                    }
                }
                true
            });
        }
    }

    Ok(builder.build())
}
