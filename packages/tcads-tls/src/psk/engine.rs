//! A non-blocking TLS 1.2 PSK-only client engine.
//!
//! TwinCAT's embedded TLS stack rejects any `ClientHello` carrying extensions it does not
//! recognise and only accepts pure-PSK cipher suites, so this engine pins the cipher list,
//! disables session tickets, and restricts the negotiated protocol version to exactly
//! TLS 1.2. It is driven entirely by the caller: bytes in, bytes (and decrypted
//! application data) out. No socket or async runtime is touched here — see
//! `tcads-client` for the piece that owns the actual connection.

use crate::error::TlsPskError;
use crate::psk::key::PskKey;
use crate::psk::stream::MemoryStream;
use openssl::ssl::{
    HandshakeError, MidHandshakeSslStream, Ssl, SslContext, SslMethod, SslOptions, SslStream,
    SslVersion,
};
use std::collections::VecDeque;
use std::io::{Read, Write};
use tracing::{debug, warn};

/// Cipher suites offered, most preferred first. No ephemeral-DH, ECDHE, GCM, CCM,
/// ChaCha20, ARIA or Camellia variant is ever included.
const CIPHER_LIST: &str = "PSK-AES256-CBC-SHA384:PSK-AES128-CBC-SHA256:PSK-AES256-CBC-SHA:PSK-AES128-CBC-SHA";

/// Upper bound on plaintext buffered before the handshake completes.
pub const MAX_PENDING_WRITE_BYTES: usize = 256 * 1024;

/// Maximum identity length OpenSSL's PSK client callback buffer accommodates.
const MAX_IDENTITY_LEN: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Initial,
    Handshaking,
    Established,
    Closed,
    Failed,
}

/// Output of driving the engine one step: bytes to put on the wire, plaintext decrypted
/// from the peer (only non-empty once [`EngineState::Established`]), and an optional
/// handshake-completion event.
#[derive(Debug, Default)]
pub struct PskEngineOutput {
    pub outbound: Vec<u8>,
    pub plaintext: Vec<u8>,
    pub handshake_complete: Option<Result<(), TlsPskError>>,
}

impl PskEngineOutput {
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

pub struct PskTlsEngine {
    state: EngineState,
    inner: Inner,
    /// The unstarted `Ssl` session, consumed by the first call to `on_transport_active`.
    pending_ssl: Option<Ssl>,
    pending_writes: VecDeque<Vec<u8>>,
    pending_len: usize,
}

impl PskTlsEngine {
    /// Builds the engine for the given PSK identity/key pair. `identity` is sent on the
    /// wire exactly as given (no case normalization — that only applies to the default
    /// key-derivation convention in [`crate::psk::key::PskKey::derive`]).
    pub fn new(identity: Vec<u8>, psk: PskKey) -> Result<Self, TlsPskError> {
        if identity.is_empty() {
            return Err(TlsPskError::Internal("PSK identity must not be empty".into()));
        }
        if identity.len() >= MAX_IDENTITY_LEN {
            return Err(TlsPskError::Internal(format!(
                "PSK identity must be under {MAX_IDENTITY_LEN} bytes"
            )));
        }

        let ctx = build_context(identity, psk)?;
        let ssl = Ssl::new(&ctx).map_err(|e| TlsPskError::Internal(e.to_string()))?;

        Ok(Self {
            state: EngineState::Initial,
            inner: Inner::Done,
            pending_ssl: Some(ssl),
            pending_writes: VecDeque::new(),
            pending_len: 0,
        })
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_established(&self) -> bool {
        matches!(self.state, EngineState::Established)
    }

    /// Called once the underlying transport becomes active (e.g. TCP connect completes).
    /// Generates and returns the initial `ClientHello`.
    pub fn on_transport_active(&mut self) -> Result<PskEngineOutput, TlsPskError> {
        let ssl = self
            .pending_ssl
            .take()
            .ok_or_else(|| TlsPskError::Internal("engine already started".into()))?;
        self.state = EngineState::Handshaking;
        self.drive_handshake(ssl.connect(MemoryStream::new()))
    }

    /// Feeds ciphertext bytes received from the transport. While handshaking this may
    /// complete the handshake (surfaced via `handshake_complete`); once established it
    /// yields decrypted application data.
    pub fn on_inbound(&mut self, bytes: &[u8]) -> Result<PskEngineOutput, TlsPskError> {
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
                Ok(PskEngineOutput {
                    outbound,
                    plaintext,
                    handshake_complete: None,
                })
            }
            Inner::Done => {
                self.inner = Inner::Done;
                Ok(PskEngineOutput::default())
            }
        }
    }

    /// Submits plaintext for encryption and transmission. Before the handshake completes
    /// the bytes are buffered (FIFO) up to [`MAX_PENDING_WRITE_BYTES`]; a single write
    /// that would exceed the cap fails without disturbing already-buffered writes.
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
    ) -> Result<PskEngineOutput, TlsPskError> {
        match result {
            Ok(mut stream) => {
                let outbound = stream.get_mut().take_outbound();
                self.state = EngineState::Established;
                let drain_err = self.drain_pending(&mut stream);
                let mut outbound = outbound;
                match drain_err {
                    Ok(more) => outbound.extend(more),
                    Err(e) => {
                        self.inner = Inner::Established(stream);
                        return Err(e);
                    }
                }
                self.inner = Inner::Established(stream);
                debug!("psk handshake established");
                Ok(PskEngineOutput {
                    outbound,
                    plaintext: Vec::new(),
                    handshake_complete: Some(Ok(())),
                })
            }
            Err(HandshakeError::WouldBlock(mut mid)) => {
                let outbound = mid.get_mut().take_outbound();
                self.inner = Inner::Handshaking(mid);
                Ok(PskEngineOutput::outbound_only(outbound))
            }
            Err(HandshakeError::Failure(mut mid)) => {
                let detail = mid.error().to_string();
                mid.get_mut().take_outbound();
                self.state = EngineState::Failed;
                self.inner = Inner::Done;
                let classified = TlsPskError::classify(&detail);
                warn!(error = %classified, "psk handshake failed");
                Ok(PskEngineOutput {
                    outbound: Vec::new(),
                    plaintext: Vec::new(),
                    handshake_complete: Some(Err(classified)),
                })
            }
            Err(HandshakeError::SetupFailure(e)) => {
                self.state = EngineState::Failed;
                self.inner = Inner::Done;
                warn!(error = %e, "psk handshake setup failed");
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

    /// The transport closed before the handshake reached `Established`.
    pub fn on_transport_inactive(&mut self) -> Option<PskEngineOutput> {
        if self.state == EngineState::Established || self.state == EngineState::Closed {
            self.state = EngineState::Closed;
            return None;
        }
        self.state = EngineState::Failed;
        self.inner = Inner::Done;
        warn!("transport closed during psk handshake");
        Some(PskEngineOutput {
            outbound: Vec::new(),
            plaintext: Vec::new(),
            handshake_complete: Some(Err(TlsPskError::Internal(
                "transport closed during handshake".to_string(),
            ))),
        })
    }
}

fn build_context(identity: Vec<u8>, psk: PskKey) -> Result<SslContext, TlsPskError> {
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
    // Session tickets are an extension TwinCAT's peer does not expect; everything else
    // that would add extensions (SNI, ALPN, compression) is simply never configured.
    builder.set_options(SslOptions::NO_TICKET);

    let psk_bytes = *psk.as_bytes();
    builder.set_psk_client_callback(move |_ssl, _hint, identity_out, psk_out| {
        identity_out[..identity.len()].copy_from_slice(&identity);
        identity_out[identity.len()] = 0;
        psk_out[..psk_bytes.len()].copy_from_slice(&psk_bytes);
        Ok(psk_bytes.len())
    });

    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_engine() -> PskTlsEngine {
        let key = PskKey::derive("test-client", "secret");
        PskTlsEngine::new(b"test-client".to_vec(), key).unwrap()
    }

    #[test]
    fn new_rejects_empty_identity() {
        let key = PskKey::derive("x", "y");
        let err = PskTlsEngine::new(Vec::new(), key).unwrap_err();
        assert!(matches!(err, TlsPskError::Internal(_)));
    }

    #[test]
    fn new_rejects_oversized_identity() {
        let key = PskKey::derive("x", "y");
        let err = PskTlsEngine::new(vec![b'a'; MAX_IDENTITY_LEN], key).unwrap_err();
        assert!(matches!(err, TlsPskError::Internal(_)));
    }

    #[test]
    fn initial_state_is_initial() {
        let engine = new_engine();
        assert_eq!(engine.state(), EngineState::Initial);
        assert!(!engine.is_established());
    }

    #[test]
    fn transport_active_emits_client_hello_and_enters_handshaking() {
        let mut engine = new_engine();
        let output = engine.on_transport_active().unwrap();
        assert_eq!(engine.state(), EngineState::Handshaking);
        assert!(!output.outbound.is_empty(), "a ClientHello must be produced");
        assert!(output.handshake_complete.is_none());
    }

    #[test]
    fn writes_before_established_are_buffered_not_sent() {
        let mut engine = new_engine();
        engine.on_transport_active().unwrap();
        let outbound = engine.submit_write(b"hello").unwrap();
        assert!(outbound.is_empty(), "plaintext must not leak before the handshake completes");
        assert_eq!(engine.pending_len, 5);
    }

    #[test]
    fn oversized_single_write_while_handshaking_is_rejected() {
        let mut engine = new_engine();
        engine.on_transport_active().unwrap();
        let err = engine
            .submit_write(&vec![0u8; MAX_PENDING_WRITE_BYTES + 1])
            .unwrap_err();
        assert!(matches!(err, TlsPskError::Internal(_)));
        assert_eq!(engine.pending_len, 0, "the rejected write must not be counted");
    }

    #[test]
    fn pending_writes_accumulate_up_to_the_cap_without_disturbing_each_other() {
        let mut engine = new_engine();
        engine.on_transport_active().unwrap();
        engine.submit_write(&vec![0u8; MAX_PENDING_WRITE_BYTES - 10]).unwrap();
        // A further write that would tip the total over the cap is rejected...
        let err = engine.submit_write(&vec![0u8; 11]).unwrap_err();
        assert!(matches!(err, TlsPskError::Internal(_)));
        // ...but does not evict what was already queued.
        assert_eq!(engine.pending_len, MAX_PENDING_WRITE_BYTES - 10);
        // A write that fits in the remaining headroom still succeeds.
        engine.submit_write(&vec![0u8; 10]).unwrap();
        assert_eq!(engine.pending_len, MAX_PENDING_WRITE_BYTES);
    }

    #[test]
    fn garbage_inbound_during_handshake_fails_without_a_compatible_peer() {
        let mut engine = new_engine();
        engine.on_transport_active().unwrap();
        let output = engine.on_inbound(&[0xffu8; 64]).unwrap();
        assert_eq!(engine.state(), EngineState::Failed);
        match output.handshake_complete {
            Some(Err(_)) => {}
            other => panic!("expected a handshake failure, got {other:?}"),
        }
    }

    #[test]
    fn transport_inactive_during_handshake_surfaces_failure() {
        let mut engine = new_engine();
        engine.on_transport_active().unwrap();
        let output = engine.on_transport_inactive().unwrap();
        assert_eq!(engine.state(), EngineState::Failed);
        assert!(matches!(output.handshake_complete, Some(Err(_))));
    }

    #[test]
    fn transport_inactive_before_handshake_starts_is_also_a_failure() {
        let mut engine = new_engine();
        let output = engine.on_transport_inactive().unwrap();
        assert_eq!(engine.state(), EngineState::Failed);
        assert!(output.handshake_complete.is_some());
    }
}
