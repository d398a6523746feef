//! The transport stage: the part of the connection pipeline below the AMS frame codec
//! that turns raw socket bytes into plaintext AMS bytes (and back).
//!
//! For plain ADS there is nothing to do — the stage is transparent. For Secure ADS, a
//! [`PskTlsEngine`] or [`CertTlsEngine`] sits here and the handshake handler (folded
//! into [`crate::connection`] rather than kept as a separate removable pipeline stage,
//! since this implementation drives the pipeline from a single task rather than a
//! generic stage list) sends the `TlsConnectInfo` exchange once the TLS layer reports
//! itself established.

use tcads_tls::psk::EngineState as PskEngineState;
use tcads_tls::{CertEngineOutput, CertTlsEngine, PskEngineOutput, PskTlsEngine, TlsPskError};

/// Output of feeding bytes (or an activation/deactivation event) to a [`TransportStage`].
#[derive(Debug, Default)]
pub struct TransportOutput {
    /// Bytes to write to the raw socket.
    pub outbound: Vec<u8>,
    /// Decrypted (or, for plain ADS, pass-through) bytes available to the AMS frame codec.
    pub plaintext: Vec<u8>,
    /// Present exactly once, the turn the handshake finishes (successfully or not). Never
    /// produced by the plain-ADS stage, which is established from the start.
    pub handshake_complete: Option<Result<(), TlsPskError>>,
}

impl From<PskEngineOutput> for TransportOutput {
    fn from(output: PskEngineOutput) -> Self {
        Self {
            outbound: output.outbound,
            plaintext: output.plaintext,
            handshake_complete: output.handshake_complete,
        }
    }
}

impl From<CertEngineOutput> for TransportOutput {
    fn from(output: CertEngineOutput) -> Self {
        Self {
            outbound: output.outbound,
            plaintext: output.plaintext,
            handshake_complete: output.handshake_complete,
        }
    }
}

pub enum TransportStage {
    Plain,
    Psk(PskTlsEngine),
    Cert(CertTlsEngine),
}

impl TransportStage {
    pub fn is_secure(&self) -> bool {
        !matches!(self, TransportStage::Plain)
    }

    pub fn is_established(&self) -> bool {
        match self {
            TransportStage::Plain => true,
            TransportStage::Psk(engine) => engine.is_established(),
            TransportStage::Cert(engine) => engine.is_established(),
        }
    }

    /// Called once the TCP socket connects.
    pub fn on_transport_active(&mut self) -> Result<TransportOutput, TlsPskError> {
        match self {
            TransportStage::Plain => Ok(TransportOutput {
                handshake_complete: Some(Ok(())),
                ..Default::default()
            }),
            TransportStage::Psk(engine) => Ok(engine.on_transport_active()?.into()),
            TransportStage::Cert(engine) => Ok(engine.on_transport_active()?.into()),
        }
    }

    pub fn on_inbound(&mut self, bytes: &[u8]) -> Result<TransportOutput, TlsPskError> {
        match self {
            TransportStage::Plain => Ok(TransportOutput {
                plaintext: bytes.to_vec(),
                ..Default::default()
            }),
            TransportStage::Psk(engine) => Ok(engine.on_inbound(bytes)?.into()),
            TransportStage::Cert(engine) => Ok(engine.on_inbound(bytes)?.into()),
        }
    }

    pub fn submit_write(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, TlsPskError> {
        match self {
            TransportStage::Plain => Ok(plaintext.to_vec()),
            TransportStage::Psk(engine) => engine.submit_write(plaintext),
            TransportStage::Cert(engine) => engine.submit_write(plaintext),
        }
    }

    pub fn on_transport_inactive(&mut self) -> Option<TransportOutput> {
        match self {
            TransportStage::Plain => None,
            TransportStage::Psk(engine) => engine.on_transport_inactive().map(Into::into),
            TransportStage::Cert(engine) => engine.on_transport_inactive().map(Into::into),
        }
    }
}

/// Distinguishes a successful PSK handshake from a successful certificate handshake only
/// for diagnostics; the handler above treats both identically (per the testable property
/// that it "reacts identically to a TlsHandshakeComplete event and a PskHandshakeComplete
/// event").
pub fn stage_state_label(stage: &TransportStage) -> &'static str {
    match stage {
        TransportStage::Plain => "plain",
        TransportStage::Psk(engine) => match engine.state() {
            PskEngineState::Initial => "psk-initial",
            PskEngineState::Handshaking => "psk-handshaking",
            PskEngineState::Established => "psk-established",
            PskEngineState::Closed => "psk-closed",
            PskEngineState::Failed => "psk-failed",
        },
        TransportStage::Cert(_) => "cert",
    }
}
