//! The per-connection actor: owns the socket, the transport stage, the AMS frame codec,
//! and the invokeId correlation map. Runs entirely on the shared I/O worker (see
//! [`crate::runtime`]); callers interact with it only through [`ConnectionHandle`].

use crate::config::{AdsClientConfig, SecureAdsConfig};
use crate::error::{AdsClientError, ProtocolError};
use crate::pipeline::TransportStage;
use bytes::BytesMut;
use std::collections::HashMap;
use std::time::Duration;
use tcads_core::io::{AdsFrame, AdsFrameCodec, FrameMode};
use tcads_tls::cert::keystore::ClientIdentity;
use tcads_tls::{BASE_SIZE, ConnectInfoFlags, Credentials, MAX_SIZE, TlsConnectInfo};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::{Decoder, Encoder};
use tokio_util::time::DelayQueue;
use tokio_util::time::delay_queue;
use tracing::{debug, info, warn};

const READ_BUF_SIZE: usize = 16 * 1024;

pub(crate) enum WorkerCommand {
    Request {
        frame: AdsFrame,
        invoke_id: u32,
        timeout: Duration,
        respond_to: oneshot::Sender<Result<AdsFrame, AdsClientError>>,
    },
    Disconnect,
}

/// The caller-facing half of a live connection actor.
pub(crate) struct ConnectionHandle {
    cmd_tx: mpsc::UnboundedSender<WorkerCommand>,
}

impl ConnectionHandle {
    pub(crate) async fn request(
        &self,
        frame: AdsFrame,
        invoke_id: u32,
        timeout: Duration,
    ) -> Result<AdsFrame, AdsClientError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(WorkerCommand::Request { frame, invoke_id, timeout, respond_to: tx })
            .map_err(|_| AdsClientError::ChannelInactive)?;
        rx.await.map_err(|_| AdsClientError::ChannelInactive)?
    }

    pub(crate) fn disconnect(&self) {
        let _ = self.cmd_tx.send(WorkerCommand::Disconnect);
    }
}

struct PendingRequest {
    respond_to: oneshot::Sender<Result<AdsFrame, AdsClientError>>,
    timer_key: delay_queue::Key,
    timeout: Duration,
}

/// Opens the TCP socket, assembles the pipeline described by `config.secure`, runs the
/// handshake (if any), and spawns the connection actor on the shared worker. Resolves
/// once the session is ready to carry ADS traffic (or the connect attempt has failed).
pub(crate) async fn connect(config: AdsClientConfig) -> Result<ConnectionHandle, AdsClientError> {
    let socket = TcpStream::connect((config.host.as_str(), config.port)).await?;
    socket.set_nodelay(true).ok();

    let frame_mode = if config.secure.is_some() { FrameMode::Raw } else { FrameMode::Tcp };
    let transport = build_transport_stage(&config.secure)?;
    let connect_info_request = build_connect_info_request(&config)?;

    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (ready_tx, ready_rx) = oneshot::channel();

    let timeout = config.connect_timeout;
    let conn_future = run(socket, transport, frame_mode, connect_info_request, ready_tx, cmd_rx);
    crate::runtime::spawn(conn_future);

    match tokio::time::timeout(timeout, ready_rx).await {
        Ok(Ok(Ok(()))) => Ok(ConnectionHandle { cmd_tx }),
        Ok(Ok(Err(e))) => Err(e),
        Ok(Err(_)) => Err(AdsClientError::ChannelInactive),
        Err(_) => {
            let _ = cmd_tx.send(WorkerCommand::Disconnect);
            Err(AdsClientError::ConnectTimeout(timeout))
        }
    }
}

fn build_transport_stage(secure: &Option<SecureAdsConfig>) -> Result<TransportStage, AdsClientError> {
    use tcads_tls::cert::CaSource;
    use tcads_tls::{CertTlsEngine, PskTlsEngine};

    match secure {
        None => Ok(TransportStage::Plain),
        Some(SecureAdsConfig::Psk(psk)) => {
            let engine = PskTlsEngine::new(psk.identity.clone().into_bytes(), psk.key.clone())?;
            Ok(TransportStage::Psk(engine))
        }
        Some(SecureAdsConfig::SelfSigned(cfg)) => {
            let identity = ClientIdentity::from_pem_files(&cfg.cert_path, &cfg.key_path)
                .map_err(|e| AdsClientError::Tls(tcads_tls::TlsPskError::Internal(e.to_string())))?;
            let ca = match &cfg.trust {
                crate::config::SelfSignedTrust::Pinned(fingerprint) => CaSource::PinnedFingerprint(*fingerprint),
                crate::config::SelfSignedTrust::TrustOnFirstUse => CaSource::TrustOnFirstUse,
            };
            let engine = CertTlsEngine::new(identity, ca)?;
            Ok(TransportStage::Cert(engine))
        }
        Some(SecureAdsConfig::SharedCa(cfg)) => {
            let identity = ClientIdentity::from_pem_files(&cfg.cert_path, &cfg.key_path)
                .map_err(|e| AdsClientError::Tls(tcads_tls::TlsPskError::Internal(e.to_string())))?;
            let engine = CertTlsEngine::new(identity, CaSource::SharedCa(cfg.ca_cert_path.clone()))?;
            Ok(TransportStage::Cert(engine))
        }
    }
}

fn build_connect_info_request(config: &AdsClientConfig) -> Result<Option<Vec<u8>>, AdsClientError> {
    let Some(secure) = &config.secure else { return Ok(None) };

    let (flags, credentials) = match secure {
        SecureAdsConfig::Psk(_) => (ConnectInfoFlags::empty(), None),
        SecureAdsConfig::SharedCa(_) => (ConnectInfoFlags::empty(), None),
        SecureAdsConfig::SelfSigned(cfg) => match &cfg.route_registration {
            None => (ConnectInfoFlags::empty().with(ConnectInfoFlags::SELF_SIGNED), None),
            Some(reg) => {
                let mut flags = ConnectInfoFlags::empty()
                    .with(ConnectInfoFlags::ADD_REMOTE)
                    .with(ConnectInfoFlags::SELF_SIGNED);
                if reg.ip_addr {
                    flags = flags.with(ConnectInfoFlags::IP_ADDR);
                }
                if reg.ignore_cn {
                    flags = flags.with(ConnectInfoFlags::IGNORE_CN);
                }
                let creds = Credentials::new(reg.username.clone(), reg.password.clone())
                    .map_err(|e| AdsClientError::Protocol(e.into()))?;
                (flags, Some(creds))
            }
        },
    };

    let hostname = secure
        .hostname()
        .map(str::to_owned)
        .unwrap_or_else(crate::config::system_hostname);
    let info = TlsConnectInfo::request(flags, config.source.net_id(), hostname, credentials)
        .map_err(|e| AdsClientError::Protocol(e.into()))?;
    let bytes = info.encode().map_err(|e| AdsClientError::Protocol(e.into()))?;
    Ok(Some(bytes))
}

#[allow(clippy::too_many_arguments)]
async fn run(
    socket: TcpStream,
    mut transport: TransportStage,
    frame_mode: FrameMode,
    connect_info_request: Option<Vec<u8>>,
    mut ready_tx: Option<oneshot::Sender<Result<(), AdsClientError>>>,
    mut cmd_rx: mpsc::UnboundedReceiver<WorkerCommand>,
) {
    let (mut read_half, mut write_half) = socket.into_split();
    let mut codec = AdsFrameCodec::new(frame_mode);
    let mut decode_buf = BytesMut::new();
    let mut pending: HashMap<u32, PendingRequest> = HashMap::new();
    let mut timers: DelayQueue<u32> = DelayQueue::new();
    // Secure modes exchange a TlsConnectInfo after the TLS layer reports itself
    // established; plain ADS has no such step and is ready as soon as the socket is up.
    let mut awaiting_connect_info = connect_info_request.is_some();
    let mut ams_ready = false;

    macro_rules! fail_connect {
        ($err:expr) => {{
            if let Some(tx) = ready_tx.take() {
                let _ = tx.send(Err($err));
            }
            fail_all_pending(&mut pending, AdsClientError::ChannelInactive);
            return;
        }};
    }

    match transport.on_transport_active() {
        Ok(output) => {
            if !output.outbound.is_empty() && write_half.write_all(&output.outbound).await.is_err() {
                fail_connect!(AdsClientError::ChannelInactive);
            }
            if !transport.is_secure() {
                ams_ready = true;
                if let Some(tx) = ready_tx.take() {
                    let _ = tx.send(Ok(()));
                }
            }
        }
        Err(e) => fail_connect!(e.into()),
    }

    let mut read_buf = vec![0u8; READ_BUF_SIZE];

    loop {
        tokio::select! {
            result = read_half.read(&mut read_buf) => {
                match result {
                    Ok(0) => {
                        info!("peer closed the connection");
                        if let Some(output) = transport.on_transport_inactive() {
                            if let Some(Err(cause)) = output.handshake_complete {
                                fail_connect!(cause.into());
                            }
                        }
                        fail_connect!(AdsClientError::ChannelInactive);
                    }
                    Ok(n) => {
                        let output = match transport.on_inbound(&read_buf[..n]) {
                            Ok(output) => output,
                            Err(e) => fail_connect!(e.into()),
                        };
                        if !output.outbound.is_empty() && write_half.write_all(&output.outbound).await.is_err() {
                            fail_connect!(AdsClientError::ChannelInactive);
                        }
                        if let Some(handshake_result) = output.handshake_complete {
                            match handshake_result {
                                Ok(()) => {
                                    debug!(transport = crate::pipeline::stage_state_label(&transport), "transport handshake complete");
                                    if let Some(request) = &connect_info_request {
                                        match transport.submit_write(request) {
                                            Ok(ciphertext) => {
                                                if !ciphertext.is_empty() && write_half.write_all(&ciphertext).await.is_err() {
                                                    fail_connect!(AdsClientError::ChannelInactive);
                                                }
                                            }
                                            Err(e) => fail_connect!(e.into()),
                                        }
                                    }
                                }
                                Err(cause) => fail_connect!(cause.into()),
                            }
                        }
                        if !output.plaintext.is_empty() {
                            decode_buf.extend_from_slice(&output.plaintext);
                        }

                        if awaiting_connect_info {
                            match try_decode_connect_info(&mut decode_buf) {
                                Ok(Some(response)) => {
                                    awaiting_connect_info = false;
                                    if response.error().is_error() {
                                        fail_connect!(AdsClientError::Handshake(response.error()));
                                    }
                                    ams_ready = true;
                                    if let Some(tx) = ready_tx.take() {
                                        let _ = tx.send(Ok(()));
                                    }
                                }
                                Ok(None) => {}
                                Err(e) => fail_connect!(AdsClientError::Protocol(e.into())),
                            }
                        }

                        if ams_ready {
                            loop {
                                match codec.decode(&mut decode_buf) {
                                    Ok(Some(frame)) => dispatch(frame, &mut pending, &mut timers),
                                    Ok(None) => break,
                                    Err(e) => fail_connect!(AdsClientError::Protocol(ProtocolError::Frame(e))),
                                }
                            }
                        }
                    }
                    Err(e) => fail_connect!(e.into()),
                }
            }
            Some(cmd) = cmd_rx.recv() => {
                match cmd {
                    WorkerCommand::Request { frame, invoke_id, timeout, respond_to } => {
                        let mut buf = BytesMut::new();
                        if let Err(e) = codec.encode(frame, &mut buf) {
                            let _ = respond_to.send(Err(AdsClientError::Protocol(ProtocolError::Frame(e))));
                            continue;
                        }
                        let ciphertext = match transport.submit_write(&buf) {
                            Ok(bytes) => bytes,
                            Err(e) => {
                                let _ = respond_to.send(Err(e.into()));
                                continue;
                            }
                        };
                        if !ciphertext.is_empty() && write_half.write_all(&ciphertext).await.is_err() {
                            let _ = respond_to.send(Err(AdsClientError::ChannelInactive));
                            continue;
                        }
                        let timer_key = timers.insert(invoke_id, timeout);
                        pending.insert(invoke_id, PendingRequest { respond_to, timer_key, timeout });
                    }
                    WorkerCommand::Disconnect => {
                        fail_all_pending(&mut pending, AdsClientError::Disconnecting);
                        return;
                    }
                }
            }
            Some(expired) = std::future::poll_fn(|cx| timers.poll_expired(cx)) => {
                let invoke_id = expired.into_inner();
                if let Some(entry) = pending.remove(&invoke_id) {
                    warn!(invoke_id, "request timed out waiting for a response");
                    let _ = entry.respond_to.send(Err(AdsClientError::RequestTimeout(entry.timeout)));
                }
            }
        }
    }
}

fn dispatch(frame: AdsFrame, pending: &mut HashMap<u32, PendingRequest>, timers: &mut DelayQueue<u32>) {
    let invoke_id = frame.header().invoke_id();
    // Command id 0x0008 (device notification) frames are consumed and released: no
    // subscription API correlates them to anything, so falling through to the
    // unknown-invokeId branch below already does the right thing.
    match pending.remove(&invoke_id) {
        Some(entry) => {
            timers.try_remove(&entry.timer_key);
            let _ = entry.respond_to.send(Ok(frame));
        }
        None => {
            debug!(invoke_id, command = ?frame.header().command_id(), "dropped frame with no matching pending request");
        }
    }
}

fn fail_all_pending(pending: &mut HashMap<u32, PendingRequest>, cause: AdsClientError) {
    for (_, entry) in pending.drain() {
        let _ = entry.respond_to.send(Err(clone_terminal_error(&cause)));
    }
}

/// [`AdsClientError`] does not derive `Clone` (several `#[source]` chains do not), so a
/// uniform terminal cause is re-described per pending entry instead of cloned.
fn clone_terminal_error(cause: &AdsClientError) -> AdsClientError {
    match cause {
        AdsClientError::Disconnecting => AdsClientError::Disconnecting,
        _ => AdsClientError::ChannelInactive,
    }
}

fn try_decode_connect_info(buf: &mut BytesMut) -> Result<Option<TlsConnectInfo>, tcads_tls::ConnectInfoCodecError> {
    use tcads_tls::ConnectInfoCodecError;

    if buf.len() < 2 {
        return Ok(None);
    }
    let length = u16::from_le_bytes([buf[0], buf[1]]) as usize;
    if !(BASE_SIZE..=MAX_SIZE).contains(&length) {
        return Err(ConnectInfoCodecError::LengthOutOfRange { length, min: BASE_SIZE, max: MAX_SIZE });
    }
    if buf.len() < length {
        return Ok(None);
    }
    let bytes = buf.split_to(length);
    TlsConnectInfo::decode(&bytes).map(Some)
}
