//! The public, high-level entry point: [`AdsClient`].
//!
//! Wraps [`crate::connection`]'s actor handle with the request envelope described in
//! §4.5/§4.6 of the handshake/session design: invokeId allocation, header construction,
//! and the two illustrative ADS commands (`ReadDeviceInfo`, `ReadState`).

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tcads_core::ads::{AdsCommand, AdsHeader, StateFlag};
use tcads_core::io::AdsFrame;
use tcads_core::{AdsReturnCode, AmsAddr};
use tracing::{info, instrument};

use crate::commands::{DeviceInfo, ReadStateResult};
use crate::config::AdsClientConfig;
use crate::connection::{self, ConnectionHandle};
use crate::error::{AdsClientError, Result};

/// A connected (or not-yet-connected) session with a single ADS device.
///
/// Every outbound command allocates a monotonically increasing `invokeId` (wrapping on
/// overflow, which is tolerated since the correlation map never holds more entries than
/// are actually in flight) and suspends until the matching response frame arrives, the
/// per-request timeout fires, or the connection becomes inactive. See
/// [`crate::connection`] for the actor that actually owns the socket.
pub struct AdsClient {
    config: AdsClientConfig,
    handle: Option<ConnectionHandle>,
    next_invoke_id: AtomicU32,
}

impl AdsClient {
    /// Builds a client around `config` without connecting yet. Call [`Self::connect`]
    /// before issuing any command.
    pub fn new(config: AdsClientConfig) -> Self {
        Self {
            config,
            handle: None,
            next_invoke_id: AtomicU32::new(1),
        }
    }

    /// Resolves the host, opens the socket, assembles the pipeline implied by
    /// `config.secure`, and (for Secure ADS) awaits the `TlsConnectInfo` exchange —
    /// all bounded by `config.connect_timeout`. Calling this again after a prior
    /// [`Self::disconnect`] is allowed and fully re-establishes the session.
    #[instrument(skip(self), fields(host = %self.config.host, port = self.config.port))]
    pub async fn connect(&mut self) -> Result<()> {
        let handle = connection::connect(self.config.clone()).await?;
        info!("ads client connected");
        self.handle = Some(handle);
        Ok(())
    }

    /// Whether [`Self::connect`] has completed successfully and [`Self::disconnect`]
    /// has not since been called.
    pub fn is_connected(&self) -> bool {
        self.handle.is_some()
    }

    /// Closes the connection and fails every request still awaiting a response with a
    /// uniform cause. A subsequent [`Self::connect`] call is permitted.
    pub fn disconnect(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.disconnect();
        }
    }

    /// Issues `AdsReadDeviceInfo` (command id `0x0001`) and decodes its response.
    #[instrument(skip(self))]
    pub async fn read_device_info(&self) -> Result<DeviceInfo> {
        let frame = self.request(AdsCommand::ReadDeviceInfo, Vec::new()).await?;
        self.check_header_error(&frame)?;
        DeviceInfo::decode(frame.payload())
    }

    /// Issues `AdsReadState` (command id `0x0004`) and decodes its response.
    #[instrument(skip(self))]
    pub async fn read_state(&self) -> Result<ReadStateResult> {
        let frame = self.request(AdsCommand::ReadState, Vec::new()).await?;
        self.check_header_error(&frame)?;
        ReadStateResult::decode(frame.payload())
    }

    /// A non-zero `AdsHeader::error_code` reports a routing-level failure and is
    /// surfaced before any payload is even looked at, per §4.6.
    fn check_header_error(&self, frame: &AdsFrame) -> Result<()> {
        let code = frame.header().error_code();
        if !code.is_success() {
            return Err(AdsClientError::Application(code));
        }
        Ok(())
    }

    async fn request(&self, command: AdsCommand, data: Vec<u8>) -> Result<AdsFrame> {
        let Some(handle) = &self.handle else {
            return Err(AdsClientError::NotConnected);
        };

        let invoke_id = self.next_invoke_id.fetch_add(1, Ordering::Relaxed);
        let header = AdsHeader::new(
            self.config.target,
            self.config.source,
            command,
            StateFlag::tcp_ads_request(),
            data.len() as u32,
            AdsReturnCode::Ok,
            invoke_id,
        );
        let frame = AdsFrame::new(header, data);
        handle.request(frame, invoke_id, self.config.request_timeout).await
    }

    /// The configured target device address.
    pub fn target(&self) -> AmsAddr {
        self.config.target
    }

    /// The configured source (this client's) address.
    pub fn source(&self) -> AmsAddr {
        self.config.source
    }

    /// The configured per-request timeout, used when no override is given.
    pub fn request_timeout(&self) -> Duration {
        self.config.request_timeout
    }
}

impl Drop for AdsClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AdsClientConfigBuilder;
    use tcads_core::{AmsNetId, AmsPort};

    fn config() -> AdsClientConfig {
        AdsClientConfigBuilder::new()
            .host("127.0.0.1")
            .port(48898)
            .source(AmsAddr::new(AmsNetId::new(10, 0, 0, 1, 1, 1), 32818 as AmsPort))
            .target(AmsAddr::new(AmsNetId::new(10, 0, 0, 2, 1, 1), 851))
            .build()
            .unwrap()
    }

    #[test]
    fn new_client_is_not_connected() {
        let client = AdsClient::new(config());
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn commands_fail_fast_when_not_connected() {
        let client = AdsClient::new(config());
        let err = client.read_device_info().await.unwrap_err();
        assert!(matches!(err, AdsClientError::NotConnected));
    }

    #[test]
    fn invoke_ids_increase_monotonically() {
        let client = AdsClient::new(config());
        let a = client.next_invoke_id.fetch_add(1, Ordering::Relaxed);
        let b = client.next_invoke_id.fetch_add(1, Ordering::Relaxed);
        assert_eq!(b, a + 1);
    }
}
