//! Payload encoding/decoding for the two ADS commands this client issues directly.
//!
//! Every ADS response payload leads with its own 4-byte little-endian result code —
//! distinct from the AMS header's `error_code`, which only reports routing-level
//! failures. A non-zero header `error_code` is surfaced before a payload is even looked
//! at; a non-zero payload result code is surfaced here, at decode time.

use crate::error::{AdsClientError, ProtocolError};
use tcads_core::{AdsDeviceVersion, AdsReturnCode, AdsState};

/// Response payload of `AdsReadDeviceInfo` (command id `0x0001`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub version: AdsDeviceVersion,
    pub device_name: String,
}

impl DeviceInfo {
    /// `u32 LE result, u8 major, u8 minor, u16 LE build, 16-byte device name`.
    pub(crate) const LEN: usize = 24;

    pub(crate) fn decode(payload: &[u8]) -> Result<Self, AdsClientError> {
        if payload.len() < Self::LEN {
            return Err(ProtocolError::PayloadTooShort {
                expected: Self::LEN,
                got: payload.len(),
            }
            .into());
        }

        let result = AdsReturnCode::from_bytes(payload[0..4].try_into().unwrap());
        if !result.is_success() {
            return Err(AdsClientError::Application(result));
        }

        let version = AdsDeviceVersion::from_bytes(payload[4..8].try_into().unwrap());
        let name_bytes = &payload[8..24];
        let nul = name_bytes.iter().position(|&b| b == 0).unwrap_or(name_bytes.len());
        let device_name = String::from_utf8_lossy(&name_bytes[..nul]).into_owned();
        Ok(Self { version, device_name })
    }
}

/// Response payload of `AdsReadState` (command id `0x0004`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadStateResult {
    pub ads_state: AdsState,
    pub device_state: u16,
}

impl ReadStateResult {
    /// `u32 LE result, u16 LE adsState, u16 LE deviceState`.
    pub(crate) const LEN: usize = 8;

    pub(crate) fn decode(payload: &[u8]) -> Result<Self, AdsClientError> {
        if payload.len() < Self::LEN {
            return Err(ProtocolError::PayloadTooShort {
                expected: Self::LEN,
                got: payload.len(),
            }
            .into());
        }

        let result = AdsReturnCode::from_bytes(payload[0..4].try_into().unwrap());
        if !result.is_success() {
            return Err(AdsClientError::Application(result));
        }

        let ads_state = AdsState::from_bytes(payload[4..6].try_into().unwrap());
        let device_state = u16::from_le_bytes(payload[6..8].try_into().unwrap());
        Ok(Self { ads_state, device_state })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_result() -> [u8; 4] {
        AdsReturnCode::Ok.to_bytes()
    }

    #[test]
    fn decodes_device_info_trimming_null_padded_name() {
        let mut payload = ok_result().to_vec();
        payload.extend_from_slice(&[3u8, 1, 0x20, 0x00]);
        payload.extend_from_slice(b"Runtime\0\0\0\0\0\0\0\0\0");
        let info = DeviceInfo::decode(&payload).unwrap();
        assert_eq!(info.version, AdsDeviceVersion::new(3, 1, 0x20));
        assert_eq!(info.device_name, "Runtime");
    }

    #[test]
    fn decode_device_info_rejects_short_payload() {
        let err = DeviceInfo::decode(&[0u8; 10]).unwrap_err();
        assert!(matches!(err, AdsClientError::Protocol(ProtocolError::PayloadTooShort { .. })));
    }

    #[test]
    fn decode_device_info_surfaces_nonzero_result_as_application_error() {
        let mut payload = AdsReturnCode::ErrNoIo.to_bytes().to_vec();
        payload.extend_from_slice(&[0u8; 20]);
        let err = DeviceInfo::decode(&payload).unwrap_err();
        assert!(matches!(err, AdsClientError::Application(AdsReturnCode::ErrNoIo)));
    }

    #[test]
    fn decodes_read_state() {
        let mut payload = ok_result().to_vec();
        payload.extend_from_slice(&[0x05, 0x00, 0x00, 0x00]);
        let state = ReadStateResult::decode(&payload).unwrap();
        assert_eq!(state.ads_state, AdsState::Run);
        assert_eq!(state.device_state, 0);
    }
}
