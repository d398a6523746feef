//! The ADS-level frame: a 32-byte [`AdsHeader`] plus payload, carried either behind a
//! 6-byte AMS/TCP length preamble (plain ADS, port 48898) or raw (Secure ADS, inside a
//! TLS tunnel on port 8016).

use crate::ads::{ADS_HEADER_LEN, AdsHeader};
use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Length of the AMS/TCP preamble used in [`FrameMode::Tcp`] (2 reserved bytes + u32 LE length).
pub const AMS_TCP_PREAMBLE_LEN: usize = 6;

/// Upper bound on a single ADS frame (header + payload), recommended by the protocol to
/// guard against a corrupt or hostile length field driving an unbounded allocation.
pub const MAX_FRAME_LENGTH: usize = 4 * 1024 * 1024;

/// Selects which wire framing an [`AdsFrame`] is encoded/decoded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameMode {
    /// `[2 reserved][u32 LE total length][AdsHeader][payload]` — plain ADS over TCP.
    Tcp,
    /// `[AdsHeader][payload]`, length read from the header itself — Secure ADS over TLS.
    Raw,
}

/// Errors raised while framing or deframing an [`AdsFrame`].
#[derive(Debug, thiserror::Error)]
pub enum FrameCodecError {
    /// The declared (or would-be encoded) frame length falls outside `[ADS_HEADER_LEN, MAX_FRAME_LENGTH]`.
    #[error("frame too long: {length} bytes (max {max})")]
    FrameTooLong { length: usize, max: usize },
    /// Underlying transport I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single ADS message: a 32-byte [`AdsHeader`] and its owned payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdsFrame {
    header: AdsHeader,
    payload: Vec<u8>,
}

impl AdsFrame {
    /// Builds a frame from a header and payload. The header's `length` field is not
    /// consulted; callers that need header/payload length agreement should set the
    /// header's `length` to `payload.len()` before constructing.
    pub fn new(header: AdsHeader, payload: Vec<u8>) -> Self {
        Self { header, payload }
    }

    pub fn header(&self) -> &AdsHeader {
        &self.header
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_parts(self) -> (AdsHeader, Vec<u8>) {
        (self.header, self.payload)
    }

    /// Total on-wire size of this frame in the given mode (preamble, if any, + header + payload).
    pub fn encoded_len(&self, mode: FrameMode) -> usize {
        let body = ADS_HEADER_LEN + self.payload.len();
        match mode {
            FrameMode::Tcp => AMS_TCP_PREAMBLE_LEN + body,
            FrameMode::Raw => body,
        }
    }

    /// Serializes the frame to a byte vector in the given mode.
    ///
    /// Returns [`FrameCodecError::FrameTooLong`] if the encoded frame (header + payload)
    /// would exceed [`MAX_FRAME_LENGTH`].
    pub fn encode(&self, mode: FrameMode) -> Result<Vec<u8>, FrameCodecError> {
        let body_len = ADS_HEADER_LEN + self.payload.len();
        if body_len > MAX_FRAME_LENGTH {
            return Err(FrameCodecError::FrameTooLong {
                length: body_len,
                max: MAX_FRAME_LENGTH,
            });
        }

        let mut buf = Vec::with_capacity(self.encoded_len(mode));
        if mode == FrameMode::Tcp {
            buf.extend_from_slice(&[0u8, 0u8]);
            buf.extend_from_slice(&(body_len as u32).to_le_bytes());
        }
        buf.extend_from_slice(&self.header.to_bytes());
        buf.extend_from_slice(&self.payload);
        Ok(buf)
    }
}

/// Offset, within the 32-byte [`AdsHeader`], of the little-endian `u32` data-length field
/// (after the two 8-byte `AmsAddr`s, the 2-byte command id, and the 2-byte flags word —
/// see [`AdsHeader`]'s own byte layout).
const DATA_LENGTH_OFFSET: usize = 20;

/// Streaming [`Decoder`]/[`Encoder`] for [`AdsFrame`]s, reassembling frames from a byte
/// buffer that may be fed in arbitrarily small or large chunks.
///
/// In [`FrameMode::Tcp`], a frame is only recognised once the 6-byte AMS/TCP preamble and
/// its declared length have both arrived; in [`FrameMode::Raw`] the same reassembly
/// happens against the 32-byte [`AdsHeader`] itself, since there is no outer preamble.
/// A declared length outside `[ADS_HEADER_LEN, MAX_FRAME_LENGTH]` discards the entire
/// buffer and fails the decode — the codec does not attempt to resynchronise on a
/// corrupt stream.
#[derive(Debug, Clone, Copy)]
pub struct AdsFrameCodec {
    mode: FrameMode,
}

impl AdsFrameCodec {
    /// Creates a codec that frames in the given [`FrameMode`].
    pub fn new(mode: FrameMode) -> Self {
        Self { mode }
    }

    /// Creates a codec for plain ADS over TCP (with the 6-byte AMS/TCP preamble).
    pub fn tcp() -> Self {
        Self::new(FrameMode::Tcp)
    }

    /// Creates a codec for Secure ADS inside a TLS tunnel (no outer preamble).
    pub fn raw() -> Self {
        Self::new(FrameMode::Raw)
    }

    pub fn mode(&self) -> FrameMode {
        self.mode
    }
}

impl Decoder for AdsFrameCodec {
    type Item = AdsFrame;
    type Error = FrameCodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<AdsFrame>, FrameCodecError> {
        match self.mode {
            FrameMode::Tcp => self.decode_tcp(src),
            FrameMode::Raw => self.decode_raw(src),
        }
    }
}

impl AdsFrameCodec {
    fn decode_tcp(&mut self, src: &mut BytesMut) -> Result<Option<AdsFrame>, FrameCodecError> {
        if src.len() < AMS_TCP_PREAMBLE_LEN {
            return Ok(None);
        }

        let length = u32::from_le_bytes(src[2..AMS_TCP_PREAMBLE_LEN].try_into().unwrap()) as usize;
        if !(ADS_HEADER_LEN..=MAX_FRAME_LENGTH).contains(&length) {
            src.clear();
            return Err(FrameCodecError::FrameTooLong {
                length,
                max: MAX_FRAME_LENGTH,
            });
        }

        let total = AMS_TCP_PREAMBLE_LEN + length;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(total);
        frame.advance(AMS_TCP_PREAMBLE_LEN);
        Ok(Some(parse_header_and_payload(&frame)))
    }

    fn decode_raw(&mut self, src: &mut BytesMut) -> Result<Option<AdsFrame>, FrameCodecError> {
        if src.len() < ADS_HEADER_LEN {
            return Ok(None);
        }

        let data_length = u32::from_le_bytes(
            src[DATA_LENGTH_OFFSET..DATA_LENGTH_OFFSET + 4]
                .try_into()
                .unwrap(),
        ) as usize;
        let total = ADS_HEADER_LEN + data_length;
        if total > MAX_FRAME_LENGTH {
            src.clear();
            return Err(FrameCodecError::FrameTooLong {
                length: total,
                max: MAX_FRAME_LENGTH,
            });
        }

        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        let frame = src.split_to(total);
        Ok(Some(parse_header_and_payload(&frame)))
    }
}

fn parse_header_and_payload(buf: &BytesMut) -> AdsFrame {
    let header_bytes: [u8; ADS_HEADER_LEN] = buf[..ADS_HEADER_LEN].try_into().unwrap();
    let header = AdsHeader::from_bytes(header_bytes);
    let payload = buf[ADS_HEADER_LEN..].to_vec();
    AdsFrame::new(header, payload)
}

impl Encoder<AdsFrame> for AdsFrameCodec {
    type Error = FrameCodecError;

    fn encode(&mut self, item: AdsFrame, dst: &mut BytesMut) -> Result<(), FrameCodecError> {
        let bytes = item.encode(self.mode)?;
        dst.reserve(bytes.len());
        dst.put_slice(&bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ads::{AdsCommand, AdsReturnCode, StateFlag};
    use crate::ams::{AmsAddr, AmsNetId};

    fn sample_header() -> AdsHeader {
        AdsHeader::new(
            AmsAddr::new(AmsNetId::new(10, 20, 30, 40, 1, 1), 851),
            AmsAddr::new(AmsNetId::new(192, 168, 0, 10, 1, 1), 30000),
            AdsCommand::Read,
            StateFlag::tcp_ads_request(),
            4,
            AdsReturnCode::Ok,
            7,
        )
    }

    #[test]
    fn encode_tcp_mode_prefixes_preamble() {
        let frame = AdsFrame::new(sample_header(), vec![1, 2, 3, 4]);
        let bytes = frame.encode(FrameMode::Tcp).unwrap();

        assert_eq!(&bytes[0..2], &[0, 0]);
        let len = u32::from_le_bytes(bytes[2..6].try_into().unwrap());
        assert_eq!(len as usize, ADS_HEADER_LEN + 4);
        assert_eq!(bytes.len(), AMS_TCP_PREAMBLE_LEN + ADS_HEADER_LEN + 4);
    }

    #[test]
    fn encode_raw_mode_omits_preamble() {
        let frame = AdsFrame::new(sample_header(), vec![1, 2, 3, 4]);
        let bytes = frame.encode(FrameMode::Raw).unwrap();
        assert_eq!(bytes.len(), ADS_HEADER_LEN + 4);
    }

    #[test]
    fn encode_rejects_oversized_payload() {
        let frame = AdsFrame::new(sample_header(), vec![0u8; MAX_FRAME_LENGTH]);
        let err = frame.encode(FrameMode::Raw).unwrap_err();
        assert!(matches!(err, FrameCodecError::FrameTooLong { .. }));
    }

    #[test]
    fn decode_roundtrip_tcp_mode() {
        let frame = AdsFrame::new(sample_header(), vec![9, 9, 9, 9]);
        let mut buf = BytesMut::from(&frame.encode(FrameMode::Tcp).unwrap()[..]);

        let mut codec = AdsFrameCodec::tcp();
        let decoded = codec.decode(&mut buf).unwrap().expect("frame ready");
        assert_eq!(decoded, frame);
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_roundtrip_raw_mode() {
        let frame = AdsFrame::new(sample_header(), vec![1, 2, 3]);
        let mut buf = BytesMut::from(&frame.encode(FrameMode::Raw).unwrap()[..]);

        let mut codec = AdsFrameCodec::raw();
        let decoded = codec.decode(&mut buf).unwrap().expect("frame ready");
        assert_eq!(decoded, frame);
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_tcp_mode_reassembles_across_arbitrary_chunk_boundaries() {
        let frame = AdsFrame::new(sample_header(), vec![0xAA; 58 - ADS_HEADER_LEN]);
        let encoded = frame.encode(FrameMode::Tcp).unwrap();
        assert_eq!(encoded.len(), 64);

        let mut codec = AdsFrameCodec::tcp();
        let mut buf = BytesMut::new();

        buf.extend_from_slice(&encoded[0..3]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&encoded[3..8]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&encoded[8..64]);
        let decoded = codec.decode(&mut buf).unwrap().expect("frame ready on third feed");
        assert_eq!(decoded, frame);
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_tcp_mode_rejects_length_out_of_range() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0, 0]);
        buf.extend_from_slice(&31u32.to_le_bytes());
        buf.extend_from_slice(&[0u8; 100]);

        let mut codec = AdsFrameCodec::tcp();
        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(err, FrameCodecError::FrameTooLong { length: 31, .. }));
        assert!(buf.is_empty(), "buffer must be discarded on FrameTooLong");
    }

    #[test]
    fn decode_raw_mode_rejects_oversized_data_length() {
        let header = AdsHeader::new(
            AmsAddr::new(AmsNetId::new(1, 1, 1, 1, 1, 1), 851),
            AmsAddr::new(AmsNetId::new(1, 1, 1, 1, 1, 1), 30000),
            AdsCommand::Read,
            StateFlag::tcp_ads_request(),
            5 * 1024 * 1024,
            AdsReturnCode::Ok,
            1,
        );
        let mut buf = BytesMut::from(&header.to_bytes()[..]);

        let mut codec = AdsFrameCodec::raw();
        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(err, FrameCodecError::FrameTooLong { .. }));
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_returns_none_without_consuming_on_partial_input() {
        let frame = AdsFrame::new(sample_header(), vec![1, 2, 3, 4]);
        let encoded = frame.encode(FrameMode::Raw).unwrap();

        let mut codec = AdsFrameCodec::raw();
        let mut buf = BytesMut::from(&encoded[..encoded.len() - 1]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), encoded.len() - 1);
    }
}
