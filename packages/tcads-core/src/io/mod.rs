//! Frame I/O for the AMS/ADS wire protocol.
//!
//! [`ads_frame`] implements the ADS-level frame: a 32-byte
//! [`AdsHeader`](crate::ads::AdsHeader) plus payload, carried with or without the 6-byte
//! AMS/TCP length preamble depending on whether the transport is plain ADS (TCP port
//! 48898) or a Secure ADS TLS tunnel (port 8016). [`AdsFrameCodec`](ads_frame::AdsFrameCodec)
//! is a [`tokio_util::codec`] `Decoder`/`Encoder` pair that reassembles frames across
//! arbitrary buffer boundaries, which lets it be driven either directly by a
//! [`tokio_util::codec::Framed`] TCP socket or by hand, fed with plaintext bytes as a TLS
//! engine decrypts them.

pub mod ads_frame;

pub use ads_frame::{AdsFrame, AdsFrameCodec, FrameCodecError, FrameMode, MAX_FRAME_LENGTH};
