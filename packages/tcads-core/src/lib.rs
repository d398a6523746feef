#![doc = include_str!("../README.md")]

/// ADS protocol primitives - commands, states, errors, strings, and
/// wire-format types like [`AdsState`], [`AdsReturnCode`], [`AdsHeader`].
pub mod ads;

/// AMS layer - network addressing ([`AmsNetId`], [`AmsAddr`]).
pub mod ams;

/// Frame I/O - [`AdsFrame`] construction and the [`AdsFrameCodec`] that reassembles
/// frames from a byte stream in either TCP (plain ADS) or raw (Secure ADS/TLS) mode.
pub mod io;

pub use ads::{AdsCommand, AdsDeviceVersion, AdsError, AdsHeader, AdsReturnCode, AdsState, AdsTransMode};
pub use ams::{AmsAddr, AmsNetId, AmsPort};
pub use io::{AdsFrame, AdsFrameCodec, FrameMode};
