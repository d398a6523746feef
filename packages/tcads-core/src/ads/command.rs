use super::error::AdsCommandError;

/// ADS Command Identifiers.
///
/// These identify the operation carried by an [`AdsHeader`](super::AdsHeader) and its
/// payload. See [Beckhoff ADS Command IDs](https://infosys.beckhoff.com/content/1033/tc3_ads_intro/115847307.html?id=7738940192708835096).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AdsCommand {
    /// Invalid/unset command.
    Invalid,
    /// Query basic information about an ADS device (name, version).
    ReadDeviceInfo,
    /// Read data from an index group/offset.
    Read,
    /// Write data to an index group/offset.
    Write,
    /// Query the current ADS/device state.
    ReadState,
    /// Change the ADS state (e.g. Run/Stop) or device state.
    WriteControl,
    /// Register a device notification for a given index group/offset.
    AddDeviceNotification,
    /// Cancel a previously registered device notification.
    DeleteDeviceNotification,
    /// An unsolicited device notification sample delivered by the server.
    DeviceNotification,
    /// Combined write followed by read in a single round trip.
    ReadWrite,
    /// Unknown/unsupported command code.
    Unknown(u16),
}

impl AdsCommand {
    /// The length of the ADS Command ID in bytes.
    pub const LENGTH: usize = 2;

    /// Creates a new `AdsCommand` from a 2-byte array (Little Endian).
    pub fn from_bytes(bytes: [u8; Self::LENGTH]) -> Self {
        Self::from(bytes)
    }

    /// Converts the command to a 2-byte array (Little Endian).
    pub fn to_bytes(&self) -> [u8; Self::LENGTH] {
        (*self).into()
    }

    /// Tries to parse an `AdsCommand` from a byte slice.
    pub fn try_from_slice(bytes: &[u8]) -> Result<Self, AdsCommandError> {
        bytes.try_into()
    }
}

impl From<u16> for AdsCommand {
    fn from(value: u16) -> Self {
        match value {
            0x0000 => Self::Invalid,
            0x0001 => Self::ReadDeviceInfo,
            0x0002 => Self::Read,
            0x0003 => Self::Write,
            0x0004 => Self::ReadState,
            0x0005 => Self::WriteControl,
            0x0006 => Self::AddDeviceNotification,
            0x0007 => Self::DeleteDeviceNotification,
            0x0008 => Self::DeviceNotification,
            0x0009 => Self::ReadWrite,
            n => Self::Unknown(n),
        }
    }
}

impl From<AdsCommand> for u16 {
    fn from(value: AdsCommand) -> Self {
        match value {
            AdsCommand::Invalid => 0x0000,
            AdsCommand::ReadDeviceInfo => 0x0001,
            AdsCommand::Read => 0x0002,
            AdsCommand::Write => 0x0003,
            AdsCommand::ReadState => 0x0004,
            AdsCommand::WriteControl => 0x0005,
            AdsCommand::AddDeviceNotification => 0x0006,
            AdsCommand::DeleteDeviceNotification => 0x0007,
            AdsCommand::DeviceNotification => 0x0008,
            AdsCommand::ReadWrite => 0x0009,
            AdsCommand::Unknown(n) => n,
        }
    }
}

impl From<[u8; Self::LENGTH]> for AdsCommand {
    fn from(bytes: [u8; Self::LENGTH]) -> Self {
        u16::from_le_bytes(bytes).into()
    }
}

impl From<AdsCommand> for [u8; AdsCommand::LENGTH] {
    fn from(command: AdsCommand) -> Self {
        u16::from(command).to_le_bytes()
    }
}

impl TryFrom<&[u8]> for AdsCommand {
    type Error = AdsCommandError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.len() < Self::LENGTH {
            return Err(AdsCommandError::UnexpectedLength {
                expected: Self::LENGTH,
                got: bytes.len(),
            });
        }
        Ok(Self::from([bytes[0], bytes[1]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_conversion() {
        assert_eq!(AdsCommand::from(0x0001), AdsCommand::ReadDeviceInfo);
        assert_eq!(AdsCommand::from(0x0004), AdsCommand::ReadState);
        assert_eq!(AdsCommand::from(0x0008), AdsCommand::DeviceNotification);
        assert_eq!(u16::from(AdsCommand::ReadState), 0x0004);
        assert_eq!(AdsCommand::from(0x1234), AdsCommand::Unknown(0x1234));
    }

    #[test]
    fn test_command_bytes_roundtrip() {
        let cmd = AdsCommand::Read;
        assert_eq!(AdsCommand::from_bytes(cmd.to_bytes()), cmd);
    }

    #[test]
    fn test_try_from_slice_too_short() {
        let err = AdsCommand::try_from_slice(&[0x01]).unwrap_err();
        assert!(matches!(err, AdsCommandError::UnexpectedLength { .. }));
    }
}
