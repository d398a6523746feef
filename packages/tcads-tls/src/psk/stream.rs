//! An in-memory duplex byte stream, used so the PSK engine can drive OpenSSL's blocking
//! `SslStream` API as a non-blocking state machine: ciphertext that arrives off the wire is
//! pushed into the read side, and whatever the TLS state machine produces is drained from
//! the write side and handed back to the caller to put on the wire.

use std::collections::VecDeque;
use std::io::{self, Read, Write};

#[derive(Debug, Default)]
pub struct MemoryStream {
    inbound: VecDeque<u8>,
    outbound: Vec<u8>,
}

impl MemoryStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends ciphertext received from the transport to the read side.
    pub fn feed_inbound(&mut self, bytes: &[u8]) {
        self.inbound.extend(bytes);
    }

    /// Drains whatever the TLS state machine has queued to send, if anything.
    pub fn take_outbound(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.outbound)
    }

    pub fn has_outbound(&self) -> bool {
        !self.outbound.is_empty()
    }
}

impl Read for MemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.inbound.is_empty() {
            return Err(io::Error::new(io::ErrorKind::WouldBlock, "no inbound data buffered"));
        }
        let n = buf.len().min(self.inbound.len());
        for slot in buf.iter_mut().take(n) {
            *slot = self.inbound.pop_front().unwrap();
        }
        Ok(n)
    }
}

impl Write for MemoryStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.outbound.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_returns_would_block_when_empty() {
        let mut stream = MemoryStream::new();
        let mut buf = [0u8; 4];
        let err = stream.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }

    #[test]
    fn write_accumulates_and_drains() {
        let mut stream = MemoryStream::new();
        stream.write_all(b"hello").unwrap();
        assert!(stream.has_outbound());
        assert_eq!(stream.take_outbound(), b"hello");
        assert!(!stream.has_outbound());
    }

    #[test]
    fn feed_then_read_returns_bytes() {
        let mut stream = MemoryStream::new();
        stream.feed_inbound(b"abc");
        let mut buf = [0u8; 2];
        assert_eq!(stream.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf, b"ab");
        assert_eq!(stream.read(&mut buf).unwrap(), 1);
    }
}
