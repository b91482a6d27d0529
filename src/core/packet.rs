use crate::config::{MAGIC_BYTES, MAX_PAYLOAD_SIZE, PROTOCOL_VERSION};
use crate::error::{BankError, Result};

/// Size of the fixed packet header in bytes
pub const HEADER_SIZE: usize = 9;

/// One framed unit on the wire.
///
/// ```text
/// [Magic(4)] [Version(1)] [Length(4, big endian)] [Payload(N)]
/// ```
///
/// The payload carries exactly one encoded request or response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub version: u8,
    pub payload: Vec<u8>,
}

impl Packet {
    pub fn new(payload: Vec<u8>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            payload,
        }
    }

    /// Serialize the header and payload into one buffer
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_SIZE + self.payload.len());
        out.extend_from_slice(&MAGIC_BYTES);
        out.push(self.version);
        out.extend_from_slice(&(self.payload.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.payload);
        out
    }

    /// Parse a complete packet from `buf`.
    ///
    /// # Errors
    /// - `InvalidHeader` for a short buffer, bad magic, or a payload shorter
    ///   than the declared length
    /// - `UnsupportedVersion` for an unknown version byte
    /// - `OversizedPacket` when the declared length exceeds the default limit
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        let header = Header::parse(buf)?;
        header.check_limit(MAX_PAYLOAD_SIZE)?;

        let end = HEADER_SIZE + header.length;
        if buf.len() < end {
            return Err(BankError::InvalidHeader);
        }

        Ok(Self {
            version: header.version,
            payload: buf[HEADER_SIZE..end].to_vec(),
        })
    }
}

/// Decoded packet header
#[derive(Debug, Clone, Copy)]
pub(crate) struct Header {
    pub version: u8,
    pub length: usize,
}

impl Header {
    pub(crate) fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE || buf[..4] != MAGIC_BYTES {
            return Err(BankError::InvalidHeader);
        }

        let version = buf[4];
        if version != PROTOCOL_VERSION {
            return Err(BankError::UnsupportedVersion(version));
        }

        let length = u32::from_be_bytes([buf[5], buf[6], buf[7], buf[8]]) as usize;
        Ok(Self { version, length })
    }

    pub(crate) fn check_limit(&self, max_payload: usize) -> Result<()> {
        if self.length > max_payload {
            return Err(BankError::OversizedPacket(self.length));
        }
        Ok(())
    }
}
