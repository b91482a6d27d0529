use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::config::{MAGIC_BYTES, MAX_PAYLOAD_SIZE};
use crate::core::packet::{Header, Packet, HEADER_SIZE};
use crate::error::{BankError, Result};

/// Tokio codec that frames [`Packet`]s over a byte stream.
///
/// A frame split across several reads is buffered until the declared payload
/// length has arrived, so message size is bounded only by `max_payload`.
#[derive(Debug, Clone, Copy)]
pub struct PacketCodec {
    max_payload: usize,
}

impl PacketCodec {
    pub fn new(max_payload: usize) -> Self {
        Self { max_payload }
    }

    pub fn max_payload(&self) -> usize {
        self.max_payload
    }
}

impl Default for PacketCodec {
    fn default() -> Self {
        Self::new(MAX_PAYLOAD_SIZE)
    }
}

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = BankError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>> {
        if src.len() < HEADER_SIZE {
            return Ok(None);
        }

        let header = Header::parse(&src[..HEADER_SIZE])?;
        header.check_limit(self.max_payload)?;

        let frame_len = HEADER_SIZE + header.length;
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        src.advance(HEADER_SIZE);
        let payload = src.split_to(header.length).to_vec();
        Ok(Some(Packet {
            version: header.version,
            payload,
        }))
    }
}

impl Encoder<Packet> for PacketCodec {
    type Error = BankError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<()> {
        if item.payload.len() > self.max_payload {
            return Err(BankError::OversizedPacket(item.payload.len()));
        }

        dst.reserve(HEADER_SIZE + item.payload.len());
        dst.put_slice(&MAGIC_BYTES);
        dst.put_u8(item.version);
        dst.put_u32(item.payload.len() as u32);
        dst.put_slice(&item.payload);
        Ok(())
    }
}
