use anyhow::anyhow;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

pub const MAX_PACKET_LEN: usize = 16 * 1024 * 1024;

/// Body length (`u32`) followed by the call id (`u64`), both big endian.
const HEADER_LEN: usize = 12;

/// One frame on a connection. A reply carries the call id of the request it
/// answers.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Packet {
    pub call_id: u64,
    pub body: Bytes,
}

impl Packet {
    pub fn new(call_id: u64, body: impl Into<Bytes>) -> Self {
        Self {
            call_id,
            body: body.into(),
        }
    }
}

#[derive(Debug, Default)]
pub struct PacketCodec;

impl Encoder<Packet> for PacketCodec {
    type Error = anyhow::Error;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let len = item.body.len();
        if len > MAX_PACKET_LEN {
            return Err(anyhow!("packet {} of {} bytes exceeds limit {}", item.call_id, len, MAX_PACKET_LEN));
        }
        dst.reserve(HEADER_LEN + len);
        dst.put_u32(len as u32);
        dst.put_u64(item.call_id);
        dst.put_slice(&item.body);
        Ok(())
    }
}

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = anyhow::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }
        let body_len = (&src[..4]).get_u32() as usize;
        if body_len > MAX_PACKET_LEN {
            return Err(anyhow!("incoming packet of {} bytes exceeds limit {}", body_len, MAX_PACKET_LEN));
        }
        let frame_len = HEADER_LEN + body_len;
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }
        src.advance(4);
        let call_id = src.get_u64();
        let body = src.split_to(body_len).freeze();
        Ok(Some(Packet { call_id, body }))
    }
}
