use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::core::{ClientId, Error, Result, MESSAGE_SIZE};
use super::message::{Descriptor, Message};

/// Encodes a message as five little-endian `i32`s:
/// `from | to | descriptor | meta_data | value`
pub fn encode(message: &Message) -> [u8; MESSAGE_SIZE] {
    let mut buf = [0u8; MESSAGE_SIZE];
    let fields = [
        message.from.get(),
        message.to.get(),
        message.descriptor.get(),
        message.meta_data,
        message.value,
    ];
    for (chunk, field) in buf.chunks_exact_mut(4).zip(fields) {
        chunk.copy_from_slice(&field.to_le_bytes());
    }
    buf
}

/// Decodes a message from the front of `buf`
///
/// Anything shorter than [`MESSAGE_SIZE`] is rejected before a single field
/// is read. Trailing bytes are ignored. There is no checksum or magic
/// number: any 20 bytes decode to some message.
pub fn decode(mut buf: &[u8]) -> Result<Message> {
    if buf.len() < MESSAGE_SIZE {
        return Err(Error::Malformed { len: buf.len() });
    }

    Ok(Message {
        from: ClientId(buf.get_i32_le()),
        to: ClientId(buf.get_i32_le()),
        descriptor: Descriptor(buf.get_i32_le()),
        meta_data: buf.get_i32_le(),
        value: buf.get_i32_le(),
    })
}

/// Codec for messages carried back to back on a byte stream
///
/// Datagrams go through [`decode`] directly; this codec exists for framed
/// transports (serial links, captures) where a short read means "wait for more".
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageCodec;

impl MessageCodec {
    /// Creates a new message codec
    pub fn new() -> Self {
        MessageCodec
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if src.len() < MESSAGE_SIZE {
            // Need more data to read a full message
            src.reserve(MESSAGE_SIZE - src.len());
            return Ok(None);
        }

        let frame = src.split_to(MESSAGE_SIZE);
        decode(&frame).map(Some)
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = Error;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<()> {
        dst.reserve(MESSAGE_SIZE);
        dst.put_slice(&encode(&item));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_wire_layout() {
        let message = Message::new(ClientId(3), ClientId(0), Descriptor::IDENTIFY, 1, -2);
        let bytes = encode(&message);

        assert_eq!(&bytes[0..4], &[3, 0, 0, 0]);
        assert_eq!(&bytes[4..8], &[0, 0, 0, 0]);
        assert_eq!(&bytes[8..12], &[1, 0, 0, 0]);
        assert_eq!(&bytes[12..16], &[1, 0, 0, 0]);
        assert_eq!(&bytes[16..20], &[0xfe, 0xff, 0xff, 0xff]);
    }

    #[test]
    fn test_round_trip_random_messages() {
        let mut rng = rand::thread_rng();
        for _ in 0..256 {
            let message = Message::new(
                ClientId(rng.gen()),
                ClientId(rng.gen()),
                Descriptor(rng.gen()),
                rng.gen(),
                rng.gen(),
            );
            assert_eq!(decode(&encode(&message)).unwrap(), message);
        }
    }

    #[test]
    fn test_short_buffers_are_malformed() {
        let bytes = encode(&Message::new(ClientId(1), ClientId(2), Descriptor(3), 4, 5));
        for len in 0..MESSAGE_SIZE {
            match decode(&bytes[..len]) {
                Err(Error::Malformed { len: reported }) => assert_eq!(reported, len),
                other => panic!("expected malformed for {} bytes, got {:?}", len, other),
            }
        }
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let message = Message::new(ClientId(4), ClientId(2), Descriptor(30), 17, 420);
        let mut bytes = encode(&message).to_vec();
        bytes.extend_from_slice(&[0xaa; 12]);
        assert_eq!(decode(&bytes).unwrap(), message);
    }

    #[test]
    fn test_codec_stream() {
        let mut codec = MessageCodec::new();
        let mut bytes = BytesMut::new();

        let first = Message::new(ClientId(1), ClientId(0), Descriptor::SYSTEM_RESTART, 0, 3);
        let second = Message::new(ClientId(2), ClientId(1), Descriptor(30), 90, 1234);
        codec.encode(first, &mut bytes).unwrap();
        codec.encode(second, &mut bytes).unwrap();

        // Hold back the tail of the second message
        let tail = bytes.split_off(30);

        assert_eq!(codec.decode(&mut bytes).unwrap(), Some(first));
        assert_eq!(codec.decode(&mut bytes).unwrap(), None);

        bytes.extend_from_slice(&tail);
        assert_eq!(codec.decode(&mut bytes).unwrap(), Some(second));
        assert!(bytes.is_empty());
    }
}
