//! `tokio_util::codec` adapter for async streams.

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{encode_packet, ParseCursor, DEFAULT_MAX_PAYLOAD};
use crate::error::{FrameError, Result};

/// Packet codec for `Framed`, `FramedRead` and `FramedWrite`.
///
/// Decoding yields raw payloads; encoding accepts anything that derefs to
/// bytes. A framing error ends the framed stream, as `tokio_util` does for
/// every decoder error.
#[derive(Debug, Clone)]
pub struct PacketCodec {
    cursor: ParseCursor,
    max_payload: usize,
}

impl Default for PacketCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketCodec {
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD)
    }

    pub fn with_max_payload(max_payload: usize) -> Self {
        Self {
            cursor: ParseCursor::default(),
            max_payload,
        }
    }
}

impl Decoder for PacketCodec {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        self.cursor.extract(src, self.max_payload)
    }
}

impl<T: AsRef<[u8]>> Encoder<T> for PacketCodec {
    type Error = FrameError;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<()> {
        let payload = item.as_ref();
        if payload.len() > self.max_payload {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: self.max_payload,
            });
        }
        encode_packet(payload, dst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio::io::AsyncWriteExt;
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;

    #[tokio::test]
    async fn framed_roundtrip_over_duplex() {
        let (client, server) = tokio::io::duplex(64);
        let mut sink = FramedWrite::new(client, PacketCodec::new());
        let mut stream = FramedRead::new(server, PacketCodec::new());

        sink.send(Bytes::from_static(br#"{"to":"root"}"#))
            .await
            .unwrap();
        sink.send("\"ß\"").await.unwrap();

        assert_eq!(
            stream.next().await.unwrap().unwrap().as_ref(),
            br#"{"to":"root"}"#
        );
        assert_eq!(stream.next().await.unwrap().unwrap().as_ref(), "\"ß\"".as_bytes());
    }

    #[tokio::test]
    async fn framed_read_reassembles_fragments() {
        let (mut client, server) = tokio::io::duplex(8);
        let mut stream = FramedRead::new(server, PacketCodec::new());

        let writer = tokio::spawn(async move {
            for piece in [&b"1"[..], b"5:{\"type\":", b"\"tick\"}", b"2:[]"] {
                client.write_all(piece).await.unwrap();
                tokio::task::yield_now().await;
            }
        });

        assert_eq!(
            stream.next().await.unwrap().unwrap().as_ref(),
            br#"{"type":"tick"}"#
        );
        assert_eq!(stream.next().await.unwrap().unwrap().as_ref(), b"[]");
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn framed_read_surfaces_malformed_header() {
        let (mut client, server) = tokio::io::duplex(64);
        client.write_all(b"nope:{}").await.unwrap();
        drop(client);

        let mut stream = FramedRead::new(server, PacketCodec::new());
        let first = stream.next().await.unwrap();
        assert!(matches!(first, Err(FrameError::InvalidLength { .. })));
    }

    #[test]
    fn encoder_rejects_oversized_payload() {
        let mut codec = PacketCodec::with_max_payload(2);
        let mut dst = BytesMut::new();
        let err = codec.encode(&b"[1,2]"[..], &mut dst).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
        assert!(dst.is_empty());
    }
}
