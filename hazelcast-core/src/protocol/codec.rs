//! Codec implementation for encoding/decoding Hazelcast protocol messages.

use std::collections::HashMap;

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use super::constants::*;
use super::frame::Frame;
use super::ClientMessage;
use crate::error::{HazelcastError, Result};

/// Codec for encoding and decoding Hazelcast client messages.
///
/// Implements the `tokio_util::codec::{Encoder, Decoder}` traits for use
/// with tokio's framed I/O. Frames are collected until one carries
/// `IS_FINAL`. Fragmented messages are buffered per fragment ID and only
/// yielded once their last fragment has arrived.
#[derive(Debug)]
pub struct ClientMessageCodec {
    /// Frames accumulated for the message currently on the wire.
    pending_frames: Vec<Frame>,
    /// Partially reassembled messages, keyed by fragment ID.
    fragments: HashMap<i64, Vec<Frame>>,
    max_frame_length: usize,
}

impl ClientMessageCodec {
    /// Creates a new codec instance with the default frame length limit.
    pub fn new() -> Self {
        Self::with_max_frame_length(DEFAULT_MAX_FRAME_LENGTH)
    }

    /// Creates a codec that rejects frames longer than `max_frame_length`.
    pub fn with_max_frame_length(max_frame_length: usize) -> Self {
        Self {
            pending_frames: Vec::new(),
            fragments: HashMap::new(),
            max_frame_length,
        }
    }

    /// Returns the number of fragmented messages still waiting for their last fragment.
    pub fn incomplete_fragments(&self) -> usize {
        self.fragments.len()
    }

    fn assemble(&mut self, frames: Vec<Frame>) -> Result<Option<ClientMessage>> {
        let first = match frames.first() {
            Some(first) => first,
            None => return Ok(None),
        };
        if first.is_unfragmented() {
            return Ok(Some(ClientMessage::from_frames(frames)));
        }

        let id_bytes: [u8; FRAGMENT_ID_SIZE] = first
            .content
            .get(..FRAGMENT_ID_SIZE)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| HazelcastError::Protocol("fragment without fragment id".into()))?;
        let fragment_id = i64::from_le_bytes(id_bytes);
        let is_begin = first.is_begin_fragment();
        let is_end = first.is_end_fragment();
        let body = frames.into_iter().skip(1);

        if is_begin {
            self.fragments.insert(fragment_id, body.collect());
            return Ok(None);
        }

        // Fragments of a message whose start was never seen are dropped.
        let buffered = match self.fragments.get_mut(&fragment_id) {
            Some(buffered) => buffered,
            None => return Ok(None),
        };
        buffered.extend(body);

        if is_end {
            let frames = self.fragments.remove(&fragment_id).unwrap_or_default();
            return Ok(Some(ClientMessage::from_frames(frames)));
        }
        Ok(None)
    }
}

impl Default for ClientMessageCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder<ClientMessage> for ClientMessageCodec {
    type Error = HazelcastError;

    fn encode(&mut self, mut item: ClientMessage, dst: &mut BytesMut) -> Result<()> {
        if item.is_empty() {
            return Err(HazelcastError::Protocol(
                "cannot encode empty message".to_string(),
            ));
        }

        item.write_to(dst);
        Ok(())
    }
}

impl Decoder for ClientMessageCodec {
    type Item = ClientMessage;
    type Error = HazelcastError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        loop {
            let frame_length = match Frame::peek_length(src) {
                Some(length) => length,
                None => return Ok(None),
            };
            if frame_length < FRAME_HEADER_SIZE {
                return Err(HazelcastError::Protocol(format!(
                    "frame length {} is shorter than the frame header",
                    frame_length
                )));
            }
            if frame_length > self.max_frame_length {
                return Err(HazelcastError::Protocol(format!(
                    "frame length {} exceeds maximum of {}",
                    frame_length, self.max_frame_length
                )));
            }

            let frame = match Frame::read_from(src) {
                Some(frame) => frame,
                None => {
                    src.reserve(frame_length - src.len());
                    return Ok(None);
                }
            };

            let is_final = frame.is_final_frame();
            self.pending_frames.push(frame);

            if is_final {
                let frames = std::mem::take(&mut self.pending_frames);
                if let Some(message) = self.assemble(frames)? {
                    return Ok(Some(message));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_all(codec: &mut ClientMessageCodec, messages: Vec<ClientMessage>) -> BytesMut {
        let mut buf = BytesMut::new();
        for message in messages {
            codec.encode(message, &mut buf).unwrap();
        }
        buf
    }

    #[test]
    fn test_encode_decode_single_frame() {
        let mut codec = ClientMessageCodec::new();
        let mut original = ClientMessage::create_for_encode(CLIENT_PING, PARTITION_ID_ANY);
        original.set_correlation_id(11);

        let mut buf = encode_all(&mut codec, vec![original]);
        let decoded = codec.decode(&mut buf).unwrap().unwrap();

        assert_eq!(decoded.message_type(), Some(CLIENT_PING));
        assert_eq!(decoded.correlation_id(), Some(11));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_encode_empty_message_fails() {
        let mut codec = ClientMessageCodec::new();
        let mut buf = BytesMut::new();
        assert!(codec.encode(ClientMessage::new(), &mut buf).is_err());
    }

    #[test]
    fn test_decode_waits_for_final_frame() {
        let mut codec = ClientMessageCodec::new();
        let mut msg = ClientMessage::create_for_encode(CLIENT_AUTHENTICATION, 3);
        msg.add_frame(Frame::from_slice(b"dev"));
        msg.add_frame(Frame::from_slice(b"client"));

        let mut full = encode_all(&mut codec, vec![msg]);
        let mut first_two = full.split_to(full.len() - (FRAME_HEADER_SIZE + 6));

        assert!(codec.decode(&mut first_two).unwrap().is_none());
        assert!(first_two.is_empty());

        let decoded = codec.decode(&mut full).unwrap().unwrap();
        assert_eq!(decoded.frame_count(), 3);
        assert_eq!(decoded.partition_id(), Some(3));
    }

    #[test]
    fn test_decode_incomplete_frame() {
        let mut codec = ClientMessageCodec::new();
        let mut buf = BytesMut::from(
            &[
                0x10, 0x00, 0x00, 0x00, // length = 16
                0x00, 0xC0, // unfragmented
                0x01, 0x02, // only 2 bytes of content
            ][..],
        );

        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 8);
    }

    #[test]
    fn test_decode_multiple_messages() {
        let mut codec = ClientMessageCodec::new();
        let mut buf = encode_all(
            &mut codec,
            vec![
                ClientMessage::create_for_encode(CLIENT_PING, 0),
                ClientMessage::create_for_encode(CLIENT_ADD_CLUSTER_VIEW_LISTENER, 0),
            ],
        );

        let first = codec.decode(&mut buf).unwrap().unwrap();
        let second = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(first.message_type(), Some(CLIENT_PING));
        assert_eq!(second.message_type(), Some(CLIENT_ADD_CLUSTER_VIEW_LISTENER));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_fragmented_message_is_yielded_after_last_fragment() {
        let mut codec = ClientMessageCodec::new();
        let mut msg = ClientMessage::create_for_response(CLIENT_PING_RESPONSE, 77);
        for i in 0..5u8 {
            msg.add_frame(Frame::from_slice(&[i; 32]));
        }

        let fragments = msg.split_into_fragments(48, 9);
        assert!(fragments.len() > 2);

        let mut buf = encode_all(&mut codec, fragments);
        let decoded = codec.decode(&mut buf).unwrap().unwrap();

        assert_eq!(decoded.correlation_id(), Some(77));
        assert_eq!(decoded.frame_count(), 6);
        assert_eq!(&decoded.frames()[5].content[..], &[4u8; 32]);
        assert_eq!(codec.incomplete_fragments(), 0);
    }

    #[test]
    fn test_interleaved_fragments_are_kept_apart() {
        let mut codec = ClientMessageCodec::new();

        let build = |correlation_id: i64| {
            let mut msg = ClientMessage::create_for_response(CLIENT_PING_RESPONSE, correlation_id);
            msg.add_frame(Frame::from_slice(&[1u8; 32]));
            msg.add_frame(Frame::from_slice(&[2u8; 32]));
            msg
        };
        let a = build(1).split_into_fragments(48, 100);
        let b = build(2).split_into_fragments(48, 200);
        assert_eq!(a.len(), 3);
        assert_eq!(b.len(), 3);

        let interleaved = vec![
            a[0].clone(),
            b[0].clone(),
            a[1].clone(),
            b[1].clone(),
            b[2].clone(),
            a[2].clone(),
        ];
        let mut buf = encode_all(&mut codec, interleaved);

        let first = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(first.correlation_id(), Some(2));
        assert_eq!(codec.incomplete_fragments(), 1);

        let second = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(second.correlation_id(), Some(1));
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_orphan_fragment_is_dropped() {
        let mut codec = ClientMessageCodec::new();
        let mut msg = ClientMessage::create_for_response(CLIENT_PING_RESPONSE, 5);
        msg.add_frame(Frame::from_slice(&[1u8; 32]));
        msg.add_frame(Frame::from_slice(&[2u8; 32]));
        let fragments = msg.split_into_fragments(48, 1);

        let mut buf = encode_all(&mut codec, fragments[1..].to_vec());
        buf.extend_from_slice(&encode_all(
            &mut codec,
            vec![ClientMessage::create_for_response(CLIENT_PING_RESPONSE, 6)],
        ));

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.correlation_id(), Some(6));
    }

    #[test]
    fn test_frame_over_limit_is_rejected() {
        let mut codec = ClientMessageCodec::with_max_frame_length(16);
        let mut msg = ClientMessage::create_for_encode(CLIENT_PING, 0);
        msg.add_frame(Frame::from_slice(&[0u8; 64]));

        let mut buf = BytesMut::new();
        codec.encode(msg, &mut buf).unwrap();

        assert!(matches!(
            codec.decode(&mut buf),
            Err(HazelcastError::Protocol(_))
        ));
    }

    #[test]
    fn test_length_field_counts_whole_frame() {
        let mut codec = ClientMessageCodec::new();
        let buf = encode_all(
            &mut codec,
            vec![ClientMessage::create_for_encode(CLIENT_PING, 0)],
        );

        let length = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        assert_eq!(length, buf.len());
    }

    #[test]
    fn test_length_shorter_than_header_is_rejected() {
        let mut codec = ClientMessageCodec::new();
        let mut buf = BytesMut::from(&[0x02, 0x00, 0x00, 0x00, 0x00, 0xE0][..]);

        assert!(matches!(
            codec.decode(&mut buf),
            Err(HazelcastError::Protocol(_))
        ));
    }

    #[test]
    fn test_partial_then_complete_decode() {
        let mut codec = ClientMessageCodec::new();
        let mut full_buf = encode_all(
            &mut codec,
            vec![ClientMessage::create_for_encode(CLIENT_PING, 0)],
        );

        let split_point = full_buf.len() / 2;
        let mut partial_buf = full_buf.split_to(split_point);
        assert!(codec.decode(&mut partial_buf).unwrap().is_none());

        partial_buf.unsplit(full_buf);
        let decoded = codec.decode(&mut partial_buf).unwrap().unwrap();
        assert_eq!(decoded.message_type(), Some(CLIENT_PING));
    }
}
