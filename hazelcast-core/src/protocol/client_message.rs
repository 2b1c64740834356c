//! ClientMessage type for multi-frame Hazelcast protocol messages.

use bytes::{BufMut, BytesMut};

use super::constants::*;
use super::frame::Frame;
use crate::error::{HazelcastError, Result};

/// A client message composed of one or more frames.
///
/// The first frame is the "initial frame" containing the message header
/// (type, correlation ID, partition ID for requests). Additional frames
/// contain the message payload. The last frame on the wire carries the
/// `IS_FINAL` flag.
///
/// Messages do not pick their own correlation ID; the invocation layer
/// stamps one with [`ClientMessage::set_correlation_id`] before sending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientMessage {
    frames: Vec<Frame>,
}

impl ClientMessage {
    /// Creates a new empty client message.
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }

    /// Creates a request message with the given type and partition ID.
    pub fn create_for_encode(message_type: i32, partition_id: i32) -> Self {
        Self::create_for_encode_with_capacity(message_type, partition_id, REQUEST_HEADER_SIZE)
    }

    /// Creates a request message targeting any partition.
    pub fn create_for_encode_any_partition(message_type: i32) -> Self {
        Self::create_for_encode(message_type, PARTITION_ID_ANY)
    }

    /// Creates a request message whose initial frame has room for `capacity` bytes.
    ///
    /// Codecs with fixed-size request fields append them after the header.
    pub fn create_for_encode_with_capacity(
        message_type: i32,
        partition_id: i32,
        capacity: usize,
    ) -> Self {
        let mut initial_frame =
            Frame::with_capacity(capacity.max(REQUEST_HEADER_SIZE), UNFRAGMENTED_MESSAGE);
        initial_frame.content.put_i32_le(message_type);
        initial_frame.content.put_i64_le(0);
        initial_frame.content.put_i32_le(partition_id);

        Self {
            frames: vec![initial_frame],
        }
    }

    /// Creates a response message with the given type and no backup acks.
    pub fn create_for_response(message_type: i32, correlation_id: i64) -> Self {
        let mut initial_frame = Frame::with_capacity(RESPONSE_HEADER_SIZE, UNFRAGMENTED_MESSAGE);
        initial_frame.content.put_i32_le(message_type);
        initial_frame.content.put_i64_le(correlation_id);
        initial_frame.content.put_u8(0);

        Self {
            frames: vec![initial_frame],
        }
    }

    /// Creates an event message carrying the given correlation ID.
    pub fn create_for_event(message_type: i32, correlation_id: i64, partition_id: i32) -> Self {
        let mut initial_frame =
            Frame::with_capacity(EVENT_HEADER_SIZE, UNFRAGMENTED_MESSAGE | IS_EVENT_FLAG);
        initial_frame.content.put_i32_le(message_type);
        initial_frame.content.put_i64_le(correlation_id);
        initial_frame.content.put_i32_le(partition_id);

        Self {
            frames: vec![initial_frame],
        }
    }

    /// Creates a client message from received frames.
    pub fn from_frames(frames: Vec<Frame>) -> Self {
        Self { frames }
    }

    fn read_initial<const N: usize>(&self, offset: usize) -> Option<[u8; N]> {
        let frame = self.frames.first()?;
        let bytes = frame.content.get(offset..offset + N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Some(out)
    }

    fn write_initial(&mut self, offset: usize, bytes: &[u8]) {
        if let Some(frame) = self.frames.first_mut() {
            if let Some(slot) = frame.content.get_mut(offset..offset + bytes.len()) {
                slot.copy_from_slice(bytes);
            }
        }
    }

    /// Returns the message type from the initial frame.
    ///
    /// Returns `None` if there is no initial frame or if the frame content
    /// is too short to contain a message type field.
    pub fn message_type(&self) -> Option<i32> {
        self.read_initial::<4>(TYPE_FIELD_OFFSET)
            .map(i32::from_le_bytes)
    }

    /// Sets the message type in the initial frame.
    pub fn set_message_type(&mut self, message_type: i32) {
        self.write_initial(TYPE_FIELD_OFFSET, &message_type.to_le_bytes());
    }

    /// Returns the correlation ID from the initial frame.
    pub fn correlation_id(&self) -> Option<i64> {
        self.read_initial::<8>(CORRELATION_ID_OFFSET)
            .map(i64::from_le_bytes)
    }

    /// Sets the correlation ID in the initial frame.
    ///
    /// This is a no-op when the initial frame is too short.
    pub fn set_correlation_id(&mut self, correlation_id: i64) {
        self.write_initial(CORRELATION_ID_OFFSET, &correlation_id.to_le_bytes());
    }

    /// Returns the partition ID from the initial frame (for requests and events).
    pub fn partition_id(&self) -> Option<i32> {
        self.read_initial::<4>(PARTITION_ID_OFFSET)
            .map(i32::from_le_bytes)
    }

    /// Sets the partition ID in the initial frame.
    pub fn set_partition_id(&mut self, partition_id: i32) {
        self.write_initial(PARTITION_ID_OFFSET, &partition_id.to_le_bytes());
    }

    /// Returns the number of backup acks a response expects.
    pub fn backup_acks(&self) -> Option<u8> {
        self.read_initial::<1>(RESPONSE_BACKUP_ACKS_OFFSET)
            .map(|b| b[0])
    }

    /// Adds a frame to the message.
    pub fn add_frame(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    /// Returns a reference to the initial (first) frame, if present.
    pub fn initial_frame(&self) -> Option<&Frame> {
        self.frames.first()
    }

    /// Returns a mutable reference to the initial frame, if present.
    pub fn initial_frame_mut(&mut self) -> Option<&mut Frame> {
        self.frames.first_mut()
    }

    /// Returns a reference to all frames.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Returns a cursor over the frames for sequential decoding.
    pub fn cursor(&self) -> FrameCursor<'_> {
        FrameCursor {
            frames: &self.frames,
            position: 0,
        }
    }

    /// Returns the number of frames in the message.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Returns true if the message has no frames.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Calculates the total size of the message on the wire.
    pub fn wire_size(&self) -> usize {
        self.frames.iter().map(|f| f.wire_size()).sum()
    }

    /// Writes all frames to the destination buffer.
    ///
    /// Sets the IS_FINAL flag on the last frame before writing.
    pub fn write_to(&mut self, dst: &mut BytesMut) {
        if let Some(last) = self.frames.last_mut() {
            last.flags |= IS_FINAL_FLAG;
        }
        dst.reserve(self.wire_size());
        for frame in &self.frames {
            frame.write_to(dst);
        }
    }

    /// Returns true if this message is flagged as an event.
    pub fn is_event(&self) -> bool {
        self.frames
            .first()
            .map(|f| f.is_event_frame())
            .unwrap_or(false)
    }

    /// Returns true if this message is a server exception response.
    pub fn is_exception(&self) -> bool {
        self.message_type() == Some(EXCEPTION_MESSAGE_TYPE)
    }

    /// Splits this message into fragments whose wire size stays within
    /// `max_frame_size` where possible.
    ///
    /// Every fragment starts with a frame holding `fragment_id`, flagged
    /// `BEGIN_FRAGMENT` on the first fragment, `END_FRAGMENT` on the last and
    /// neither in between. A single frame larger than the limit travels alone.
    /// A message that already fits is returned unchanged.
    pub fn split_into_fragments(&self, max_frame_size: usize, fragment_id: i64) -> Vec<Self> {
        if self.wire_size() <= max_frame_size || self.frames.len() < 2 {
            return vec![self.clone()];
        }

        let header_size = FRAME_HEADER_SIZE + FRAGMENT_ID_SIZE;
        let mut groups: Vec<Vec<Frame>> = Vec::new();
        let mut current: Vec<Frame> = Vec::new();
        let mut current_size = header_size;

        for frame in &self.frames {
            let mut frame = frame.clone();
            frame.flags &= !IS_FINAL_FLAG;
            if !current.is_empty() && current_size + frame.wire_size() > max_frame_size {
                groups.push(std::mem::take(&mut current));
                current_size = header_size;
            }
            current_size += frame.wire_size();
            current.push(frame);
        }
        if !current.is_empty() {
            groups.push(current);
        }

        let last = groups.len() - 1;
        groups
            .into_iter()
            .enumerate()
            .map(|(index, frames)| {
                let flags = match index {
                    0 => BEGIN_FRAGMENT_FLAG,
                    i if i == last => END_FRAGMENT_FLAG,
                    _ => DEFAULT_FLAGS,
                };
                let mut id_frame = Frame::with_capacity(FRAGMENT_ID_SIZE, flags);
                id_frame.content.put_i64_le(fragment_id);

                let mut fragment = Vec::with_capacity(frames.len() + 1);
                fragment.push(id_frame);
                fragment.extend(frames);
                Self::from_frames(fragment)
            })
            .collect()
    }
}

impl Default for ClientMessage {
    fn default() -> Self {
        Self::new()
    }
}

/// Sequential reader over the frames of a [`ClientMessage`].
#[derive(Debug, Clone)]
pub struct FrameCursor<'a> {
    frames: &'a [Frame],
    position: usize,
}

impl<'a> FrameCursor<'a> {
    /// Returns the next frame, or a protocol error if the message ended early.
    pub fn next_frame(&mut self) -> Result<&'a Frame> {
        let frame = self.frames.get(self.position).ok_or_else(|| {
            HazelcastError::Protocol(format!(
                "message ended after {} frames",
                self.frames.len()
            ))
        })?;
        self.position += 1;
        Ok(frame)
    }

    /// Returns the next frame without consuming it.
    pub fn peek(&self) -> Option<&'a Frame> {
        self.frames.get(self.position)
    }

    /// Returns true if more frames remain.
    pub fn has_next(&self) -> bool {
        self.position < self.frames.len()
    }

    /// Skips frames up to and including the end of the current nested structure.
    pub fn skip_to_end_of_structure(&mut self) -> Result<()> {
        let mut depth = 1usize;
        while depth > 0 {
            let frame = self.next_frame()?;
            if frame.is_end_structure() {
                depth -= 1;
            } else if frame.is_begin_structure() {
                depth += 1;
            }
        }
        Ok(())
    }

    /// Consumes the next frame if it is a null marker, returning true if so.
    pub fn next_is_null(&mut self) -> bool {
        match self.peek() {
            Some(frame) if frame.is_null_frame() => {
                self.position += 1;
                true
            }
            _ => false,
        }
    }
}

/// Computes a partition hash for the given key data.
///
/// Uses MurmurHash3 algorithm compatible with Hazelcast.
pub fn compute_partition_hash(key: &[u8]) -> i32 {
    murmur_hash3_x86_32(key, 0x01000193)
}

/// MurmurHash3 x86 32-bit implementation.
fn murmur_hash3_x86_32(data: &[u8], seed: u32) -> i32 {
    const C1: u32 = 0xcc9e2d51;
    const C2: u32 = 0x1b873593;

    let mix = |k1: u32| k1.wrapping_mul(C1).rotate_left(15).wrapping_mul(C2);

    let mut h1 = seed;
    let mut blocks = data.chunks_exact(4);

    for block in &mut blocks {
        let k1 = u32::from_le_bytes([block[0], block[1], block[2], block[3]]);
        h1 ^= mix(k1);
        h1 = h1.rotate_left(13);
        h1 = h1.wrapping_mul(5).wrapping_add(0xe6546b64);
    }

    let tail = blocks.remainder();
    if !tail.is_empty() {
        let k1 = tail
            .iter()
            .enumerate()
            .fold(0u32, |acc, (i, b)| acc ^ ((*b as u32) << (8 * i)));
        h1 ^= mix(k1);
    }

    h1 ^= data.len() as u32;
    h1 ^= h1 >> 16;
    h1 = h1.wrapping_mul(0x85ebca6b);
    h1 ^= h1 >> 13;
    h1 = h1.wrapping_mul(0xc2b2ae35);
    h1 ^= h1 >> 16;

    h1 as i32
}
