//! Frame type for the Hazelcast Open Binary Protocol.

use bytes::{Buf, BufMut, BytesMut};

use super::constants::*;

/// A single frame in the Hazelcast protocol.
///
/// Each frame consists of:
/// - A 4-byte length field (little-endian, counts flags and content)
/// - A 2-byte flags field (little-endian)
/// - Variable-length content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The frame content (payload after flags).
    pub content: BytesMut,
    /// Frame flags indicating frame type and properties.
    pub flags: u16,
}

impl Frame {
    /// Creates a new frame with the given content and flags.
    pub fn new(content: BytesMut, flags: u16) -> Self {
        Self { content, flags }
    }

    /// Creates a new frame with content and default flags.
    pub fn with_content(content: BytesMut) -> Self {
        Self::new(content, DEFAULT_FLAGS)
    }

    /// Creates a frame copying the given bytes.
    pub fn from_slice(data: &[u8]) -> Self {
        Self::with_content(BytesMut::from(data))
    }

    /// Creates a new empty frame with the given flags.
    pub fn with_flags(flags: u16) -> Self {
        Self::new(BytesMut::new(), flags)
    }

    /// Creates a new frame with the given capacity and flags.
    pub fn with_capacity(capacity: usize, flags: u16) -> Self {
        Self::new(BytesMut::with_capacity(capacity), flags)
    }

    /// Creates a null frame (represents a null value).
    pub fn new_null_frame() -> Self {
        Self::with_flags(IS_NULL_FLAG)
    }

    /// Creates the frame that opens a nested structure.
    pub fn new_begin_structure() -> Self {
        Self::with_flags(BEGIN_DATA_STRUCTURE_FLAG)
    }

    /// Creates the frame that closes a nested structure.
    pub fn new_end_structure() -> Self {
        Self::with_flags(END_DATA_STRUCTURE_FLAG)
    }

    fn has(&self, flag: u16) -> bool {
        self.flags & flag == flag
    }

    /// Returns true if this frame has the BEGIN_FRAGMENT flag set.
    pub fn is_begin_fragment(&self) -> bool {
        self.has(BEGIN_FRAGMENT_FLAG)
    }

    /// Returns true if this frame has the END_FRAGMENT flag set.
    pub fn is_end_fragment(&self) -> bool {
        self.has(END_FRAGMENT_FLAG)
    }

    /// Returns true if this frame carries both fragment flags.
    pub fn is_unfragmented(&self) -> bool {
        self.has(UNFRAGMENTED_MESSAGE)
    }

    /// Returns true if this frame has the FINAL flag set.
    pub fn is_final_frame(&self) -> bool {
        self.has(IS_FINAL_FLAG)
    }

    /// Returns true if this frame opens a nested structure.
    pub fn is_begin_structure(&self) -> bool {
        self.has(BEGIN_DATA_STRUCTURE_FLAG)
    }

    /// Returns true if this frame closes a nested structure.
    pub fn is_end_structure(&self) -> bool {
        self.has(END_DATA_STRUCTURE_FLAG)
    }

    /// Returns true if this frame has the NULL flag set.
    pub fn is_null_frame(&self) -> bool {
        self.has(IS_NULL_FLAG)
    }

    /// Returns true if this frame has the EVENT flag set.
    pub fn is_event_frame(&self) -> bool {
        self.has(IS_EVENT_FLAG)
    }

    /// Returns true if this frame has the BACKUP_EVENT flag set.
    pub fn is_backup_event_frame(&self) -> bool {
        self.has(BACKUP_EVENT_FLAG)
    }

    /// Returns the size of this frame on the wire.
    ///
    /// This includes the 4-byte length field, 2-byte flags, and content.
    pub fn wire_size(&self) -> usize {
        FRAME_HEADER_SIZE + self.content.len()
    }

    /// Returns the value written in the length field.
    ///
    /// The length covers the whole frame, the length field itself included.
    pub fn frame_length(&self) -> usize {
        self.wire_size()
    }

    /// Writes this frame to the given buffer.
    pub fn write_to(&self, dst: &mut BytesMut) {
        dst.reserve(self.wire_size());
        dst.put_u32_le(self.frame_length() as u32);
        dst.put_u16_le(self.flags);
        dst.put_slice(&self.content);
    }

    /// Peeks the length field of the next frame without consuming anything.
    pub fn peek_length(src: &[u8]) -> Option<usize> {
        if src.len() < SIZE_OF_FRAME_LENGTH_FIELD {
            return None;
        }
        Some(u32::from_le_bytes([src[0], src[1], src[2], src[3]]) as usize)
    }

    /// Reads a frame from the given buffer.
    ///
    /// Returns `None` if there isn't enough data to read a complete frame, or
    /// if the length field is smaller than the frame header it must cover.
    pub fn read_from(src: &mut BytesMut) -> Option<Self> {
        let frame_length = Self::peek_length(src)?;
        if frame_length < FRAME_HEADER_SIZE || src.len() < frame_length {
            return None;
        }

        src.advance(SIZE_OF_FRAME_LENGTH_FIELD);
        let flags = src.get_u16_le();
        let content_length = frame_length - FRAME_HEADER_SIZE;
        let content = src.split_to(content_length);

        Some(Self::new(content, flags))
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::with_flags(DEFAULT_FLAGS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_flags() {
        let unfragmented = Frame::with_flags(UNFRAGMENTED_MESSAGE);
        assert!(unfragmented.is_begin_fragment());
        assert!(unfragmented.is_end_fragment());
        assert!(unfragmented.is_unfragmented());

        let begin = Frame::with_flags(BEGIN_FRAGMENT_FLAG);
        assert!(begin.is_begin_fragment());
        assert!(!begin.is_unfragmented());

        assert!(Frame::new_null_frame().is_null_frame());
        assert!(Frame::new_begin_structure().is_begin_structure());
        assert!(Frame::new_end_structure().is_end_structure());
        assert!(Frame::with_flags(IS_FINAL_FLAG).is_final_frame());
        assert!(Frame::with_flags(IS_EVENT_FLAG).is_event_frame());
        assert!(Frame::with_flags(BACKUP_EVENT_FLAG).is_backup_event_frame());
    }

    #[test]
    fn test_wire_size() {
        let empty = Frame::default();
        assert_eq!(empty.wire_size(), 6);
        assert_eq!(empty.frame_length(), 6);

        let with_content = Frame::from_slice(&[1, 2, 3, 4, 5]);
        assert_eq!(with_content.wire_size(), 11);
        assert_eq!(with_content.frame_length(), 11);
    }

    #[test]
    fn test_write_and_read_frame() {
        let original = Frame::new(
            BytesMut::from(&[0xDE, 0xAD, 0xBE, 0xEF][..]),
            UNFRAGMENTED_MESSAGE,
        );
        let mut buf = BytesMut::new();
        original.write_to(&mut buf);

        assert_eq!(buf.len(), original.wire_size());

        let decoded = Frame::read_from(&mut buf).unwrap();
        assert_eq!(decoded, original);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_read_incomplete_length() {
        let mut buf = BytesMut::from(&[0x01, 0x02][..]);
        assert!(Frame::read_from(&mut buf).is_none());
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn test_read_incomplete_content() {
        let mut buf = BytesMut::from(
            &[
                0x0A, 0x00, 0x00, 0x00, // length = 10 (header + 4 bytes content)
                0x00, 0x80, // flags
                0x01, 0x02, // only 2 bytes of content
            ][..],
        );
        assert!(Frame::read_from(&mut buf).is_none());
        assert_eq!(buf.len(), 8);
    }

    #[test]
    fn test_read_length_shorter_than_header() {
        let mut buf = BytesMut::from(&[0x05, 0x00, 0x00, 0x00, 0x00, 0x00][..]);
        assert!(Frame::read_from(&mut buf).is_none());
    }

    #[test]
    fn test_read_empty_final_frame() {
        let mut buf = BytesMut::from(
            &[
                0x06, 0x00, 0x00, 0x00, // length = 6 (just the header)
                0x00, 0x20, // IS_FINAL
            ][..],
        );

        let frame = Frame::read_from(&mut buf).unwrap();
        assert!(frame.is_final_frame());
        assert!(frame.content.is_empty());
    }

    #[test]
    fn test_with_capacity() {
        let frame = Frame::with_capacity(1024, UNFRAGMENTED_MESSAGE);
        assert!(frame.is_unfragmented());
        assert!(frame.content.is_empty());
        assert!(frame.content.capacity() >= 1024);
    }

    #[test]
    fn test_default_frame_properties() {
        let frame = Frame::default();

        assert!(!frame.is_begin_fragment());
        assert!(!frame.is_end_fragment());
        assert!(!frame.is_null_frame());
        assert!(!frame.is_final_frame());
        assert!(!frame.is_event_frame());
        assert!(frame.content.is_empty());
    }
}
