//! Encoders and decoders for the primitive field types carried in frames.
//!
//! Fixed-size fields are packed into a frame's content at known offsets.
//! Variable-size fields each take one frame; lists and nested structures are
//! bracketed by `BEGIN_DATA_STRUCTURE` / `END_DATA_STRUCTURE` frames.

use bytes::{BufMut, BytesMut};
use uuid::Uuid;

use super::client_message::{ClientMessage, FrameCursor};
use super::frame::Frame;
use crate::address::Address;
use crate::error::{HazelcastError, Result};

/// Encoded size of a `u8` / `bool` field.
pub const BYTE_SIZE: usize = 1;
/// Encoded size of an `i32` field.
pub const INT_SIZE: usize = 4;
/// Encoded size of an `i64` field.
pub const LONG_SIZE: usize = 8;
/// Encoded size of a nullable UUID field (null marker + two longs).
pub const UUID_SIZE: usize = BYTE_SIZE + 2 * LONG_SIZE;

fn slice_at(content: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    content.get(offset..offset + len).ok_or_else(|| {
        HazelcastError::Protocol(format!(
            "field at offset {} needs {} bytes, frame has {}",
            offset,
            len,
            content.len()
        ))
    })
}

/// Appends a byte.
pub fn encode_u8(buf: &mut BytesMut, value: u8) {
    buf.put_u8(value);
}

/// Appends a boolean as one byte.
pub fn encode_bool(buf: &mut BytesMut, value: bool) {
    buf.put_u8(u8::from(value));
}

/// Appends a little-endian `i32`.
pub fn encode_i32(buf: &mut BytesMut, value: i32) {
    buf.put_i32_le(value);
}

/// Appends a little-endian `i64`.
pub fn encode_i64(buf: &mut BytesMut, value: i64) {
    buf.put_i64_le(value);
}

/// Appends a nullable UUID as a null marker followed by the two halves.
pub fn encode_uuid(buf: &mut BytesMut, value: Option<Uuid>) {
    match value {
        Some(uuid) => {
            let (msb, lsb) = uuid.as_u64_pair();
            buf.put_u8(0);
            buf.put_u64_le(msb);
            buf.put_u64_le(lsb);
        }
        None => {
            buf.put_u8(1);
            buf.put_u64_le(0);
            buf.put_u64_le(0);
        }
    }
}

/// Reads a byte at `offset`.
pub fn decode_u8(content: &[u8], offset: usize) -> Result<u8> {
    Ok(slice_at(content, offset, BYTE_SIZE)?[0])
}

/// Reads a boolean at `offset`.
pub fn decode_bool(content: &[u8], offset: usize) -> Result<bool> {
    decode_u8(content, offset).map(|b| b != 0)
}

/// Reads a little-endian `i32` at `offset`.
pub fn decode_i32(content: &[u8], offset: usize) -> Result<i32> {
    let bytes = slice_at(content, offset, INT_SIZE)?;
    Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Reads a little-endian `i64` at `offset`.
pub fn decode_i64(content: &[u8], offset: usize) -> Result<i64> {
    let bytes = slice_at(content, offset, LONG_SIZE)?;
    let mut raw = [0u8; LONG_SIZE];
    raw.copy_from_slice(bytes);
    Ok(i64::from_le_bytes(raw))
}

/// Reads a nullable UUID at `offset`.
pub fn decode_uuid(content: &[u8], offset: usize) -> Result<Option<Uuid>> {
    if decode_bool(content, offset)? {
        return Ok(None);
    }
    let msb = decode_i64(content, offset + BYTE_SIZE)? as u64;
    let lsb = decode_i64(content, offset + BYTE_SIZE + LONG_SIZE)? as u64;
    Ok(Some(Uuid::from_u64_pair(msb, lsb)))
}

/// Adds a string frame.
pub fn encode_string(message: &mut ClientMessage, value: &str) {
    message.add_frame(Frame::from_slice(value.as_bytes()));
}

/// Reads a string frame.
pub fn decode_string(cursor: &mut FrameCursor<'_>) -> Result<String> {
    let frame = cursor.next_frame()?;
    String::from_utf8(frame.content.to_vec())
        .map_err(|e| HazelcastError::Protocol(format!("invalid UTF-8 in string frame: {}", e)))
}

/// Adds either a null frame or the value encoded by `encode`.
pub fn encode_nullable<T, F>(message: &mut ClientMessage, value: Option<T>, encode: F)
where
    F: FnOnce(&mut ClientMessage, T),
{
    match value {
        Some(value) => encode(message, value),
        None => message.add_frame(Frame::new_null_frame()),
    }
}

/// Reads either a null frame or a value decoded by `decode`.
pub fn decode_nullable<T, F>(cursor: &mut FrameCursor<'_>, decode: F) -> Result<Option<T>>
where
    F: FnOnce(&mut FrameCursor<'_>) -> Result<T>,
{
    if cursor.next_is_null() {
        Ok(None)
    } else {
        decode(cursor).map(Some)
    }
}

/// Adds a bracketed list of string frames.
pub fn encode_string_list<S: AsRef<str>>(message: &mut ClientMessage, values: &[S]) {
    message.add_frame(Frame::new_begin_structure());
    for value in values {
        encode_string(message, value.as_ref());
    }
    message.add_frame(Frame::new_end_structure());
}

/// Reads a bracketed list whose elements are decoded by `decode`.
pub fn decode_list<T, F>(cursor: &mut FrameCursor<'_>, mut decode: F) -> Result<Vec<T>>
where
    F: FnMut(&mut FrameCursor<'_>) -> Result<T>,
{
    expect_begin(cursor)?;
    let mut items = Vec::new();
    loop {
        match cursor.peek() {
            Some(frame) if frame.is_end_structure() => {
                cursor.next_frame()?;
                return Ok(items);
            }
            Some(_) => items.push(decode(cursor)?),
            None => {
                return Err(HazelcastError::Protocol(
                    "list is missing its end frame".to_string(),
                ))
            }
        }
    }
}

/// Adds a single frame holding packed `i32` values.
pub fn encode_i32_list(message: &mut ClientMessage, values: &[i32]) {
    let mut content = BytesMut::with_capacity(values.len() * INT_SIZE);
    for value in values {
        content.put_i32_le(*value);
    }
    message.add_frame(Frame::with_content(content));
}

/// Reads a frame of packed `i32` values.
pub fn decode_i32_list(cursor: &mut FrameCursor<'_>) -> Result<Vec<i32>> {
    let frame = cursor.next_frame()?;
    (0..frame.content.len() / INT_SIZE)
        .map(|i| decode_i32(&frame.content, i * INT_SIZE))
        .collect()
}

/// Adds a single frame holding packed UUIDs.
pub fn encode_uuid_list(message: &mut ClientMessage, values: &[Uuid]) {
    let mut content = BytesMut::with_capacity(values.len() * UUID_SIZE);
    for value in values {
        encode_uuid(&mut content, Some(*value));
    }
    message.add_frame(Frame::with_content(content));
}

/// Reads a frame of packed UUIDs. Null entries are rejected.
pub fn decode_uuid_list(cursor: &mut FrameCursor<'_>) -> Result<Vec<Uuid>> {
    let frame = cursor.next_frame()?;
    (0..frame.content.len() / UUID_SIZE)
        .map(|i| {
            decode_uuid(&frame.content, i * UUID_SIZE)?
                .ok_or_else(|| HazelcastError::Protocol("null UUID in list".to_string()))
        })
        .collect()
}

/// Adds a list of `(uuid, [i32])` entries: the value lists first, then the keys.
pub fn encode_uuid_to_i32_list_entries(message: &mut ClientMessage, entries: &[(Uuid, Vec<i32>)]) {
    message.add_frame(Frame::new_begin_structure());
    for (_, values) in entries {
        encode_i32_list(message, values);
    }
    message.add_frame(Frame::new_end_structure());
    let keys: Vec<Uuid> = entries.iter().map(|(key, _)| *key).collect();
    encode_uuid_list(message, &keys);
}

/// Reads entries written by [`encode_uuid_to_i32_list_entries`].
pub fn decode_uuid_to_i32_list_entries(
    cursor: &mut FrameCursor<'_>,
) -> Result<Vec<(Uuid, Vec<i32>)>> {
    let values = decode_list(cursor, decode_i32_list)?;
    let keys = decode_uuid_list(cursor)?;
    if keys.len() != values.len() {
        return Err(HazelcastError::Protocol(format!(
            "entry list has {} keys but {} values",
            keys.len(),
            values.len()
        )));
    }
    Ok(keys.into_iter().zip(values).collect())
}

/// Adds an address as a nested structure: port, then host.
pub fn encode_address(message: &mut ClientMessage, address: &Address) {
    message.add_frame(Frame::new_begin_structure());
    let mut initial = BytesMut::with_capacity(INT_SIZE);
    initial.put_i32_le(i32::from(address.port()));
    message.add_frame(Frame::with_content(initial));
    encode_string(message, address.host());
    message.add_frame(Frame::new_end_structure());
}

/// Reads an address structure, skipping any trailing fields it does not know.
pub fn decode_address(cursor: &mut FrameCursor<'_>) -> Result<Address> {
    expect_begin(cursor)?;
    let initial = cursor.next_frame()?;
    let port = decode_i32(&initial.content, 0)?;
    let port = u16::try_from(port)
        .map_err(|_| HazelcastError::Protocol(format!("invalid port {}", port)))?;
    let host = decode_string(cursor)?;
    cursor.skip_to_end_of_structure()?;
    Ok(Address::new(host, port))
}

/// Consumes the frame that opens a nested structure.
pub fn expect_begin(cursor: &mut FrameCursor<'_>) -> Result<()> {
    let frame = cursor.next_frame()?;
    if frame.is_begin_structure() {
        Ok(())
    } else {
        Err(HazelcastError::Protocol(format!(
            "expected begin of structure, found flags {:#06x}",
            frame.flags
        )))
    }
}
