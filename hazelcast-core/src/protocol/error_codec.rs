//! Decoding of server exception responses.

use bytes::BytesMut;

use super::client_message::{ClientMessage, FrameCursor};
use super::constants::*;
use super::fields::*;
use super::frame::Frame;
use crate::error::{HazelcastError, Result, ServerError, StackTraceElement};

/// Decodes an exception response into a [`ServerError`].
///
/// The payload is a list of error holders; the first is the thrown exception
/// and the rest are its causes.
pub fn decode_server_error(message: &ClientMessage) -> Result<ServerError> {
    let mut cursor = message.cursor();
    cursor.next_frame()?;
    let mut holders = decode_list(&mut cursor, decode_error_holder)?;
    if holders.is_empty() {
        return Err(HazelcastError::Protocol(
            "exception response without error holders".to_string(),
        ));
    }
    let mut error = holders.remove(0);
    error.causes = holders;
    Ok(error)
}

/// Builds an exception response. Used by test servers.
pub fn encode_server_error(correlation_id: i64, error: &ServerError) -> ClientMessage {
    let mut message = ClientMessage::create_for_response(EXCEPTION_MESSAGE_TYPE, correlation_id);
    message.add_frame(Frame::new_begin_structure());
    encode_error_holder(&mut message, error);
    for cause in &error.causes {
        encode_error_holder(&mut message, cause);
    }
    message.add_frame(Frame::new_end_structure());
    message
}

fn encode_error_holder(message: &mut ClientMessage, error: &ServerError) {
    message.add_frame(Frame::new_begin_structure());
    let mut initial = BytesMut::with_capacity(INT_SIZE);
    encode_i32(&mut initial, error.error_code);
    message.add_frame(Frame::with_content(initial));
    encode_string(message, &error.class_name);
    encode_nullable(message, error.message.as_deref(), encode_string);
    message.add_frame(Frame::new_begin_structure());
    for element in &error.stack_trace {
        message.add_frame(Frame::new_begin_structure());
        let mut initial = BytesMut::with_capacity(INT_SIZE);
        encode_i32(&mut initial, element.line_number);
        message.add_frame(Frame::with_content(initial));
        encode_string(message, &element.declaring_class);
        encode_string(message, &element.method_name);
        encode_nullable(message, element.file_name.as_deref(), encode_string);
        message.add_frame(Frame::new_end_structure());
    }
    message.add_frame(Frame::new_end_structure());
    message.add_frame(Frame::new_end_structure());
}

fn decode_error_holder(cursor: &mut FrameCursor<'_>) -> Result<ServerError> {
    expect_begin(cursor)?;
    let initial = cursor.next_frame()?;
    let error_code = decode_i32(&initial.content, 0)?;
    let class_name = decode_string(cursor)?;
    let message = decode_nullable(cursor, decode_string)?;
    let stack_trace = decode_list(cursor, decode_stack_trace_element)?;
    cursor.skip_to_end_of_structure()?;
    Ok(ServerError {
        error_code,
        class_name,
        message,
        stack_trace,
        causes: Vec::new(),
    })
}

fn decode_stack_trace_element(cursor: &mut FrameCursor<'_>) -> Result<StackTraceElement> {
    expect_begin(cursor)?;
    let initial = cursor.next_frame()?;
    let line_number = decode_i32(&initial.content, 0)?;
    let declaring_class = decode_string(cursor)?;
    let method_name = decode_string(cursor)?;
    let file_name = decode_nullable(cursor, decode_string)?;
    cursor.skip_to_end_of_structure()?;
    Ok(StackTraceElement {
        declaring_class,
        method_name,
        file_name,
        line_number,
    })
}
