#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;

use hazelcast_core::protocol::{decode_server_error, fields, ClientMessageCodec};
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    let mut codec = ClientMessageCodec::with_max_frame_length(1 << 16);
    let mut buf = BytesMut::from(data);

    while let Ok(Some(msg)) = codec.decode(&mut buf) {
        let _ = msg.message_type();
        let _ = msg.correlation_id();
        let _ = msg.partition_id();
        let _ = msg.is_event();

        if msg.is_exception() {
            let _ = decode_server_error(&msg);
            continue;
        }

        let mut cursor = msg.cursor();
        if cursor.next_frame().is_ok() {
            let _ = fields::decode_address(&mut cursor);
            let _ = fields::decode_list(&mut cursor, fields::decode_string);
            let _ = fields::decode_uuid_to_i32_list_entries(&mut cursor);
        }
    }
});
