#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;

use hazelcast_core::protocol::{ClientMessage, ClientMessageCodec, Frame, CLIENT_PING_RESPONSE};
use tokio_util::codec::{Decoder, Encoder};

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }
    let max_frame_size = 24 + data[0] as usize;
    let mut msg = ClientMessage::create_for_response(CLIENT_PING_RESPONSE, data[1] as i64);
    for chunk in data[2..].chunks(17) {
        msg.add_frame(Frame::from_slice(chunk));
    }

    let mut codec = ClientMessageCodec::new();
    let mut buf = BytesMut::new();
    for fragment in msg.split_into_fragments(max_frame_size, 1) {
        let _ = codec.encode(fragment, &mut buf);
    }

    let decoded = codec.decode(&mut buf).ok().flatten();
    assert_eq!(decoded.map(|m| m.frame_count()), Some(msg.frame_count()));
});
