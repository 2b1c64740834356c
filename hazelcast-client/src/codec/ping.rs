use hazelcast_core::protocol::constants::{CLIENT_PING, CLIENT_PING_RESPONSE};
use hazelcast_core::ClientMessage;

/// Heartbeat request with an empty payload.
#[derive(Debug, Clone, Copy)]
pub struct ClientPingCodec;

impl ClientPingCodec {
    /// Builds a ping request.
    pub fn encode_request() -> ClientMessage {
        ClientMessage::create_for_encode_any_partition(CLIENT_PING)
    }

    /// Builds the member's reply to a ping.
    pub fn encode_response(correlation_id: i64) -> ClientMessage {
        ClientMessage::create_for_response(CLIENT_PING_RESPONSE, correlation_id)
    }
}
