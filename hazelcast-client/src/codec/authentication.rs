//! Client authentication handshake.

use hazelcast_core::protocol::constants::{
    CLIENT_AUTHENTICATION, CLIENT_AUTHENTICATION_RESPONSE, PARTITION_ID_ANY, REQUEST_HEADER_SIZE,
    RESPONSE_HEADER_SIZE,
};
use hazelcast_core::protocol::fields::{
    decode_address, decode_bool, decode_i32, decode_list, decode_nullable, decode_string,
    decode_u8, decode_uuid, encode_address, encode_bool, encode_i32, encode_nullable,
    encode_string, encode_string_list, encode_u8, encode_uuid, BYTE_SIZE, INT_SIZE, UUID_SIZE,
};
use hazelcast_core::{Address, ClientMessage, HazelcastError, Result};
use uuid::Uuid;

const REQUEST_UUID_OFFSET: usize = REQUEST_HEADER_SIZE;
const REQUEST_SERIALIZATION_VERSION_OFFSET: usize = REQUEST_UUID_OFFSET + UUID_SIZE;
const REQUEST_INITIAL_FRAME_SIZE: usize = REQUEST_SERIALIZATION_VERSION_OFFSET + BYTE_SIZE;

const RESPONSE_STATUS_OFFSET: usize = RESPONSE_HEADER_SIZE;
const RESPONSE_MEMBER_UUID_OFFSET: usize = RESPONSE_STATUS_OFFSET + BYTE_SIZE;
const RESPONSE_SERIALIZATION_VERSION_OFFSET: usize = RESPONSE_MEMBER_UUID_OFFSET + UUID_SIZE;
const RESPONSE_PARTITION_COUNT_OFFSET: usize = RESPONSE_SERIALIZATION_VERSION_OFFSET + BYTE_SIZE;
const RESPONSE_CLUSTER_ID_OFFSET: usize = RESPONSE_PARTITION_COUNT_OFFSET + INT_SIZE;
const RESPONSE_FAILOVER_SUPPORTED_OFFSET: usize = RESPONSE_CLUSTER_ID_OFFSET + UUID_SIZE;

/// Result of an authentication attempt as reported by the member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AuthenticationStatus {
    /// The client may use the connection.
    Authenticated = 0,
    /// Cluster name or credentials were rejected.
    CredentialsFailed = 1,
    /// The member uses a different serialization version.
    SerializationVersionMismatch = 2,
    /// The member refuses clients, for example while blacklisted.
    NotAllowedInCluster = 3,
}

impl AuthenticationStatus {
    /// Parses a status byte.
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Authenticated),
            1 => Ok(Self::CredentialsFailed),
            2 => Ok(Self::SerializationVersionMismatch),
            3 => Ok(Self::NotAllowedInCluster),
            other => Err(HazelcastError::Protocol(format!(
                "unknown authentication status {}",
                other
            ))),
        }
    }
}

/// Fields sent to authenticate a new connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationRequest {
    /// Cluster the client expects to join.
    pub cluster_name: String,
    /// Optional username.
    pub username: Option<String>,
    /// Optional password.
    pub password: Option<String>,
    /// This client's UUID.
    pub client_uuid: Uuid,
    /// Client type code, such as `RST`.
    pub client_type: String,
    /// Serialization version the client speaks.
    pub serialization_version: u8,
    /// Client library version.
    pub client_version: String,
    /// Client instance name.
    pub client_name: String,
    /// Client labels.
    pub labels: Vec<String>,
}

/// Fields returned by the member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationResponse {
    /// Authentication outcome.
    pub status: AuthenticationStatus,
    /// Client-facing address of the member.
    pub address: Option<Address>,
    /// UUID of the member.
    pub member_uuid: Option<Uuid>,
    /// Serialization version of the member.
    pub serialization_version: u8,
    /// Member version string.
    pub server_version: String,
    /// Partition count of the cluster.
    pub partition_count: i32,
    /// Identity of the cluster.
    pub cluster_id: Option<Uuid>,
    /// Whether the cluster supports client failover.
    pub failover_supported: bool,
}

/// Encoder and decoder for `Client.Authentication`.
#[derive(Debug, Clone, Copy)]
pub struct ClientAuthenticationCodec;

impl ClientAuthenticationCodec {
    /// Builds an authentication request.
    pub fn encode_request(request: &AuthenticationRequest) -> ClientMessage {
        let mut message = ClientMessage::create_for_encode_with_capacity(
            CLIENT_AUTHENTICATION,
            PARTITION_ID_ANY,
            REQUEST_INITIAL_FRAME_SIZE,
        );
        if let Some(initial) = message.initial_frame_mut() {
            encode_uuid(&mut initial.content, Some(request.client_uuid));
            encode_u8(&mut initial.content, request.serialization_version);
        }
        encode_string(&mut message, &request.cluster_name);
        encode_nullable(&mut message, request.username.as_deref(), encode_string);
        encode_nullable(&mut message, request.password.as_deref(), encode_string);
        encode_string(&mut message, &request.client_type);
        encode_string(&mut message, &request.client_version);
        encode_string(&mut message, &request.client_name);
        encode_string_list(&mut message, &request.labels);
        message
    }

    /// Parses an authentication request.
    pub fn decode_request(message: &ClientMessage) -> Result<AuthenticationRequest> {
        let mut cursor = message.cursor();
        let initial = cursor.next_frame()?;
        let client_uuid = decode_uuid(&initial.content, REQUEST_UUID_OFFSET)?
            .ok_or_else(|| HazelcastError::Protocol("missing client UUID".to_string()))?;
        let serialization_version =
            decode_u8(&initial.content, REQUEST_SERIALIZATION_VERSION_OFFSET)?;

        Ok(AuthenticationRequest {
            cluster_name: decode_string(&mut cursor)?,
            username: decode_nullable(&mut cursor, decode_string)?,
            password: decode_nullable(&mut cursor, decode_string)?,
            client_uuid,
            client_type: decode_string(&mut cursor)?,
            serialization_version,
            client_version: decode_string(&mut cursor)?,
            client_name: decode_string(&mut cursor)?,
            labels: decode_list(&mut cursor, decode_string)?,
        })
    }

    /// Builds the member's reply.
    pub fn encode_response(correlation_id: i64, response: &AuthenticationResponse) -> ClientMessage {
        let mut message =
            ClientMessage::create_for_response(CLIENT_AUTHENTICATION_RESPONSE, correlation_id);
        if let Some(initial) = message.initial_frame_mut() {
            encode_u8(&mut initial.content, response.status as u8);
            encode_uuid(&mut initial.content, response.member_uuid);
            encode_u8(&mut initial.content, response.serialization_version);
            encode_i32(&mut initial.content, response.partition_count);
            encode_uuid(&mut initial.content, response.cluster_id);
            encode_bool(&mut initial.content, response.failover_supported);
        }
        encode_nullable(&mut message, response.address.as_ref(), encode_address);
        encode_string(&mut message, &response.server_version);
        message
    }

    /// Parses the member's reply.
    pub fn decode_response(message: &ClientMessage) -> Result<AuthenticationResponse> {
        let mut cursor = message.cursor();
        let initial = cursor.next_frame()?;
        let content = &initial.content;

        Ok(AuthenticationResponse {
            status: AuthenticationStatus::from_u8(decode_u8(content, RESPONSE_STATUS_OFFSET)?)?,
            member_uuid: decode_uuid(content, RESPONSE_MEMBER_UUID_OFFSET)?,
            serialization_version: decode_u8(content, RESPONSE_SERIALIZATION_VERSION_OFFSET)?,
            partition_count: decode_i32(content, RESPONSE_PARTITION_COUNT_OFFSET)?,
            cluster_id: decode_uuid(content, RESPONSE_CLUSTER_ID_OFFSET)?,
            failover_supported: decode_bool(content, RESPONSE_FAILOVER_SUPPORTED_OFFSET)?,
            address: decode_nullable(&mut cursor, decode_address)?,
            server_version: decode_string(&mut cursor)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hazelcast_core::protocol::constants::SERIALIZATION_VERSION;

    fn response(status: AuthenticationStatus) -> AuthenticationResponse {
        AuthenticationResponse {
            status,
            address: Some(Address::new("10.0.0.1", 5701)),
            member_uuid: Some(Uuid::new_v4()),
            serialization_version: SERIALIZATION_VERSION,
            server_version: "5.3.0".to_string(),
            partition_count: 271,
            cluster_id: Some(Uuid::new_v4()),
            failover_supported: true,
        }
    }

    #[test]
    fn test_request_layout() {
        let client_uuid = Uuid::new_v4();
        let request = AuthenticationRequest {
            cluster_name: "dev".to_string(),
            username: None,
            password: None,
            client_uuid,
            client_type: "RST".to_string(),
            serialization_version: SERIALIZATION_VERSION,
            client_version: "0.1.0".to_string(),
            client_name: "client-1".to_string(),
            labels: vec!["blue".to_string()],
        };
        let message = ClientAuthenticationCodec::encode_request(&request);

        assert_eq!(message.message_type(), Some(CLIENT_AUTHENTICATION));
        let initial = message.initial_frame().unwrap();
        assert_eq!(initial.content.len(), REQUEST_INITIAL_FRAME_SIZE);
        assert_eq!(
            decode_uuid(&initial.content, REQUEST_UUID_OFFSET).unwrap(),
            Some(client_uuid)
        );
        // Null username and password each take one null frame.
        assert!(message.frames()[2].is_null_frame());
        assert!(message.frames()[3].is_null_frame());

        assert_eq!(ClientAuthenticationCodec::decode_request(&message).unwrap(), request);
    }

    #[test]
    fn test_response_offsets() {
        let expected = response(AuthenticationStatus::Authenticated);
        let message = ClientAuthenticationCodec::encode_response(5, &expected);
        let content = &message.initial_frame().unwrap().content;

        assert_eq!(content[13], 0);
        assert_eq!(decode_i32(content, 32).unwrap(), 271);
        assert_eq!(content.len(), 54);
        assert_eq!(ClientAuthenticationCodec::decode_response(&message).unwrap(), expected);
    }

    #[test]
    fn test_response_without_address() {
        let mut expected = response(AuthenticationStatus::CredentialsFailed);
        expected.address = None;
        expected.member_uuid = None;
        let message = ClientAuthenticationCodec::encode_response(5, &expected);
        assert_eq!(ClientAuthenticationCodec::decode_response(&message).unwrap(), expected);
    }

    #[test]
    fn test_unknown_status() {
        assert!(matches!(
            AuthenticationStatus::from_u8(9),
            Err(HazelcastError::Protocol(_))
        ));
    }
}
