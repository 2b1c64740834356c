//! Cluster view listener registration and its pushed events.

use std::collections::HashMap;

use bytes::BytesMut;
use hazelcast_core::protocol::constants::{
    CLIENT_ADD_CLUSTER_VIEW_LISTENER, CLIENT_ADD_CLUSTER_VIEW_LISTENER_RESPONSE,
    EVENT_HEADER_SIZE, EVENT_MEMBERS_VIEW, EVENT_PARTITIONS_VIEW, PARTITION_ID_ANY,
};
use hazelcast_core::protocol::fields::{
    decode_address, decode_bool, decode_i32, decode_list, decode_string, decode_u8,
    decode_uuid, decode_uuid_to_i32_list_entries, encode_address, encode_bool, encode_i32,
    encode_string, encode_u8, encode_uuid, encode_uuid_to_i32_list_entries, expect_begin,
    BYTE_SIZE, UUID_SIZE,
};
use hazelcast_core::protocol::FrameCursor;
use hazelcast_core::{ClientMessage, Frame, HazelcastError, Result};
use uuid::Uuid;

use crate::cluster::{Member, MemberVersion};

/// A view pushed on the cluster view listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterViewEvent {
    /// The complete member list.
    MembersView {
        /// Member list version.
        version: i32,
        /// Every member of the cluster.
        members: Vec<Member>,
    },
    /// The complete partition table, grouped by owner.
    PartitionsView {
        /// Partition table version.
        version: i32,
        /// Owner UUID and the partitions it owns.
        partitions: Vec<(Uuid, Vec<i32>)>,
    },
}

/// Encoder and decoder for `Client.AddClusterViewListener`.
#[derive(Debug, Clone, Copy)]
pub struct ClientAddClusterViewListenerCodec;

impl ClientAddClusterViewListenerCodec {
    /// Builds the registration request.
    pub fn encode_request() -> ClientMessage {
        ClientMessage::create_for_encode_any_partition(CLIENT_ADD_CLUSTER_VIEW_LISTENER)
    }

    /// Builds the member's reply to the registration.
    pub fn encode_response(correlation_id: i64) -> ClientMessage {
        ClientMessage::create_for_response(CLIENT_ADD_CLUSTER_VIEW_LISTENER_RESPONSE, correlation_id)
    }

    /// Builds a members view event.
    pub fn encode_members_view_event(
        correlation_id: i64,
        version: i32,
        members: &[Member],
    ) -> ClientMessage {
        let mut message =
            ClientMessage::create_for_event(EVENT_MEMBERS_VIEW, correlation_id, PARTITION_ID_ANY);
        if let Some(initial) = message.initial_frame_mut() {
            encode_i32(&mut initial.content, version);
        }
        message.add_frame(Frame::new_begin_structure());
        for member in members {
            encode_member(&mut message, member);
        }
        message.add_frame(Frame::new_end_structure());
        message
    }

    /// Builds a partitions view event.
    pub fn encode_partitions_view_event(
        correlation_id: i64,
        version: i32,
        partitions: &[(Uuid, Vec<i32>)],
    ) -> ClientMessage {
        let mut message = ClientMessage::create_for_event(
            EVENT_PARTITIONS_VIEW,
            correlation_id,
            PARTITION_ID_ANY,
        );
        if let Some(initial) = message.initial_frame_mut() {
            encode_i32(&mut initial.content, version);
        }
        encode_uuid_to_i32_list_entries(&mut message, partitions);
        message
    }

    /// Parses an event pushed on the listener.
    pub fn decode_event(message: &ClientMessage) -> Result<ClusterViewEvent> {
        let mut cursor = message.cursor();
        let initial = cursor.next_frame()?;
        let version = decode_i32(&initial.content, EVENT_HEADER_SIZE)?;

        match message.message_type() {
            Some(EVENT_MEMBERS_VIEW) => Ok(ClusterViewEvent::MembersView {
                version,
                members: decode_list(&mut cursor, decode_member)?,
            }),
            Some(EVENT_PARTITIONS_VIEW) => Ok(ClusterViewEvent::PartitionsView {
                version,
                partitions: decode_uuid_to_i32_list_entries(&mut cursor)?,
            }),
            other => Err(HazelcastError::Protocol(format!(
                "unexpected cluster view event type {:?}",
                other
            ))),
        }
    }
}

fn encode_member(message: &mut ClientMessage, member: &Member) {
    message.add_frame(Frame::new_begin_structure());

    let mut initial = BytesMut::with_capacity(UUID_SIZE + BYTE_SIZE);
    encode_uuid(&mut initial, Some(member.uuid()));
    encode_bool(&mut initial, member.is_lite_member());
    message.add_frame(Frame::with_content(initial));

    encode_address(message, member.address());

    message.add_frame(Frame::new_begin_structure());
    for (key, value) in member.attributes() {
        encode_string(message, key);
        encode_string(message, value);
    }
    message.add_frame(Frame::new_end_structure());

    let version = member.version();
    message.add_frame(Frame::new_begin_structure());
    let mut content = BytesMut::with_capacity(3 * BYTE_SIZE);
    encode_u8(&mut content, version.major);
    encode_u8(&mut content, version.minor);
    encode_u8(&mut content, version.patch);
    message.add_frame(Frame::with_content(content));
    message.add_frame(Frame::new_end_structure());

    message.add_frame(Frame::new_end_structure());
}

fn decode_member(cursor: &mut FrameCursor<'_>) -> Result<Member> {
    expect_begin(cursor)?;
    let initial = cursor.next_frame()?;
    let uuid = decode_uuid(&initial.content, 0)?
        .ok_or_else(|| HazelcastError::Protocol("member without UUID".to_string()))?;
    let lite_member = decode_bool(&initial.content, UUID_SIZE)?;
    let address = decode_address(cursor)?;
    let attributes = decode_attributes(cursor)?;
    let version = decode_member_version(cursor)?;
    cursor.skip_to_end_of_structure()?;

    Ok(Member::with_details(
        uuid,
        address,
        lite_member,
        attributes,
        version,
    ))
}

fn decode_attributes(cursor: &mut FrameCursor<'_>) -> Result<HashMap<String, String>> {
    expect_begin(cursor)?;
    let mut attributes = HashMap::new();
    while let Some(frame) = cursor.peek() {
        if frame.is_end_structure() {
            cursor.next_frame()?;
            return Ok(attributes);
        }
        let key = decode_string(cursor)?;
        let value = decode_string(cursor)?;
        attributes.insert(key, value);
    }
    Err(HazelcastError::Protocol(
        "attribute map is missing its end frame".to_string(),
    ))
}

fn decode_member_version(cursor: &mut FrameCursor<'_>) -> Result<MemberVersion> {
    expect_begin(cursor)?;
    let initial = cursor.next_frame()?;
    let version = MemberVersion::new(
        decode_u8(&initial.content, 0)?,
        decode_u8(&initial.content, BYTE_SIZE)?,
        decode_u8(&initial.content, 2 * BYTE_SIZE)?,
    );
    cursor.skip_to_end_of_structure()?;
    Ok(version)
}
