//! Protocol constants for the Hazelcast Open Binary Protocol.

/// Size of the frame length field in bytes.
pub const SIZE_OF_FRAME_LENGTH_FIELD: usize = 4;

/// Size of the frame flags field in bytes.
pub const SIZE_OF_FRAME_FLAGS_FIELD: usize = 2;

/// Total frame header size (length + flags).
pub const FRAME_HEADER_SIZE: usize = SIZE_OF_FRAME_LENGTH_FIELD + SIZE_OF_FRAME_FLAGS_FIELD;

/// Bytes written once by the client before its first frame.
pub const CLIENT_PROTOCOL_HEADER: &[u8; 3] = b"CP2";

/// Begin fragment flag - marks the first frame of a message fragment.
pub const BEGIN_FRAGMENT_FLAG: u16 = 1 << 15;

/// End fragment flag - marks the last frame of a message fragment.
pub const END_FRAGMENT_FLAG: u16 = 1 << 14;

/// Final flag - marks the last frame of a client message.
pub const IS_FINAL_FLAG: u16 = 1 << 13;

/// Begin data structure flag - opens a nested structure.
pub const BEGIN_DATA_STRUCTURE_FLAG: u16 = 1 << 12;

/// End data structure flag - closes a nested structure.
pub const END_DATA_STRUCTURE_FLAG: u16 = 1 << 11;

/// Null frame flag - indicates a null value.
pub const IS_NULL_FLAG: u16 = 1 << 10;

/// Event flag - indicates this is an event message.
pub const IS_EVENT_FLAG: u16 = 1 << 9;

/// Backup aware flag - the request expects backup acknowledgements.
pub const BACKUP_AWARE_FLAG: u16 = 1 << 8;

/// Backup event flag.
pub const BACKUP_EVENT_FLAG: u16 = 1 << 7;

/// Default frame flags (no special flags set).
pub const DEFAULT_FLAGS: u16 = 0;

/// Flags carried by the initial frame of a message that is not fragmented.
pub const UNFRAGMENTED_MESSAGE: u16 = BEGIN_FRAGMENT_FLAG | END_FRAGMENT_FLAG;

/// Offset of message type in initial frame content.
pub const TYPE_FIELD_OFFSET: usize = 0;

/// Offset of correlation ID in initial frame content.
pub const CORRELATION_ID_OFFSET: usize = TYPE_FIELD_OFFSET + 4;

/// Offset of partition ID in request initial frame.
pub const PARTITION_ID_OFFSET: usize = CORRELATION_ID_OFFSET + 8;

/// Size of the request initial frame header.
pub const REQUEST_HEADER_SIZE: usize = PARTITION_ID_OFFSET + 4;

/// Offset of backup acks count in response initial frame.
pub const RESPONSE_BACKUP_ACKS_OFFSET: usize = CORRELATION_ID_OFFSET + 8;

/// Size of the response initial frame header.
pub const RESPONSE_HEADER_SIZE: usize = RESPONSE_BACKUP_ACKS_OFFSET + 1;

/// Size of the event initial frame header (type, correlation ID, partition ID).
pub const EVENT_HEADER_SIZE: usize = PARTITION_ID_OFFSET + 4;

/// Size of a fragment ID, written as the content of every fragment's first frame.
pub const FRAGMENT_ID_SIZE: usize = 8;

/// Partition ID indicating no specific partition (-1).
pub const PARTITION_ID_ANY: i32 = -1;

/// Default upper bound for a single frame's length.
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 64 * 1024 * 1024;

/// Serialization version advertised during authentication.
pub const SERIALIZATION_VERSION: u8 = 1;

/// Client type advertised during authentication.
pub const CLIENT_TYPE: &str = "RST";

// Message type constants for the operations the client core issues itself.

/// Server exception response.
pub const EXCEPTION_MESSAGE_TYPE: i32 = 0;

/// Client authentication request.
pub const CLIENT_AUTHENTICATION: i32 = 0x000100;

/// Client authentication response.
pub const CLIENT_AUTHENTICATION_RESPONSE: i32 = 0x000101;

/// Cluster view listener registration request.
pub const CLIENT_ADD_CLUSTER_VIEW_LISTENER: i32 = 0x000300;

/// Cluster view listener registration response.
pub const CLIENT_ADD_CLUSTER_VIEW_LISTENER_RESPONSE: i32 = 0x000301;

/// Members view event pushed to a cluster view listener.
pub const EVENT_MEMBERS_VIEW: i32 = 0x000302;

/// Partitions view event pushed to a cluster view listener.
pub const EVENT_PARTITIONS_VIEW: i32 = 0x000303;

/// Ping request.
pub const CLIENT_PING: i32 = 0x000B00;

/// Ping response.
pub const CLIENT_PING_RESPONSE: i32 = 0x000B01;
