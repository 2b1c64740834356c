//! Hazelcast Open Binary Protocol implementation.
//!
//! This module provides the core protocol types for communicating with
//! Hazelcast clusters using the Open Binary Protocol.

mod client_message;
mod codec;
pub mod constants;
mod error_codec;
pub mod fields;
mod frame;

pub use client_message::{compute_partition_hash, ClientMessage, FrameCursor};
pub use codec::ClientMessageCodec;
pub use constants::*;
pub use error_codec::{decode_server_error, encode_server_error};
pub use frame::Frame;
