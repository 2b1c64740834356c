//! Core types and protocols for Hazelcast.

#![warn(missing_docs)]

pub mod address;
pub mod error;
pub mod protocol;

pub use address::Address;
pub use error::{HazelcastError, Result, ServerError, StackTraceElement};
pub use protocol::{ClientMessage, ClientMessageCodec, Frame};
